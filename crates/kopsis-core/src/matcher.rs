//! # Variant Matcher
//!
//! Resolves which priced variant of a template applies to a student.
//!
//! ## Matching Rules
//! ```text
//! variants (stored order)            student { class, program, gender }
//!   ┌──────────────────────┐
//!   │ #0  "7"      100.000 │──► class? program? gender? ──► all true ──► MATCH (stop)
//!   │ #1  "*"       50.000 │
//!   └──────────────────────┘
//!
//! class   : token "*"  |  token == class  |  token is a substring of class
//! program : no tokens  |  student.program in tokens
//! gender  : no tokens  |  student.gender in tokens
//! ```
//!
//! The first variant whose three rules all hold wins. Template authors put the
//! specific rules first and the catch-all last. A student no variant matches
//! is simply not billed.
//!
//! Matching is pure: preview and generation call the same function and see
//! the same result.

use std::collections::BTreeSet;

use crate::types::{Student, Variant};
use crate::WILDCARD_CLASS;

/// The compiled form of a variant's comma strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantPredicate {
    class_tokens: BTreeSet<String>,
    program_tokens: BTreeSet<String>,
    gender_tokens: BTreeSet<String>,
}

impl VariantPredicate {
    /// Splits the comma lists once. Tokens are trimmed and blanks dropped, so
    /// `"7, ,8"` yields `{"7", "8"}`.
    pub fn parse(class_names: &str, programs: Option<&str>, genders: Option<&str>) -> Self {
        VariantPredicate {
            class_tokens: split_tokens(class_names),
            program_tokens: programs.map(split_tokens).unwrap_or_default(),
            gender_tokens: genders.map(split_tokens).unwrap_or_default(),
        }
    }

    pub fn class_tokens(&self) -> &BTreeSet<String> {
        &self.class_tokens
    }

    pub fn program_tokens(&self) -> &BTreeSet<String> {
        &self.program_tokens
    }

    pub fn gender_tokens(&self) -> &BTreeSet<String> {
        &self.gender_tokens
    }

    /// Class rule. `"7"` matches `"Kelas 7A"`.
    pub fn matches_class(&self, class_name: &str) -> bool {
        self.class_tokens.contains(WILDCARD_CLASS)
            || self.class_tokens.contains(class_name)
            || self
                .class_tokens
                .iter()
                .any(|token| class_name.contains(token.as_str()))
    }

    pub fn matches_program(&self, program: Option<&str>) -> bool {
        matches_optional(&self.program_tokens, program)
    }

    pub fn matches_gender(&self, gender: Option<&str>) -> bool {
        matches_optional(&self.gender_tokens, gender)
    }

    /// All three rules against one student.
    pub fn matches(&self, student: &Student) -> bool {
        self.matches_class(&student.class_name)
            && self.matches_program(student.program.as_deref())
            && self.matches_gender(student.gender.as_deref())
    }
}

/// Returns the first variant in stored order that matches the student.
pub fn match_variant<'a>(variants: &'a [Variant], student: &Student) -> Option<&'a Variant> {
    variants.iter().find(|v| v.predicate().matches(student))
}

fn split_tokens(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// Empty token set means "any"; otherwise the student needs a value in the set.
fn matches_optional(tokens: &BTreeSet<String>, value: Option<&str>) -> bool {
    if tokens.is_empty() {
        return true;
    }
    match value {
        Some(v) => tokens.contains(v),
        None => false,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StudentStatus;
    use chrono::Utc;

    fn student(class_name: &str, program: Option<&str>, gender: Option<&str>) -> Student {
        let now = Utc::now();
        Student {
            id: "s1".to_string(),
            registration_number: "REG-2026-0001".to_string(),
            full_name: "Ahmad".to_string(),
            class_name: class_name.to_string(),
            program: program.map(str::to_string),
            gender: gender.map(str::to_string),
            scholarship_percent: 0,
            status: StudentStatus::Active,
            balance: 0,
            total_liabilities: 0,
            total_paid: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn variant(pos: i64, classes: &str, programs: Option<&str>, genders: Option<&str>, amount: i64) -> Variant {
        Variant::new(
            format!("v{}", pos),
            "t1",
            pos,
            classes,
            programs.map(str::to_string),
            genders.map(str::to_string),
            amount,
        )
    }

    #[test]
    fn test_first_match_wins_over_wildcard() {
        let variants = vec![
            variant(0, "7", None, None, 100_000),
            variant(1, "*", None, None, 50_000),
        ];
        let s = student("Kelas 7A", None, None);

        let matched = match_variant(&variants, &s).unwrap();
        assert_eq!(matched.amount, 100_000);
    }

    #[test]
    fn test_order_decides_precedence() {
        let variants = vec![
            variant(0, "*", None, None, 50_000),
            variant(1, "7", None, None, 100_000),
        ];
        let s = student("Kelas 7A", None, None);

        assert_eq!(match_variant(&variants, &s).unwrap().amount, 50_000);
    }

    #[test]
    fn test_class_rule() {
        let p = VariantPredicate::parse("7, 8", None, None);
        assert!(p.matches_class("7"));
        assert!(p.matches_class("Kelas 8B"));
        assert!(!p.matches_class("Kelas 9A"));

        let wildcard = VariantPredicate::parse("*", None, None);
        assert!(wildcard.matches_class("anything"));
    }

    #[test]
    fn test_blank_tokens_do_not_match_everything() {
        let p = VariantPredicate::parse(" , ,", None, None);
        assert!(p.class_tokens().is_empty());
        assert!(!p.matches_class("Kelas 7A"));
    }

    #[test]
    fn test_program_rule() {
        let variants = vec![variant(0, "*", Some("Tahfidz, Reguler"), None, 10)];

        assert!(match_variant(&variants, &student("7A", Some("Tahfidz"), None)).is_some());
        assert!(match_variant(&variants, &student("7A", Some("Boarding"), None)).is_none());
        // A student without a program never matches a program-restricted rule.
        assert!(match_variant(&variants, &student("7A", None, None)).is_none());
    }

    #[test]
    fn test_gender_rule() {
        let variants = vec![
            variant(0, "*", None, Some("P"), 120_000),
            variant(1, "*", None, Some("L"), 110_000),
        ];

        assert_eq!(
            match_variant(&variants, &student("7A", None, Some("L"))).unwrap().amount,
            110_000
        );
        assert_eq!(
            match_variant(&variants, &student("7A", None, Some("P"))).unwrap().amount,
            120_000
        );
        assert!(match_variant(&variants, &student("7A", None, None)).is_none());
    }

    #[test]
    fn test_empty_lists_mean_any() {
        let variants = vec![variant(0, "7", Some(""), Some("  "), 10)];
        assert!(match_variant(&variants, &student("7", Some("X"), Some("L"))).is_some());
    }

    #[test]
    fn test_no_match_returns_none() {
        let variants = vec![variant(0, "10", None, None, 10)];
        assert!(match_variant(&variants, &student("Kelas 7A", None, None)).is_none());
        assert!(match_variant(&[], &student("Kelas 7A", None, None)).is_none());
    }
}
