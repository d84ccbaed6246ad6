//! # Billing Calculations
//!
//! Prices a template for a student and builds the generation preview.
//!
//! ## Pricing Flow
//! ```text
//! Student ──► match_variant ──► Variant.amount (original)
//!                                    │
//!                 apply_scholarship && percent > 0 ?
//!                         │yes                  │no
//!                         ▼                     ▼
//!            discount = original × p%       discount = 0
//!                         │                     │
//!                         └──────► final = original − discount
//! ```
//!
//! Preview and generation both go through [`price_student`], so what the
//! operator sees is exactly what gets billed.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::matcher::match_variant;
use crate::money::Money;
use crate::types::{BillingTemplate, FulfillmentItem, ItemStatus, LineItem, Student};
use crate::validation::ValidationResult;
use crate::MAX_SCHOLARSHIP_PERCENT;

// =============================================================================
// Pricing
// =============================================================================

/// The price a template resolves to for one student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pricing {
    pub variant_id: String,
    pub original_amount: Money,
    pub discount_amount: Money,
    pub final_amount: Money,
}

/// Scholarship reduction of `original`. Zero unless the template applies
/// scholarships and the student has one; percentages above 100 are capped.
pub fn scholarship_discount(original: Money, percent: u8, apply_scholarship: bool) -> Money {
    if !apply_scholarship || percent == 0 {
        return Money::zero();
    }
    original.percentage(percent.min(MAX_SCHOLARSHIP_PERCENT))
}

/// Prices `template` for `student`, or `None` when no variant matches.
pub fn price_student(template: &BillingTemplate, student: &Student) -> Option<Pricing> {
    let variant = match_variant(&template.variants, student)?;
    let original = variant.amount();
    let discount = scholarship_discount(
        original,
        student.scholarship_percent,
        template.apply_scholarship,
    );

    Some(Pricing {
        variant_id: variant.id.clone(),
        original_amount: original,
        discount_amount: discount,
        final_amount: original - discount,
    })
}

/// Copies template line items into a fresh fulfillment snapshot.
pub fn seed_items(items: &[LineItem]) -> Vec<FulfillmentItem> {
    items
        .iter()
        .map(|item| FulfillmentItem {
            name: item.name.trim().to_string(),
            price: item.price,
            status: ItemStatus::Pending,
            delivered_at: None,
            delivered_by: None,
        })
        .collect()
}

// =============================================================================
// Preview
// =============================================================================

/// One student line of a generation preview.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRow {
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
    pub scholarship_percent: u8,
    pub variant_id: String,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
}

/// Totals over all preview rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSummary {
    pub total_students: usize,
    pub students_with_scholarship: usize,
    pub total_original: i64,
    pub total_discount: i64,
    pub total_final: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub template_id: String,
    pub students: Vec<PreviewRow>,
    pub summary: PreviewSummary,
}

/// Prices every student; students no variant matches are left out.
///
/// Fails only when a summary total would overflow, which bounded variant
/// amounts rule out for any realistic number of students.
pub fn build_preview(template: &BillingTemplate, students: &[Student]) -> ValidationResult<Preview> {
    let rows: Vec<PreviewRow> = students
        .iter()
        .filter_map(|student| {
            price_student(template, student).map(|pricing| PreviewRow {
                student_id: student.id.clone(),
                student_name: student.full_name.clone(),
                class_name: student.class_name.clone(),
                scholarship_percent: student.scholarship_percent,
                variant_id: pricing.variant_id,
                original_amount: pricing.original_amount.rupiah(),
                discount_amount: pricing.discount_amount.rupiah(),
                final_amount: pricing.final_amount.rupiah(),
            })
        })
        .collect();

    let summary = summarize(&rows)?;
    Ok(Preview {
        template_id: template.id.clone(),
        students: rows,
        summary,
    })
}

fn summarize(rows: &[PreviewRow]) -> ValidationResult<PreviewSummary> {
    let add = |total: i64, amount: i64, field: &str| {
        total
            .checked_add(amount)
            .ok_or_else(|| ValidationError::total_overflow(field))
    };

    rows.iter().try_fold(PreviewSummary::default(), |mut acc, row| {
        acc.total_students += 1;
        if row.discount_amount > 0 {
            acc.students_with_scholarship += 1;
        }
        acc.total_original = add(acc.total_original, row.original_amount, "totalOriginal")?;
        acc.total_discount = add(acc.total_discount, row.discount_amount, "totalDiscount")?;
        acc.total_final = add(acc.total_final, row.final_amount, "totalFinal")?;
        Ok(acc)
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StudentStatus, Variant};
    use chrono::Utc;

    fn student(id: &str, class_name: &str, scholarship: u8) -> Student {
        let now = Utc::now();
        Student {
            id: id.to_string(),
            registration_number: format!("REG-2026-{}", id),
            full_name: format!("Santri {}", id),
            class_name: class_name.to_string(),
            program: None,
            gender: None,
            scholarship_percent: scholarship,
            status: StudentStatus::Active,
            balance: 0,
            total_liabilities: 0,
            total_paid: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn template(apply_scholarship: bool, variants: Vec<Variant>) -> BillingTemplate {
        let now = Utc::now();
        BillingTemplate {
            id: "t1".to_string(),
            name: "Seragam".to_string(),
            description: None,
            category: "Seragam".to_string(),
            academic_year: Some("2026/2027".to_string()),
            semester: None,
            due_date: None,
            apply_scholarship,
            allow_installment: true,
            min_installment: None,
            max_installments: None,
            is_recurring: false,
            recurring_type: None,
            is_active: true,
            variants,
            items: vec![LineItem {
                name: "Baju".to_string(),
                price: Some(75_000),
            }],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_scholarship_math() {
        let t = template(true, vec![Variant::new("v1", "t1", 0, "*", None, None, 100_000)]);
        let pricing = price_student(&t, &student("1", "7A", 20)).unwrap();

        assert_eq!(pricing.original_amount.rupiah(), 100_000);
        assert_eq!(pricing.discount_amount.rupiah(), 20_000);
        assert_eq!(pricing.final_amount.rupiah(), 80_000);
    }

    #[test]
    fn test_scholarship_ignored_when_template_disables_it() {
        let t = template(false, vec![Variant::new("v1", "t1", 0, "*", None, None, 100_000)]);
        let pricing = price_student(&t, &student("1", "7A", 50)).unwrap();

        assert!(pricing.discount_amount.is_zero());
        assert_eq!(pricing.final_amount.rupiah(), 100_000);
    }

    #[test]
    fn test_discount_rounds_to_whole_rupiah() {
        assert_eq!(
            scholarship_discount(Money::from_rupiah(10_001), 33, true).rupiah(),
            3_300
        );
        assert_eq!(
            scholarship_discount(Money::from_rupiah(100), 150, true).rupiah(),
            100
        );
    }

    #[test]
    fn test_preview_scenario() {
        let t = template(true, vec![Variant::new("v1", "t1", 0, "7", None, None, 200_000)]);
        let students = vec![
            student("1", "7", 0),
            student("2", "7", 50),
            student("3", "7", 0),
        ];

        let preview = build_preview(&t, &students).unwrap();

        assert_eq!(preview.summary.total_students, 3);
        assert_eq!(preview.summary.students_with_scholarship, 1);
        assert_eq!(preview.summary.total_original, 600_000);
        assert_eq!(preview.summary.total_discount, 100_000);
        assert_eq!(preview.summary.total_final, 500_000);
    }

    #[test]
    fn test_preview_excludes_unmatched() {
        let t = template(false, vec![Variant::new("v1", "t1", 0, "8", None, None, 10_000)]);
        let students = vec![student("1", "Kelas 7A", 0), student("2", "Kelas 8A", 0)];

        let preview = build_preview(&t, &students).unwrap();

        assert_eq!(preview.students.len(), 1);
        assert_eq!(preview.students[0].student_id, "2");
        assert_eq!(preview.summary.total_final, 10_000);
    }

    #[test]
    fn test_preview_total_overflow_is_an_error() {
        let t = template(false, vec![Variant::new("v1", "t1", 0, "*", None, None, i64::MAX / 2 + 1)]);
        let students = vec![student("1", "Kelas 7A", 0), student("2", "Kelas 7B", 0)];

        let err = build_preview(&t, &students).unwrap_err();

        assert!(matches!(err, ValidationError::OutOfRange { .. }));
    }

    #[test]
    fn test_seed_items_start_pending() {
        let items = seed_items(&[
            LineItem {
                name: "Baju".to_string(),
                price: Some(75_000),
            },
            LineItem {
                name: "Celana".to_string(),
                price: None,
            },
        ]);

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
        assert!(items.iter().all(|i| i.delivered_at.is_none() && i.delivered_by.is_none()));
        assert_eq!(items[0].price, Some(75_000));
    }
}
