//! # Validation Module
//!
//! Input validation for the billing ledger.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin frontend                                               │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Ledger service (Rust)                                        │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: rejected before any write                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE (receipt number, one live liability per template)          │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kopsis_core::validation::{validate_class_filter, validate_payment_amount};
//!
//! let classes = validate_class_filter(&[" Kelas 7A ".to_string()]).unwrap();
//! assert_eq!(classes, vec!["Kelas 7A".to_string()]);
//!
//! assert!(validate_payment_amount(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::{AdhocLiability, LineItem, NewStudent, TemplateDraft, VariantInput};
use crate::{MAX_AMOUNT, MAX_CLASS_FILTER, MAX_SCHOLARSHIP_PERCENT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

pub const MAX_NAME_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field.
///
/// ## Example
/// ```rust
/// use kopsis_core::validation::validate_text;
///
/// assert!(validate_text("name", "Seragam 2026", 200).is_ok());
/// assert!(validate_text("name", "   ", 200).is_err());
/// assert!(validate_text("name", &"A".repeat(300), 200).is_err());
/// ```
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

fn validate_optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Validates an entity id.
///
/// ## Example
/// ```rust
/// use kopsis_core::validation::validate_uuid;
///
/// assert!(validate_uuid("liabilityId", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("liabilityId", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    uuid::Uuid::parse_str(id.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Payment and variant amounts must be strictly positive.
pub fn validate_payment_amount(amount: i64) -> ValidationResult<()> {
    validate_amount("amount", amount)
}

/// A billed or paid amount: positive and at most [`MAX_AMOUNT`].
pub fn validate_amount(field: &str, amount: i64) -> ValidationResult<()> {
    validate_positive(field, amount)?;
    if amount > MAX_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_AMOUNT,
        });
    }
    Ok(())
}

fn validate_positive(field: &str, value: i64) -> ValidationResult<()> {
    if value <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Scholarship is a whole percentage, 0..=100.
pub fn validate_scholarship_percent(percent: u8) -> ValidationResult<()> {
    if percent > MAX_SCHOLARSHIP_PERCENT {
        return Err(ValidationError::OutOfRange {
            field: "scholarshipPercent".to_string(),
            min: 0,
            max: MAX_SCHOLARSHIP_PERCENT as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Trims the selected class names and rejects an empty or blank selection.
/// Duplicates are dropped, order is kept.
pub fn validate_class_filter(class_names: &[String]) -> ValidationResult<Vec<String>> {
    if class_names.is_empty() {
        return Err(ValidationError::Empty {
            field: "classNames".to_string(),
        });
    }
    if class_names.len() > MAX_CLASS_FILTER {
        return Err(ValidationError::OutOfRange {
            field: "classNames".to_string(),
            min: 1,
            max: MAX_CLASS_FILTER as i64,
        });
    }

    let mut cleaned: Vec<String> = Vec::with_capacity(class_names.len());
    for name in class_names {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidFormat {
                field: "classNames".to_string(),
                reason: "class name must not be blank".to_string(),
            });
        }
        if !cleaned.iter().any(|c| c == name) {
            cleaned.push(name.to_string());
        }
    }

    Ok(cleaned)
}

pub fn validate_variants(variants: &[VariantInput]) -> ValidationResult<()> {
    if variants.is_empty() {
        return Err(ValidationError::Empty {
            field: "variants".to_string(),
        });
    }

    for variant in variants {
        let has_token = variant
            .class_names
            .split(',')
            .any(|token| !token.trim().is_empty());
        if !has_token {
            return Err(ValidationError::InvalidFormat {
                field: "variants.classNames".to_string(),
                reason: "needs at least one class or *".to_string(),
            });
        }
        validate_amount("variants.amount", variant.amount)?;
    }

    Ok(())
}

/// Item names are compared trimmed and case-insensitively; two items with
/// the same name could not be told apart when delivered.
pub fn validate_line_items(items: &[LineItem]) -> ValidationResult<()> {
    let mut seen: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        validate_text("items.name", &item.name, MAX_NAME_LEN)?;
        if matches!(item.price, Some(p) if !(0..=MAX_AMOUNT).contains(&p)) {
            return Err(ValidationError::OutOfRange {
                field: "items.price".to_string(),
                min: 0,
                max: MAX_AMOUNT,
            });
        }

        let key = item.name.trim().to_lowercase();
        if seen.contains(&key) {
            return Err(ValidationError::InvalidFormat {
                field: "items.name".to_string(),
                reason: format!("duplicate item '{}'", item.name.trim()),
            });
        }
        seen.push(key);
    }
    Ok(())
}

/// Everything a template needs before it is stored: name, category, at
/// least one well-formed variant, sane items and installment settings.
pub fn validate_template_draft(draft: &TemplateDraft) -> ValidationResult<()> {
    validate_text("name", &draft.name, MAX_NAME_LEN)?;
    validate_text("category", &draft.category, MAX_NAME_LEN)?;
    validate_optional_text("description", draft.description.as_deref(), MAX_DESCRIPTION_LEN)?;
    validate_variants(&draft.variants)?;
    validate_line_items(&draft.items)?;

    if let Some(min) = draft.min_installment {
        validate_amount("minInstallment", min)?;
    }
    if draft.max_installments == Some(0) {
        return Err(ValidationError::MustBePositive {
            field: "maxInstallments".to_string(),
        });
    }

    Ok(())
}

pub fn validate_adhoc(input: &AdhocLiability) -> ValidationResult<Vec<String>> {
    validate_text("title", &input.title, MAX_NAME_LEN)?;
    validate_optional_text("description", input.description.as_deref(), MAX_DESCRIPTION_LEN)?;
    validate_amount("amount", input.amount)?;
    validate_class_filter(&input.filter.class_names)
}

pub fn validate_new_student(student: &NewStudent) -> ValidationResult<()> {
    validate_text("registrationNumber", &student.registration_number, 50)?;
    validate_text("fullName", &student.full_name, MAX_NAME_LEN)?;
    validate_text("className", &student.class_name, 50)?;
    validate_scholarship_percent(student.scholarship_percent)
}

// =============================================================================
// Unit Tests
// =============================================================================
