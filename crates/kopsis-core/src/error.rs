//! # Error Types
//!
//! Domain-specific error types for kopsis-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kopsis-core errors (this file)                                        │
//! │  ├── CoreError        - Billing rule violations                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  kopsis-db errors (separate crate)                                     │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── LedgerError      - What the ledger services return                │
//! │                                                                         │
//! │  kopsis-api errors (in app)                                            │
//! │  └── ApiError         - What the frontend sees (serialized)            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → ApiError → Frontend │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Billing rule violations.
///
/// All of these are raised before any write happens, so a caller that
/// receives one knows the ledger is untouched.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The liability is already settled.
    #[error("Liability {liability_id} is already paid")]
    AlreadyPaid { liability_id: String },

    /// Payment would take the paid amount past the liability amount.
    ///
    /// ## User Workflow
    /// ```text
    /// Outstanding: Rp 50.000
    ///      │
    ///      ▼
    /// Cashier enters Rp 50.001
    ///      │
    ///      ▼
    /// Overpayment { requested: 50001, remaining: 50000 }
    ///      │
    ///      ▼
    /// UI shows: "Payment exceeds the remaining Rp 50.000"
    /// ```
    #[error("Payment of {requested} exceeds the remaining {remaining}")]
    Overpayment { requested: Money, remaining: Money },

    /// The template does not allow installments and the payment is partial.
    #[error("Installments are not allowed; pay the full remaining {remaining}")]
    InstallmentNotAllowed { remaining: Money },

    /// A partial payment is smaller than the template minimum.
    #[error("Installment of {requested} is below the minimum {minimum}")]
    BelowMinimumInstallment { requested: Money, minimum: Money },

    /// The template caps the number of payments and the cap is used up.
    #[error("Installment limit of {max} payments reached")]
    InstallmentLimitReached { max: u32 },

    /// The last allowed installment has to settle the liability.
    #[error("Final installment must settle the remaining {remaining}, got {requested}")]
    FinalInstallmentMustSettle { requested: Money, remaining: Money },

    /// Deleting a liability that still carries collected money.
    #[error("Liability {liability_id} has {paid} in payments; cancel them before deleting")]
    LiabilityHasPayments { liability_id: String, paid: Money },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when a request doesn't meet requirements and are checked
/// before the ledger is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, blank class token).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A list that needs at least one element is empty.
    #[error("{field} needs at least one entry")]
    Empty { field: String },
}

impl ValidationError {
    /// A running total that no longer fits in an `i64`.
    pub fn total_overflow(field: impl Into<String>) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min: 0,
            max: i64::MAX,
        }
    }

    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
