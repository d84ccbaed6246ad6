//! # kopsis-core: Pure Billing Logic for Kopsis
//!
//! This crate holds every billing rule of the cooperative back office as pure
//! functions with zero I/O dependencies. The database crate persists what
//! these functions decide.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kopsis Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Admin Frontend                               │   │
//! │  │   Templates ──► Preview ──► Generate ──► Pay ──► Hand over     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON HTTP                              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kopsis-api (axum)                            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kopsis-db (ledger services)                  │   │
//! │  │   one SQLite transaction per use case                           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kopsis-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐ │   │
//! │  │   │ matcher │ │ billing │ │ payment │ │fulfilment│ │ money  │ │   │
//! │  │   │ Variant │ │ Preview │ │ Status  │ │  Items   │ │ Money  │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//! ```rust
//! use kopsis_core::money::Money;
//!
//! let price = Money::from_rupiah(100_000);
//! let discount = price.percentage(20);
//!
//! assert_eq!(discount.rupiah(), 20_000);
//! assert_eq!((price - discount).rupiah(), 80_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod billing;
pub mod error;
pub mod fulfillment;
pub mod matcher;
pub mod money;
pub mod payment;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use billing::{build_preview, price_student, Preview, PreviewRow, PreviewSummary, Pricing};
pub use error::{CoreError, CoreResult, ValidationError};
pub use matcher::{match_variant, VariantPredicate};
pub use money::Money;
pub use payment::LedgerDelta;
pub use types::*;
pub use validation::ValidationResult;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Class token that matches every class.
pub const WILDCARD_CLASS: &str = "*";

/// Billing categories offered by the template form.
pub const BILLING_CATEGORIES: &[&str] = &[
    "Buku LKS",
    "Buku Ismuba",
    "Kitab Pondok",
    "Seragam",
    "Lainnya",
];

/// Upper bound on scholarship percentages.
pub const MAX_SCHOLARSHIP_PERCENT: u8 = 100;

/// Maximum number of liabilities touched by one bulk fulfillment call.
pub const MAX_BULK_LIABILITIES: usize = 1000;

/// Largest single amount (variant, item price, ad-hoc bill, payment) in
/// rupiah. Keeps every per-student and per-batch total far inside `i64`.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Maximum number of classes in one generation or ad-hoc filter.
pub const MAX_CLASS_FILTER: usize = 1000;
