//! # kopsis-db: Storage and Ledger Services for Kopsis
//!
//! This crate provides database access and the ledger services of the
//! billing system. It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kopsis Data Flow                                 │
//! │                                                                         │
//! │  HTTP handler (POST /api/liabilities/pay)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kopsis-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │    Ledger     │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (ledger/)    │───►│ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ PaymentLedger │    │ StudentRepo   │    │ 001_init.sql │  │   │
//! │  │   │ Generator     │    │ LiabilityRepo │    │ 002_idx.sql  │  │   │
//! │  │   │ Fulfillment   │    │ PaymentRepo   │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │ KeyedLocks + one write transaction per mutation    │   │
//! │  └───────────┼─────────────────────────────────────────────────────┘   │
//! │              ▼                                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and ledger error types
//! - [`repository`] - Reads and single-table writes
//! - [`ledger`] - Services that move money, one transaction each
//! - [`locks`] - Per-liability and per-template serialization
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kopsis_db::{Database, DbConfig};
//! use kopsis_core::{Actor, GenerateRequest};
//!
//! let db = Database::new(DbConfig::new("path/to/kopsis.db")).await?;
//!
//! let outcome = db
//!     .generator()
//!     .generate(&template_id, &GenerateRequest { class_names, exclude_student_ids: vec![] }, &actor)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, LedgerError, LedgerResult};
pub use ledger::{FulfillmentTracker, LiabilityGenerator, PaymentLedger, Reconciler, TemplateCatalog};
pub use locks::KeyedLocks;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    AuditRepository, LiabilityRepository, PaymentRepository, StudentRepository, TemplateRepository,
};
