//! # Repository Module
//!
//! Database repository implementations for the billing ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways In                                          │
//! │                                                                         │
//! │  Handler (read)                    Ledger service (write)              │
//! │       │                                  │                              │
//! │       │ db.liabilities().get(id)         │ let mut tx = db.begin_write()│
//! │       ▼                                  ▼                              │
//! │  LiabilityRepository            liability::fetch(&mut *tx, id)         │
//! │  (owns a pool clone,            liability::update_paid(&mut *tx, ..)   │
//! │   acquires a connection)        student::apply_delta(&mut *tx, ..)     │
//! │       │                                  │ tx.commit()                  │
//! │       └──────────────┬───────────────────┘                              │
//! │                      ▼                                                  │
//! │                SQLite Database                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each module exposes a repository struct for pool-level reads and simple
//! writes, plus `pub(crate)` functions over `&mut SqliteConnection` that the
//! ledger services compose inside one transaction.
//!
//! ## Available Repositories
//!
//! - [`StudentRepository`] - Student directory and ledger fields
//! - [`TemplateRepository`] - Billing templates and their variants
//! - [`LiabilityRepository`] - Liabilities with item snapshots
//! - [`PaymentRepository`] - Payments and receipt numbers
//! - [`AuditRepository`] - Audit trail

pub mod audit;
pub mod liability;
pub mod payment;
pub mod student;
pub mod template;

pub use audit::AuditRepository;
pub use liability::LiabilityRepository;
pub use payment::PaymentRepository;
pub use student::StudentRepository;
pub use template::TemplateRepository;

use uuid::Uuid;

/// Generates a new entity ID.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
