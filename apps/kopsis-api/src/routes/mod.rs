//! HTTP route modules. Each exposes `routes()` with its full paths; the
//! top-level router merges them.

pub mod health;
pub mod liabilities;
pub mod payments;
pub mod students;
pub mod templates;
