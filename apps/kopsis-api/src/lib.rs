//! # Kopsis API
//!
//! JSON-over-HTTP surface of the billing ledger. Handlers are thin: they
//! resolve the actor, call one ledger service and map its error.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kopsis API Server                              │
//! │                                                                         │
//! │  Browser ──► axum Router ──► routes/* ──► kopsis-db ledger ──► SQLite   │
//! │                 │                │                                      │
//! │            TraceLayer      CurrentActor                                 │
//! │            CorsLayer    (X-Actor-Id / X-Actor-Name)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod actor;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use kopsis_db::Database;

pub use actor::CurrentActor;
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ErrorCode};

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub config: ApiConfig,
}

pub type SharedState = Arc<AppState>;

/// Builds the full application router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .merge(routes::health::routes())
        .merge(routes::templates::routes())
        .merge(routes::liabilities::routes())
        .merge(routes::payments::routes())
        .merge(routes::students::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
