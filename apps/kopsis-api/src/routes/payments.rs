use axum::extract::{Path, Query, State};
use axum::routing::{delete, get};
use axum::{Json, Router};

use kopsis_core::{CancelOutcome, Payment, PaymentFilter};

use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/payments", get(list))
        .route("/api/payments/{id}", delete(cancel))
}

/// Newest first, optionally narrowed to one student or liability.
async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<PaymentFilter>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    Ok(Json(state.db.payment_ledger().list(&filter).await?))
}

/// Cancels a payment and reopens its liability.
async fn cancel(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<CancelOutcome>, ApiError> {
    Ok(Json(state.db.payment_ledger().cancel(&id, &actor).await?))
}
