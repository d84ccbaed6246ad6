//! Liabilities: ad-hoc issuance, payment, fulfillment and deletion.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use kopsis_core::validation::validate_uuid;
use kopsis_core::{
    AdhocLiability, BulkFulfillmentRequest, GenerationOutcome, ItemUpdate, Liability, LiabilityDetail,
    PaymentReceipt, PaymentRequest, ReconcileReport,
};

use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/liabilities", post(create_adhoc))
        .route("/api/liabilities/pay", post(pay))
        .route("/api/liabilities/bulk-fulfillment", post(bulk_fulfillment))
        .route("/api/liabilities/reconcile", post(reconcile))
        .route("/api/liabilities/{id}", get(fetch).delete(remove))
        .route("/api/liabilities/{id}/fulfillment", patch(update_fulfillment))
}

#[derive(Debug, Deserialize)]
pub struct FulfillmentUpdate {
    pub items: Vec<ItemUpdate>,
}

#[derive(Debug, Serialize)]
pub struct BulkOutcome {
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: bool,
}

async fn create_adhoc(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<AdhocLiability>,
) -> Result<(StatusCode, Json<GenerationOutcome>), ApiError> {
    let outcome = state.db.generator().create_adhoc(&input, &actor).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn fetch(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<LiabilityDetail>, ApiError> {
    validate_uuid("liabilityId", &id)?;
    state
        .db
        .liabilities()
        .get_detail(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Liability", &id))
}

async fn remove(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    state.db.payment_ledger().delete_liability(&id, &actor).await?;
    Ok(Json(Deleted { deleted: true }))
}

async fn pay(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<PaymentReceipt>), ApiError> {
    let receipt = state.db.payment_ledger().pay(&request, &actor).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn update_fulfillment(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(body): Json<FulfillmentUpdate>,
) -> Result<Json<Liability>, ApiError> {
    let updated = state.db.fulfillment().update_items(&id, body.items, &actor).await?;
    Ok(Json(updated))
}

async fn bulk_fulfillment(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<BulkFulfillmentRequest>,
) -> Result<Json<BulkOutcome>, ApiError> {
    let updated = state.db.fulfillment().bulk_update(&request, &actor).await?;
    Ok(Json(BulkOutcome { updated }))
}

async fn reconcile(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<ReconcileReport>, ApiError> {
    Ok(Json(state.db.reconciler().reconcile_paid_amounts(&actor).await?))
}
