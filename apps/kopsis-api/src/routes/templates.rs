//! Billing template catalog, preview and generation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use kopsis_core::{
    BillingTemplate, GenerateRequest, GenerationOutcome, Preview, TemplateDraft, TemplateFilter,
    TemplateSummary,
};

use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/billing-templates", get(list).post(create))
        .route("/api/billing-templates/categories", get(categories))
        .route(
            "/api/billing-templates/{id}",
            get(fetch).put(update).delete(remove),
        )
        .route("/api/billing-templates/{id}/preview", post(preview))
        .route("/api/billing-templates/{id}/generate", post(generate))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub class_names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: bool,
}

async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<TemplateFilter>,
) -> Result<Json<Vec<TemplateSummary>>, ApiError> {
    Ok(Json(state.db.catalog().list(&filter).await?))
}

async fn categories(State(state): State<SharedState>) -> Json<Vec<&'static str>> {
    Json(state.db.catalog().categories())
}

async fn fetch(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<BillingTemplate>, ApiError> {
    Ok(Json(state.db.catalog().get(&id).await?))
}

async fn create(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
    Json(draft): Json<TemplateDraft>,
) -> Result<(StatusCode, Json<BillingTemplate>), ApiError> {
    let created = state.db.catalog().create(&draft, &actor).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(draft): Json<TemplateDraft>,
) -> Result<Json<BillingTemplate>, ApiError> {
    Ok(Json(state.db.catalog().update(&id, &draft, &actor).await?))
}

async fn remove(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    state.db.catalog().delete(&id, &actor).await?;
    Ok(Json(Deleted { deleted: true }))
}

async fn preview(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<PreviewRequest>,
) -> Result<Json<Preview>, ApiError> {
    Ok(Json(state.db.generator().preview(&id, &body.class_names).await?))
}

async fn generate(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(request): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerationOutcome>), ApiError> {
    let outcome = state.db.generator().generate(&id, &request, &actor).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
