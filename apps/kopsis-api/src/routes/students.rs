//! Student directory and ledger verification.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use kopsis_core::validation::{validate_new_student, validate_uuid};
use kopsis_core::{LedgerCheck, Liability, NewStudent, Student};

use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/students", post(enroll))
        .route("/api/students/{id}", get(fetch))
        .route("/api/students/{id}/liabilities", get(liabilities))
        .route("/api/students/{id}/ledger", get(verify_ledger))
        .route("/api/students/{id}/ledger/repair", post(repair_ledger))
}

async fn enroll(
    State(state): State<SharedState>,
    Json(input): Json<NewStudent>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    validate_new_student(&input)?;
    let student = state.db.students().insert(&input).await?;
    tracing::info!(id = %student.id, class = %student.class_name, "Student enrolled");
    Ok((StatusCode::CREATED, Json(student)))
}

async fn fetch(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Student>, ApiError> {
    validate_uuid("studentId", &id)?;
    state
        .db
        .students()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Student", &id))
}

async fn liabilities(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Liability>>, ApiError> {
    validate_uuid("studentId", &id)?;
    Ok(Json(state.db.liabilities().list_for_student(&id).await?))
}

/// Stored versus recomputed ledger fields. Read-only.
async fn verify_ledger(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<LedgerCheck>, ApiError> {
    Ok(Json(state.db.reconciler().verify_student_ledger(&id).await?))
}

async fn repair_ledger(
    State(state): State<SharedState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<LedgerCheck>, ApiError> {
    Ok(Json(state.db.reconciler().repair_student_ledger(&id, &actor).await?))
}
