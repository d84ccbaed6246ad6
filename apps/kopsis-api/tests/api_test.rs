//! HTTP-level tests: requests go through the full router (extractors, error
//! mapping, status codes) against an in-memory database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use kopsis_api::{router, ApiConfig, AppState};
use kopsis_db::{Database, DbConfig};

async fn setup() -> (Router, Arc<AppState>) {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database");
    let state = Arc::new(AppState {
        db,
        config: ApiConfig::for_tests(),
    });
    (router(state.clone()), state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, method, uri, body, None).await
}

async fn send_as(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    actor: Option<(&str, &str)>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, name)) = actor {
        builder = builder.header("X-Actor-Id", id).header("X-Actor-Name", name);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn enroll(app: &Router, reg: &str, class: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/students",
        Some(json!({
            "registrationNumber": reg,
            "fullName": format!("Siswa {}", reg),
            "className": class,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

async fn create_uniform_template(app: &Router, amount: i64) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/billing-templates",
        Some(json!({
            "name": "Seragam 2026/2027",
            "category": "Seragam",
            "variants": [{ "classNames": "*", "amount": amount }],
            "items": [{ "name": "Baju" }, { "name": "Celana" }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

/// One student in Kelas 7A billed `amount`. Returns (student id, liability id).
async fn billed(app: &Router, amount: i64) -> (String, String) {
    let student_id = enroll(app, "REG-001", "Kelas 7A").await;
    let template_id = create_uniform_template(app, amount).await;

    let (status, body) = send(
        app,
        Method::POST,
        &format!("/api/billing-templates/{}/generate", template_id),
        Some(json!({ "classNames": ["Kelas 7A"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["created"], 1);

    let (_, liabilities) = send(
        app,
        Method::GET,
        &format!("/api/students/{}/liabilities", student_id),
        None,
    )
    .await;
    let liability_id = liabilities[0]["id"].as_str().unwrap().to_string();
    (student_id, liability_id)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = setup().await;

    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["migrationsTotal"], body["migrationsApplied"]);
}

#[tokio::test]
async fn test_template_create_and_list() {
    let (app, _) = setup().await;
    create_uniform_template(&app, 300_000).await;

    let (status, body) = send(&app, Method::GET, "/api/billing-templates?category=Seragam", None).await;

    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);

    let (_, categories) = send(&app, Method::GET, "/api/billing-templates/categories", None).await;
    assert!(categories.as_array().unwrap().contains(&json!("Seragam")));
}

#[tokio::test]
async fn test_template_without_variants_is_bad_request() {
    let (app, _) = setup().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/billing-templates",
        Some(json!({ "name": "Kosong", "category": "Lainnya", "variants": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_generate_twice_reports_skipped() {
    let (app, _) = setup().await;
    enroll(&app, "REG-001", "Kelas 7A").await;
    let template_id = create_uniform_template(&app, 300_000).await;
    let uri = format!("/api/billing-templates/{}/generate", template_id);

    let (first, _) = send(&app, Method::POST, &uri, Some(json!({ "classNames": ["Kelas 7A"] }))).await;
    let (second, body) = send(&app, Method::POST, &uri, Some(json!({ "classNames": ["Kelas 7A"] }))).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_preview_does_not_bill() {
    let (app, _) = setup().await;
    let student_id = enroll(&app, "REG-001", "Kelas 7A").await;
    let template_id = create_uniform_template(&app, 300_000).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/billing-templates/{}/preview", template_id),
        Some(json!({ "classNames": ["Kelas 7A"] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["totalStudents"], 1);
    assert_eq!(body["summary"]["totalFinal"], 300_000);

    let (_, student) = send(&app, Method::GET, &format!("/api/students/{}", student_id), None).await;
    assert_eq!(student["balance"], 0);
}

#[tokio::test]
async fn test_pay_returns_receipt() {
    let (app, _) = setup().await;
    let (student_id, liability_id) = billed(&app, 300_000).await;

    let (status, receipt) = send(
        &app,
        Method::POST,
        "/api/liabilities/pay",
        Some(json!({ "liabilityId": liability_id, "amount": 100_000, "paymentMethod": "cash" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["status"], "partial");
    assert_eq!(receipt["remaining"], 200_000);
    assert!(receipt["receiptNumber"].as_str().unwrap().starts_with("PAY-"));

    let (_, student) = send(&app, Method::GET, &format!("/api/students/{}", student_id), None).await;
    assert_eq!(student["balance"], 200_000);
    assert_eq!(student["totalPaid"], 100_000);
}

#[tokio::test]
async fn test_overpayment_is_conflict() {
    let (app, _) = setup().await;
    let (_, liability_id) = billed(&app, 100_000).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/liabilities/pay",
        Some(json!({ "liabilityId": liability_id, "amount": 150_000, "paymentMethod": "transfer" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (_, detail) = send(&app, Method::GET, &format!("/api/liabilities/{}", liability_id), None).await;
    assert_eq!(detail["liability"]["paidAmount"], 0);
}

#[tokio::test]
async fn test_cancel_payment_reopens_liability() {
    let (app, _) = setup().await;
    let (_, liability_id) = billed(&app, 100_000).await;

    let (_, receipt) = send(
        &app,
        Method::POST,
        "/api/liabilities/pay",
        Some(json!({ "liabilityId": liability_id, "amount": 100_000, "paymentMethod": "qris" })),
    )
    .await;
    assert_eq!(receipt["status"], "paid");

    let payment_id = receipt["paymentId"].as_str().unwrap();
    let (status, outcome) = send(&app, Method::DELETE, &format!("/api/payments/{}", payment_id), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "unpaid");
    assert_eq!(outcome["paidAmount"], 0);

    let (_, payments) = send(
        &app,
        Method::GET,
        &format!("/api/payments?liabilityId={}", liability_id),
        None,
    )
    .await;
    assert!(payments.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_liability_is_not_found() {
    let (app, _) = setup().await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/liabilities/00000000-0000-4000-8000-000000000000",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body["message"].as_str().unwrap().contains("Liability"));
}

#[tokio::test]
async fn test_fulfillment_patch_and_bulk() {
    let (app, _) = setup().await;
    let (_, liability_id) = billed(&app, 100_000).await;

    let (status, updated) = send(
        &app,
        Method::PATCH,
        &format!("/api/liabilities/{}/fulfillment", liability_id),
        Some(json!({ "items": [
            { "name": "Baju", "status": "delivered" },
            { "name": "Celana", "status": "pending" },
        ] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(updated["items"][0]["deliveredAt"].is_string());

    let (status, bulk) = send(
        &app,
        Method::POST,
        "/api/liabilities/bulk-fulfillment",
        Some(json!({ "liabilityIds": [liability_id], "itemNames": ["Celana"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bulk["updated"], 1);
}

#[tokio::test]
async fn test_actor_headers_reach_audit_trail() {
    let (app, state) = setup().await;
    let (_, liability_id) = billed(&app, 100_000).await;

    let (status, _) = send_as(
        &app,
        Method::POST,
        "/api/liabilities/pay",
        Some(json!({ "liabilityId": liability_id, "amount": 50_000, "paymentMethod": "cash" })),
        Some(("cashier-7", "Pak Budi")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let entries = state
        .db
        .audit()
        .list_for_entity("liability", &liability_id)
        .await
        .unwrap();
    let pay = entries.iter().find(|e| e.action == "pay").unwrap();
    assert_eq!(pay.actor_id, "cashier-7");
    assert_eq!(pay.actor_name, "Pak Budi");
}

#[tokio::test]
async fn test_ledger_verification() {
    let (app, _) = setup().await;
    let (student_id, _) = billed(&app, 250_000).await;

    let (status, check) = send(
        &app,
        Method::GET,
        &format!("/api/students/{}/ledger", student_id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["storedBalance"], 250_000);
    assert_eq!(check["computedBalance"], 250_000);
}
