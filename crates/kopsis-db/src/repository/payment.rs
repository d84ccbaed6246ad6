//! # Payment Repository
//!
//! Payments recorded against liabilities.
//!
//! A payment row is created by the payment ledger's `pay` and removed only by
//! its `cancel`; both happen inside the same transaction as the liability and
//! student updates.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use kopsis_core::{Payment, PaymentFilter, PaymentMethod};

const PAYMENT_COLUMNS: &str = "id, receipt_number, liability_id, student_id, amount, \
     payment_method, cashier_id, notes, payment_date";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: String,
    receipt_number: String,
    liability_id: String,
    student_id: String,
    amount: i64,
    payment_method: PaymentMethod,
    cashier_id: String,
    notes: Option<String>,
    payment_date: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            receipt_number: row.receipt_number,
            liability_id: row.liability_id,
            student_id: row.student_id,
            amount: row.amount,
            payment_method: row.payment_method,
            cashier_id: row.cashier_id,
            notes: row.notes,
            payment_date: row.payment_date,
        }
    }
}

/// Repository for payments.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Payments matching `filter`, newest first.
    pub async fn list(&self, filter: &PaymentFilter) -> DbResult<Vec<Payment>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM payments WHERE 1 = 1",
            PAYMENT_COLUMNS
        ));
        if let Some(student_id) = &filter.student_id {
            qb.push(" AND student_id = ").push_bind(student_id);
        }
        if let Some(liability_id) = &filter.liability_id {
            qb.push(" AND liability_id = ").push_bind(liability_id);
        }
        qb.push(" ORDER BY payment_date DESC, id DESC");

        let rows: Vec<PaymentRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Payment::from).collect())
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Payment>> {
    let sql = format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS);
    let row: Option<PaymentRow> = sqlx::query_as(&sql).bind(id).fetch_optional(conn).await?;
    Ok(row.map(Payment::from))
}

pub(crate) async fn insert(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    debug!(
        id = %payment.id,
        liability_id = %payment.liability_id,
        amount = payment.amount,
        receipt_number = %payment.receipt_number,
        "Recording payment"
    );

    sqlx::query(
        r#"
        INSERT INTO payments (
            id, receipt_number, liability_id, student_id, amount,
            payment_method, cashier_id, notes, payment_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.receipt_number)
    .bind(&payment.liability_id)
    .bind(&payment.student_id)
    .bind(payment.amount)
    .bind(payment.payment_method)
    .bind(&payment.cashier_id)
    .bind(&payment.notes)
    .bind(payment.payment_date)
    .execute(conn)
    .await?;

    Ok(())
}

/// Returns `false` when the payment was already gone.
pub(crate) async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM payments WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Number of payments recorded against a liability.
pub(crate) async fn count_for_liability(conn: &mut SqliteConnection, liability_id: &str) -> DbResult<u32> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE liability_id = ?1")
        .bind(liability_id)
        .fetch_one(conn)
        .await?;
    Ok(count.max(0) as u32)
}

/// Generates a receipt number in format: PAY-YYYYMMDDHHMMSS-XXXXXXXX
///
/// ## Format
/// - YYYYMMDDHHMMSS: payment time (UTC)
/// - XXXXXXXX: first 8 hex digits of a v4 UUID, upper case
///
/// The UNIQUE index on `receipt_number` backs this up.
///
/// ## Example
/// `PAY-20260715093012-3F9A1C7E`
pub fn generate_receipt_number(at: DateTime<Utc>) -> String {
    let entropy = Uuid::new_v4().simple().to_string();
    format!(
        "PAY-{}-{}",
        at.format("%Y%m%d%H%M%S"),
        entropy[..8].to_uppercase()
    )
}
