//! # Liability Repository
//!
//! Liabilities with their embedded fulfillment item snapshot.
//!
//! ## Guarded Writes
//! ```text
//! UPDATE liabilities SET paid_amount = :new ...
//! WHERE id = :id AND paid_amount = :old AND deleted_at IS NULL
//!                    └──────────────┘
//!     0 rows affected → somebody else moved paid_amount first
//! ```
//!
//! Every write that depends on a value read earlier in the transaction
//! carries that value in its WHERE clause. The ledger services treat zero
//! affected rows as a concurrent modification and roll back.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kopsis_core::{
    FulfillmentItem, Liability, LiabilityDetail, LiabilityStatus, StudentSummary,
};

use super::{student, template};

const LIABILITY_COLUMNS: &str = "id, student_id, template_id, title, description, \
     original_amount, discount_amount, amount, paid_amount, status, due_date, items, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct LiabilityRow {
    id: String,
    student_id: String,
    template_id: Option<String>,
    title: String,
    description: Option<String>,
    original_amount: i64,
    discount_amount: i64,
    amount: i64,
    paid_amount: i64,
    status: LiabilityStatus,
    due_date: Option<NaiveDate>,
    items: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LiabilityRow> for Liability {
    type Error = DbError;

    fn try_from(row: LiabilityRow) -> DbResult<Self> {
        let items: Vec<FulfillmentItem> = serde_json::from_str(&row.items)?;
        Ok(Liability {
            id: row.id,
            student_id: row.student_id,
            template_id: row.template_id,
            title: row.title,
            description: row.description,
            original_amount: row.original_amount,
            discount_amount: row.discount_amount,
            amount: row.amount,
            paid_amount: row.paid_amount,
            status: row.status,
            due_date: row.due_date,
            items,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for liabilities.
#[derive(Debug, Clone)]
pub struct LiabilityRepository {
    pool: SqlitePool,
}

impl LiabilityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LiabilityRepository { pool }
    }

    /// Gets a live (not deleted) liability.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Liability>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Liability with its student and template.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<LiabilityDetail>> {
        let mut conn = self.pool.acquire().await?;

        let Some(liability) = fetch(&mut conn, id).await? else {
            return Ok(None);
        };

        let student = student::fetch(&mut conn, &liability.student_id)
            .await?
            .ok_or_else(|| DbError::not_found("Student", liability.student_id.clone()))?;

        let template = match &liability.template_id {
            Some(template_id) => template::fetch(&mut conn, template_id).await?,
            None => None,
        };

        Ok(Some(LiabilityDetail {
            student: StudentSummary::from(&student),
            liability,
            template,
        }))
    }

    /// Live liabilities of a student, newest first.
    pub async fn list_for_student(&self, student_id: &str) -> DbResult<Vec<Liability>> {
        let mut conn = self.pool.acquire().await?;
        fetch_for_student(&mut conn, student_id).await
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Liability>> {
    let sql = format!(
        "SELECT {} FROM liabilities WHERE id = ?1 AND deleted_at IS NULL",
        LIABILITY_COLUMNS
    );
    let row: Option<LiabilityRow> = sqlx::query_as(&sql).bind(id).fetch_optional(conn).await?;
    row.map(Liability::try_from).transpose()
}

/// Live liabilities among `ids`. Unknown or deleted ids are left out.
pub(crate) async fn fetch_many(conn: &mut SqliteConnection, ids: &[String]) -> DbResult<Vec<Liability>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM liabilities WHERE deleted_at IS NULL AND id IN (",
        LIABILITY_COLUMNS
    ));
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let rows: Vec<LiabilityRow> = qb.build_query_as().fetch_all(conn).await?;
    rows.into_iter().map(Liability::try_from).collect()
}

pub(crate) async fn fetch_for_student(
    conn: &mut SqliteConnection,
    student_id: &str,
) -> DbResult<Vec<Liability>> {
    let sql = format!(
        "SELECT {} FROM liabilities WHERE student_id = ?1 AND deleted_at IS NULL \
         ORDER BY created_at DESC, id DESC",
        LIABILITY_COLUMNS
    );
    let rows: Vec<LiabilityRow> = sqlx::query_as(&sql).bind(student_id).fetch_all(conn).await?;
    rows.into_iter().map(Liability::try_from).collect()
}

/// Students among `student_ids` that already hold a live liability for the
/// template.
pub(crate) async fn billed_students(
    conn: &mut SqliteConnection,
    template_id: &str,
    student_ids: &[String],
) -> DbResult<HashSet<String>> {
    if student_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT student_id FROM liabilities WHERE deleted_at IS NULL AND template_id = ",
    );
    qb.push_bind(template_id);
    qb.push(" AND student_id IN (");
    let mut separated = qb.separated(", ");
    for id in student_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let rows: Vec<(String,)> = qb.build_query_as().fetch_all(conn).await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Inserts a liability. Returns `false` when the student already holds a
/// live liability for the same template (the partial unique index fires and
/// the row is skipped).
pub(crate) async fn insert_if_absent(conn: &mut SqliteConnection, liability: &Liability) -> DbResult<bool> {
    debug!(
        id = %liability.id,
        student_id = %liability.student_id,
        amount = liability.amount,
        "Inserting liability"
    );

    let result = sqlx::query(
        r#"
        INSERT INTO liabilities (
            id, student_id, template_id, title, description,
            original_amount, discount_amount, amount, paid_amount, status,
            due_date, items, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&liability.id)
    .bind(&liability.student_id)
    .bind(&liability.template_id)
    .bind(&liability.title)
    .bind(&liability.description)
    .bind(liability.original_amount)
    .bind(liability.discount_amount)
    .bind(liability.amount)
    .bind(liability.paid_amount)
    .bind(liability.status)
    .bind(liability.due_date)
    .bind(serde_json::to_string(&liability.items)?)
    .bind(liability.created_at)
    .bind(liability.updated_at)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Moves `paid_amount` from `old_paid` to `new_paid`. Returns `false` when
/// the row no longer holds `old_paid`.
pub(crate) async fn update_paid(
    conn: &mut SqliteConnection,
    id: &str,
    old_paid: i64,
    new_paid: i64,
    status: LiabilityStatus,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE liabilities SET paid_amount = ?3, status = ?4, updated_at = ?5
        WHERE id = ?1 AND paid_amount = ?2 AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .bind(old_paid)
    .bind(new_paid)
    .bind(status)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Replaces the item snapshot. Returns `false` when the liability is gone.
pub(crate) async fn update_items(
    conn: &mut SqliteConnection,
    id: &str,
    items: &[FulfillmentItem],
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE liabilities SET items = ?2, updated_at = ?3 WHERE id = ?1 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(serde_json::to_string(items)?)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft-deletes an unpaid liability. Returns `false` when it is gone or has
/// collected money since it was read.
pub(crate) async fn soft_delete(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE liabilities SET deleted_at = ?2, updated_at = ?2
        WHERE id = ?1 AND paid_amount = 0 AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Overwrites paid amount and status. Only used by reconciliation.
pub(crate) async fn overwrite_paid(
    conn: &mut SqliteConnection,
    id: &str,
    paid: i64,
    status: LiabilityStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE liabilities SET paid_amount = ?2, status = ?3, updated_at = ?4 WHERE id = ?1")
        .bind(id)
        .bind(paid)
        .bind(status)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(())
}

/// `(id, amount, paid_amount, status, sum of payments)` for every live
/// liability.
pub(crate) async fn paid_snapshot(
    conn: &mut SqliteConnection,
) -> DbResult<Vec<(String, i64, i64, LiabilityStatus, i64)>> {
    let rows = sqlx::query_as(
        r#"
        SELECT l.id, l.amount, l.paid_amount, l.status,
               COALESCE((SELECT SUM(p.amount) FROM payments p WHERE p.liability_id = l.id), 0)
        FROM liabilities l
        WHERE l.deleted_at IS NULL
        ORDER BY l.id
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// `(Σ amount, Σ payments)` over a student's live liabilities, straight
/// from the rows.
pub(crate) async fn student_totals(conn: &mut SqliteConnection, student_id: &str) -> DbResult<(i64, i64)> {
    let totals: (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(l.amount), 0),
            COALESCE(SUM((SELECT COALESCE(SUM(p.amount), 0) FROM payments p WHERE p.liability_id = l.id)), 0)
        FROM liabilities l
        WHERE l.student_id = ?1 AND l.deleted_at IS NULL
        "#,
    )
    .bind(student_id)
    .fetch_one(conn)
    .await?;
    Ok(totals)
}
