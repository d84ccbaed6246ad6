//! # Student Repository
//!
//! The student directory plus the three ledger fields.
//!
//! ## Ledger Fields
//! ```text
//! balance            += billed − paid        (outstanding)
//! total_liabilities  += billed               (gross billed)
//! total_paid         += paid                 (gross collected)
//! ```
//!
//! The fields only move through [`apply_delta`], called from the ledger
//! services inside their transaction. Nothing in this module exposes a way
//! to set them from the pool.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use kopsis_core::{LedgerDelta, NewStudent, Student, StudentStatus};

const STUDENT_COLUMNS: &str = "id, registration_number, full_name, class_name, program, gender, \
     scholarship_percent, status, balance, total_liabilities, total_paid, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: String,
    registration_number: String,
    full_name: String,
    class_name: String,
    program: Option<String>,
    gender: Option<String>,
    scholarship_percent: i64,
    status: StudentStatus,
    balance: i64,
    total_liabilities: i64,
    total_paid: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StudentRow> for Student {
    type Error = DbError;

    fn try_from(row: StudentRow) -> DbResult<Self> {
        let scholarship_percent = u8::try_from(row.scholarship_percent).map_err(|_| {
            DbError::InvalidData(format!(
                "student {} has scholarship_percent {}",
                row.id, row.scholarship_percent
            ))
        })?;

        Ok(Student {
            id: row.id,
            registration_number: row.registration_number,
            full_name: row.full_name,
            class_name: row.class_name,
            program: row.program,
            gender: row.gender,
            scholarship_percent,
            status: row.status,
            balance: row.balance,
            total_liabilities: row.total_liabilities,
            total_paid: row.total_paid,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for the student directory.
#[derive(Debug, Clone)]
pub struct StudentRepository {
    pool: SqlitePool,
}

impl StudentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StudentRepository { pool }
    }

    /// Registers a student with zeroed ledger fields. Input is expected to
    /// have passed `validate_new_student`.
    pub async fn insert(&self, input: &NewStudent) -> DbResult<Student> {
        let now = Utc::now();
        let student = Student {
            id: new_id(),
            registration_number: input.registration_number.trim().to_string(),
            full_name: input.full_name.trim().to_string(),
            class_name: input.class_name.trim().to_string(),
            program: input.program.clone(),
            gender: input.gender.clone(),
            scholarship_percent: input.scholarship_percent,
            status: StudentStatus::Active,
            balance: 0,
            total_liabilities: 0,
            total_paid: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %student.id, class = %student.class_name, "Inserting student");

        sqlx::query(
            r#"
            INSERT INTO students (
                id, registration_number, full_name, class_name, program, gender,
                scholarship_percent, status, balance, total_liabilities, total_paid,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 0, 0, ?9, ?9)
            "#,
        )
        .bind(&student.id)
        .bind(&student.registration_number)
        .bind(&student.full_name)
        .bind(&student.class_name)
        .bind(&student.program)
        .bind(&student.gender)
        .bind(student.scholarship_percent as i64)
        .bind(student.status)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, student.registration_number.clone())
            }
            other => other,
        })?;

        Ok(student)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Student>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Active students whose class is one of `class_names`, ordered by
    /// class then name.
    pub async fn list_active_in_classes(&self, class_names: &[String]) -> DbResult<Vec<Student>> {
        let mut conn = self.pool.acquire().await?;
        fetch_active(&mut conn, class_names, None).await
    }

    pub async fn set_status(&self, id: &str, status: StudentStatus) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE students SET status = ?2, updated_at = ?3 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Student", id));
        }
        Ok(())
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Student>> {
    let sql = format!(
        "SELECT {} FROM students WHERE id = ?1 AND deleted_at IS NULL",
        STUDENT_COLUMNS
    );
    let row: Option<StudentRow> = sqlx::query_as(&sql).bind(id).fetch_optional(conn).await?;
    row.map(Student::try_from).transpose()
}

/// Active students in the given classes, optionally narrowed to a program.
pub(crate) async fn fetch_active(
    conn: &mut SqliteConnection,
    class_names: &[String],
    program: Option<&str>,
) -> DbResult<Vec<Student>> {
    if class_names.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM students WHERE deleted_at IS NULL AND status = 'active' AND class_name IN (",
        STUDENT_COLUMNS
    ));
    let mut separated = qb.separated(", ");
    for class_name in class_names {
        separated.push_bind(class_name);
    }
    separated.push_unseparated(")");

    if let Some(program) = program {
        qb.push(" AND program = ").push_bind(program);
    }
    qb.push(" ORDER BY class_name ASC, full_name ASC");

    let rows: Vec<StudentRow> = qb.build_query_as().fetch_all(conn).await?;
    rows.into_iter().map(Student::try_from).collect()
}

/// Adds `delta` to the student's ledger fields.
pub(crate) async fn apply_delta(
    conn: &mut SqliteConnection,
    student_id: &str,
    delta: &LedgerDelta,
    now: DateTime<Utc>,
) -> DbResult<()> {
    debug!(
        student_id,
        balance = delta.balance.rupiah(),
        total_liabilities = delta.total_liabilities.rupiah(),
        total_paid = delta.total_paid.rupiah(),
        "Applying ledger delta"
    );

    let result = sqlx::query(
        r#"
        UPDATE students SET
            balance = balance + ?2,
            total_liabilities = total_liabilities + ?3,
            total_paid = total_paid + ?4,
            updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(student_id)
    .bind(delta.balance.rupiah())
    .bind(delta.total_liabilities.rupiah())
    .bind(delta.total_paid.rupiah())
    .bind(now)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Student", student_id));
    }
    Ok(())
}

/// Overwrites the ledger fields. Only used by reconciliation repairs.
pub(crate) async fn overwrite_ledger(
    conn: &mut SqliteConnection,
    student_id: &str,
    balance: i64,
    total_liabilities: i64,
    total_paid: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE students SET
            balance = ?2, total_liabilities = ?3, total_paid = ?4, updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(student_id)
    .bind(balance)
    .bind(total_liabilities)
    .bind(total_paid)
    .bind(now)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Student", student_id));
    }
    Ok(())
}
