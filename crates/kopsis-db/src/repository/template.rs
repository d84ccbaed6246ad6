//! # Template Repository
//!
//! Billing templates with their ordered variants and line items.
//!
//! ## Storage
//! ```text
//! billing_templates  1 ──── * billing_variants (position 0, 1, 2 ... = precedence)
//!        │
//!        └── items: JSON array of {name, price}
//! ```
//!
//! Variants are loaded in `position` order and compiled into predicates once
//! per load (see `kopsis_core::Variant::new`).

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use kopsis_core::{
    BillingTemplate, LineItem, TemplateDraft, TemplateFilter, TemplateSummary, Variant,
};

const TEMPLATE_COLUMNS: &str = "id, name, description, category, academic_year, semester, \
     due_date, apply_scholarship, allow_installment, min_installment, max_installments, \
     is_recurring, recurring_type, is_active, items, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: String,
    name: String,
    description: Option<String>,
    category: String,
    academic_year: Option<String>,
    semester: Option<String>,
    due_date: Option<NaiveDate>,
    apply_scholarship: bool,
    allow_installment: bool,
    min_installment: Option<i64>,
    max_installments: Option<i64>,
    is_recurring: bool,
    recurring_type: Option<String>,
    is_active: bool,
    items: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: String,
    template_id: String,
    position: i64,
    class_names: String,
    programs: Option<String>,
    genders: Option<String>,
    amount: i64,
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Variant::new(
            row.id,
            row.template_id,
            row.position,
            row.class_names,
            row.programs,
            row.genders,
            row.amount,
        )
    }
}

fn into_template(row: TemplateRow, variants: Vec<Variant>) -> DbResult<BillingTemplate> {
    let items: Vec<LineItem> = serde_json::from_str(&row.items)?;
    let max_installments = row
        .max_installments
        .map(u32::try_from)
        .transpose()
        .map_err(|_| DbError::InvalidData(format!("template {} max_installments", row.id)))?;

    Ok(BillingTemplate {
        id: row.id,
        name: row.name,
        description: row.description,
        category: row.category,
        academic_year: row.academic_year,
        semester: row.semester,
        due_date: row.due_date,
        apply_scholarship: row.apply_scholarship,
        allow_installment: row.allow_installment,
        min_installment: row.min_installment,
        max_installments,
        is_recurring: row.is_recurring,
        recurring_type: row.recurring_type,
        is_active: row.is_active,
        variants,
        items,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Repository for billing templates.
#[derive(Debug, Clone)]
pub struct TemplateRepository {
    pool: SqlitePool,
}

impl TemplateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TemplateRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<BillingTemplate>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Templates matching `filter`, newest first, each with the number of
    /// live liabilities generated from it.
    pub async fn list(&self, filter: &TemplateFilter) -> DbResult<Vec<TemplateSummary>> {
        let mut conn = self.pool.acquire().await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM billing_templates WHERE 1 = 1",
            TEMPLATE_COLUMNS
        ));
        if let Some(category) = &filter.category {
            qb.push(" AND category = ").push_bind(category);
        }
        if let Some(year) = &filter.academic_year {
            qb.push(" AND academic_year = ").push_bind(year);
        }
        if let Some(semester) = &filter.semester {
            qb.push(" AND semester = ").push_bind(semester);
        }
        if let Some(active) = filter.is_active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows: Vec<TemplateRow> = qb.build_query_as().fetch_all(&mut *conn).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut variants = fetch_variants_for(&mut conn, &ids).await?;
        let counts = count_live_liabilities_for(&mut conn, &ids).await?;

        rows.into_iter()
            .map(|row| {
                let id = row.id.clone();
                let template = into_template(row, variants.remove(&id).unwrap_or_default())?;
                Ok(TemplateSummary {
                    template,
                    liability_count: counts.get(&id).copied().unwrap_or(0),
                })
            })
            .collect()
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<BillingTemplate>> {
    let sql = format!("SELECT {} FROM billing_templates WHERE id = ?1", TEMPLATE_COLUMNS);
    let row: Option<TemplateRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&mut *conn).await?;

    match row {
        Some(row) => {
            let variants = fetch_variants(conn, id).await?;
            into_template(row, variants).map(Some)
        }
        None => Ok(None),
    }
}

async fn fetch_variants(conn: &mut SqliteConnection, template_id: &str) -> DbResult<Vec<Variant>> {
    let rows: Vec<VariantRow> = sqlx::query_as(
        r#"
        SELECT id, template_id, position, class_names, programs, genders, amount
        FROM billing_variants
        WHERE template_id = ?1
        ORDER BY position ASC
        "#,
    )
    .bind(template_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Variant::from).collect())
}

async fn fetch_variants_for(
    conn: &mut SqliteConnection,
    template_ids: &[String],
) -> DbResult<HashMap<String, Vec<Variant>>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, template_id, position, class_names, programs, genders, amount \
         FROM billing_variants WHERE template_id IN (",
    );
    let mut separated = qb.separated(", ");
    for id in template_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(") ORDER BY template_id, position ASC");

    let rows: Vec<VariantRow> = qb.build_query_as().fetch_all(conn).await?;

    let mut grouped: HashMap<String, Vec<Variant>> = HashMap::new();
    for row in rows {
        grouped
            .entry(row.template_id.clone())
            .or_default()
            .push(Variant::from(row));
    }
    Ok(grouped)
}

async fn count_live_liabilities_for(
    conn: &mut SqliteConnection,
    template_ids: &[String],
) -> DbResult<HashMap<String, i64>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT template_id, COUNT(*) FROM liabilities \
         WHERE deleted_at IS NULL AND template_id IN (",
    );
    let mut separated = qb.separated(", ");
    for id in template_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(") GROUP BY template_id");

    let rows: Vec<(String, i64)> = qb.build_query_as().fetch_all(conn).await?;
    Ok(rows.into_iter().collect())
}

/// Number of liabilities (live or soft-deleted) that reference the template.
/// Soft-deleted rows still hold the foreign key.
pub(crate) async fn count_referencing_liabilities(
    conn: &mut SqliteConnection,
    template_id: &str,
) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM liabilities WHERE template_id = ?1")
        .bind(template_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Item snapshot column. Names are stored trimmed so fulfillment can match
/// them against the names an operator types.
fn items_json(items: &[LineItem]) -> DbResult<String> {
    let trimmed: Vec<LineItem> = items
        .iter()
        .map(|item| LineItem {
            name: item.name.trim().to_string(),
            price: item.price,
        })
        .collect();
    Ok(serde_json::to_string(&trimmed)?)
}

/// Inserts a template and its variants.
pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    draft: &TemplateDraft,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let id = new_id();
    debug!(id = %id, name = %draft.name, variants = draft.variants.len(), "Inserting template");

    sqlx::query(
        r#"
        INSERT INTO billing_templates (
            id, name, description, category, academic_year, semester, due_date,
            apply_scholarship, allow_installment, min_installment, max_installments,
            is_recurring, recurring_type, is_active, items, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)
        "#,
    )
    .bind(&id)
    .bind(draft.name.trim())
    .bind(&draft.description)
    .bind(draft.category.trim())
    .bind(&draft.academic_year)
    .bind(&draft.semester)
    .bind(draft.due_date)
    .bind(draft.apply_scholarship)
    .bind(draft.allow_installment)
    .bind(draft.min_installment)
    .bind(draft.max_installments.map(i64::from))
    .bind(draft.is_recurring)
    .bind(&draft.recurring_type)
    .bind(draft.is_active)
    .bind(items_json(&draft.items)?)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    insert_variants(conn, &id, draft).await?;
    Ok(id)
}

/// Rewrites the template fields and replaces its variants wholesale.
/// Returns `false` when the template does not exist.
pub(crate) async fn update(
    conn: &mut SqliteConnection,
    id: &str,
    draft: &TemplateDraft,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(id, name = %draft.name, "Updating template");

    let result = sqlx::query(
        r#"
        UPDATE billing_templates SET
            name = ?2, description = ?3, category = ?4, academic_year = ?5,
            semester = ?6, due_date = ?7, apply_scholarship = ?8,
            allow_installment = ?9, min_installment = ?10, max_installments = ?11,
            is_recurring = ?12, recurring_type = ?13, is_active = ?14, items = ?15,
            updated_at = ?16
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(draft.name.trim())
    .bind(&draft.description)
    .bind(draft.category.trim())
    .bind(&draft.academic_year)
    .bind(&draft.semester)
    .bind(draft.due_date)
    .bind(draft.apply_scholarship)
    .bind(draft.allow_installment)
    .bind(draft.min_installment)
    .bind(draft.max_installments.map(i64::from))
    .bind(draft.is_recurring)
    .bind(&draft.recurring_type)
    .bind(draft.is_active)
    .bind(items_json(&draft.items)?)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query("DELETE FROM billing_variants WHERE template_id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    insert_variants(conn, id, draft).await?;

    Ok(true)
}

async fn insert_variants(
    conn: &mut SqliteConnection,
    template_id: &str,
    draft: &TemplateDraft,
) -> DbResult<()> {
    for (position, variant) in draft.variants.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO billing_variants (
                id, template_id, position, class_names, programs, genders, amount
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(new_id())
        .bind(template_id)
        .bind(position as i64)
        .bind(variant.class_names.trim())
        .bind(non_blank(variant.programs.as_deref()))
        .bind(non_blank(variant.genders.as_deref()))
        .bind(variant.amount)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Deletes the template; variants go with it. Returns `false` when missing.
pub(crate) async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM billing_templates WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
