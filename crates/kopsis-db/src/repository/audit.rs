//! # Audit Repository
//!
//! Append-only audit trail of ledger mutations.
//!
//! Entries are written after the financial transaction commits and on the
//! pool, never inside the transaction: a failing audit insert is logged by
//! the caller and does not undo the mutation it describes.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use kopsis_core::{AuditEntry, AuditSeverity};

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: String,
    actor_id: String,
    actor_name: String,
    action: String,
    module: String,
    entity_type: String,
    entity_id: String,
    description: String,
    details: String,
    severity: AuditSeverity,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditEntry {
    fn from(row: AuditRow) -> Self {
        AuditEntry {
            id: row.id,
            actor_id: row.actor_id,
            actor_name: row.actor_name,
            action: row.action,
            module: row.module,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            description: row.description,
            // Details are written by us as JSON; anything unreadable shows as raw text.
            details: serde_json::from_str(&row.details)
                .unwrap_or(serde_json::Value::String(row.details)),
            severity: row.severity,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    pub async fn insert(&self, entry: &AuditEntry) -> DbResult<()> {
        debug!(action = %entry.action, entity_id = %entry.entity_id, "Writing audit entry");

        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, actor_id, actor_name, action, module, entity_type, entity_id,
                description, details, severity, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.actor_id)
        .bind(&entry.actor_name)
        .bind(&entry.action)
        .bind(&entry.module)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.description)
        .bind(entry.details.to_string())
        .bind(entry.severity)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Entries about one entity, oldest first.
    pub async fn list_for_entity(&self, entity_type: &str, entity_id: &str) -> DbResult<Vec<AuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, actor_id, actor_name, action, module, entity_type, entity_id,
                   description, details, severity, created_at
            FROM audit_log
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AuditEntry::from).collect())
    }
}
