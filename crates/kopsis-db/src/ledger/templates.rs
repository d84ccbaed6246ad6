//! Template catalog: validated create/update/delete of billing templates.

use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::{record_audit, AuditEvent};
use crate::error::{LedgerError, LedgerResult};
use crate::locks::template_key;
use crate::pool::Database;
use crate::repository::template;
use kopsis_core::validation::{validate_template_draft, validate_uuid};
use kopsis_core::{
    Actor, AuditSeverity, BillingTemplate, TemplateDraft, TemplateFilter, TemplateSummary,
    BILLING_CATEGORIES,
};

#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    db: Database,
}

impl TemplateCatalog {
    pub fn new(db: Database) -> Self {
        TemplateCatalog { db }
    }

    /// Fixed category list offered by the template form.
    pub fn categories(&self) -> Vec<&'static str> {
        BILLING_CATEGORIES.to_vec()
    }

    pub async fn list(&self, filter: &TemplateFilter) -> LedgerResult<Vec<TemplateSummary>> {
        Ok(self.db.templates().list(filter).await?)
    }

    pub async fn get(&self, id: &str) -> LedgerResult<BillingTemplate> {
        self.db
            .templates()
            .get_by_id(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Billing template", id))
    }

    pub async fn create(&self, draft: &TemplateDraft, actor: &Actor) -> LedgerResult<BillingTemplate> {
        validate_template_draft(draft)?;

        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;
        let id = template::insert(&mut *tx, draft, now).await?;
        let created = template::fetch(&mut *tx, &id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Billing template", id.clone()))?;
        tx.commit().await?;

        info!(id = %created.id, name = %created.name, variants = created.variants.len(), "Template created");

        record_audit(
            &self.db,
            actor,
            AuditEvent {
                action: "create",
                entity_type: "billing_template",
                entity_id: &created.id,
                severity: AuditSeverity::Info,
                description: format!("Created billing template {}", created.name),
                details: json!({ "variants": created.variants.len(), "items": created.items.len() }),
            },
        )
        .await;

        Ok(created)
    }

    /// Replaces the template's fields and variants. Liabilities already
    /// generated keep their own snapshot.
    pub async fn update(
        &self,
        id: &str,
        draft: &TemplateDraft,
        actor: &Actor,
    ) -> LedgerResult<BillingTemplate> {
        validate_uuid("templateId", id)?;
        validate_template_draft(draft)?;

        let _guard = self.db.locks().lock(&template_key(id)).await;
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;
        if !template::update(&mut *tx, id, draft, now).await? {
            return Err(LedgerError::not_found("Billing template", id));
        }
        let updated = template::fetch(&mut *tx, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Billing template", id))?;
        tx.commit().await?;

        info!(id, name = %updated.name, "Template updated");

        record_audit(
            &self.db,
            actor,
            AuditEvent {
                action: "update",
                entity_type: "billing_template",
                entity_id: id,
                severity: AuditSeverity::Info,
                description: format!("Updated billing template {}", updated.name),
                details: json!({ "variants": updated.variants.len(), "isActive": updated.is_active }),
            },
        )
        .await;

        Ok(updated)
    }

    /// Deletes a template nothing references. Otherwise a conflict carrying
    /// the number of referencing liabilities; deactivate it instead.
    pub async fn delete(&self, id: &str, actor: &Actor) -> LedgerResult<()> {
        validate_uuid("templateId", id)?;

        let _guard = self.db.locks().lock(&template_key(id)).await;
        let mut tx = self.db.begin_write().await?;

        let existing = template::fetch(&mut *tx, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Billing template", id))?;

        let references = template::count_referencing_liabilities(&mut *tx, id).await?;
        if references > 0 {
            return Err(LedgerError::conflict(
                format!(
                    "Template {} is used by {} liabilities; deactivate it instead",
                    existing.name, references
                ),
                Some(references),
            ));
        }

        template::delete(&mut *tx, id).await?;
        tx.commit().await?;

        info!(id, name = %existing.name, "Template deleted");

        record_audit(
            &self.db,
            actor,
            AuditEvent {
                action: "delete",
                entity_type: "billing_template",
                entity_id: id,
                severity: AuditSeverity::Warning,
                description: format!("Deleted billing template {}", existing.name),
                details: json!({ "name": existing.name }),
            },
        )
        .await;

        Ok(())
    }
}
