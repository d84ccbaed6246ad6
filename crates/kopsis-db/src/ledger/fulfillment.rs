//! Fulfillment tracker: item delivery state inside liabilities. Never touches
//! money.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::{record_audit, AuditEvent};
use crate::error::{LedgerError, LedgerResult};
use crate::locks::liability_key;
use crate::pool::Database;
use crate::repository::liability;
use kopsis_core::fulfillment::{mark_delivered, normalize_items};
use kopsis_core::validation::validate_uuid;
use kopsis_core::{
    Actor, AuditSeverity, BulkFulfillmentRequest, ItemUpdate, Liability, ValidationError,
    MAX_BULK_LIABILITIES,
};

#[derive(Debug, Clone)]
pub struct FulfillmentTracker {
    db: Database,
}

impl FulfillmentTracker {
    pub fn new(db: Database) -> Self {
        FulfillmentTracker { db }
    }

    /// Replaces the liability's items wholesale. Delivery stamps are set by
    /// the server; see [`normalize_items`].
    pub async fn update_items(
        &self,
        liability_id: &str,
        items: Vec<ItemUpdate>,
        actor: &Actor,
    ) -> LedgerResult<Liability> {
        validate_uuid("liabilityId", liability_id)?;
        if items.iter().any(|i| i.name.trim().is_empty()) {
            return Err(ValidationError::required("items.name").into());
        }

        let _guard = self.db.locks().lock(&liability_key(liability_id)).await;
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let mut target = liability::fetch(&mut *tx, liability_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Liability", liability_id))?;

        target.items = normalize_items(&target.items, items, actor, now);
        if !liability::update_items(&mut *tx, liability_id, &target.items, now).await? {
            return Err(LedgerError::concurrent("Liability", liability_id));
        }
        tx.commit().await?;
        target.updated_at = now;

        let delivered = target.items.iter().filter(|i| i.is_delivered()).count();
        info!(liability_id, items = target.items.len(), delivered, "Fulfillment updated");

        record_audit(
            &self.db,
            actor,
            AuditEvent {
                action: "update_fulfillment",
                entity_type: "liability",
                entity_id: liability_id,
                severity: AuditSeverity::Info,
                description: format!(
                    "Updated items of {}: {}/{} delivered",
                    target.title,
                    delivered,
                    target.items.len()
                ),
                details: json!({ "items": target.items }),
            },
        )
        .await;

        Ok(target)
    }

    /// Marks the named items delivered across many liabilities. Returns how
    /// many liabilities actually changed.
    pub async fn bulk_update(&self, request: &BulkFulfillmentRequest, actor: &Actor) -> LedgerResult<usize> {
        let mut ids: Vec<String> = Vec::with_capacity(request.liability_ids.len());
        for id in &request.liability_ids {
            validate_uuid("liabilityIds", id)?;
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        if ids.is_empty() {
            return Err(ValidationError::Empty {
                field: "liabilityIds".to_string(),
            }
            .into());
        }
        if ids.len() > MAX_BULK_LIABILITIES {
            return Err(ValidationError::OutOfRange {
                field: "liabilityIds".to_string(),
                min: 1,
                max: MAX_BULK_LIABILITIES as i64,
            }
            .into());
        }

        let names: HashSet<&str> = request
            .item_names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(ValidationError::Empty {
                field: "itemNames".to_string(),
            }
            .into());
        }

        let _guards = self.db.locks().lock_many(ids.iter().map(|id| liability_key(id))).await;
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let mut changed_ids = Vec::new();
        for mut target in liability::fetch_many(&mut *tx, &ids).await? {
            if !mark_delivered(&mut target.items, &names, actor, now) {
                continue;
            }
            if liability::update_items(&mut *tx, &target.id, &target.items, now).await? {
                changed_ids.push(target.id);
            }
        }
        tx.commit().await?;

        let updated = changed_ids.len();
        info!(requested = ids.len(), updated, "Bulk fulfillment applied");

        if updated > 0 {
            record_audit(
                &self.db,
                actor,
                AuditEvent {
                    action: "bulk_fulfillment",
                    entity_type: "liability",
                    entity_id: "bulk",
                    severity: AuditSeverity::Info,
                    description: format!("Marked items delivered on {} liabilities", updated),
                    details: json!({
                        "itemNames": request.item_names,
                        "liabilityIds": changed_ids,
                    }),
                },
            )
            .await;
        }

        Ok(updated)
    }
}
