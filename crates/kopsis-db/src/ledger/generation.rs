//! # Liability Generation
//!
//! Turns a template plus a class selection into liabilities.
//!
//! ## Generate
//! ```text
//! lock template:<id>
//! BEGIN (write)
//!   template ── inactive? ──► Conflict
//!   students  = active ∩ classes − excluded
//!   billed    = students already holding a live liability for the template
//!   for student in students − billed:
//!       price_student ── no variant ──► skip silently
//!       create_liability ── unique conflict ──► skipped += 1
//!   created == 0 ──► NothingToGenerate { skipped }   (rolls back)
//! COMMIT
//! ```
//!
//! Preview runs the same pricing without a transaction or lock.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use super::{create_liability, record_audit, rp, AuditEvent};
use crate::error::{LedgerError, LedgerResult};
use crate::locks::template_key;
use crate::pool::Database;
use crate::repository::{new_id, student, template};
use kopsis_core::billing::{build_preview, price_student, seed_items, Preview};
use kopsis_core::validation::{validate_adhoc, validate_class_filter, validate_uuid};
use kopsis_core::{
    Actor, AdhocLiability, AuditSeverity, GenerateRequest, GenerationOutcome, Liability,
    LiabilityStatus, Money, ValidationError,
};

#[derive(Debug, Clone)]
pub struct LiabilityGenerator {
    db: Database,
}

impl LiabilityGenerator {
    pub fn new(db: Database) -> Self {
        LiabilityGenerator { db }
    }

    /// Prices the template for every active student in `class_names`.
    /// Read-only; works on inactive templates too.
    pub async fn preview(&self, template_id: &str, class_names: &[String]) -> LedgerResult<Preview> {
        validate_uuid("templateId", template_id)?;
        let classes = validate_class_filter(class_names)?;

        let template = self
            .db
            .templates()
            .get_by_id(template_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Billing template", template_id))?;

        let students = self.db.students().list_active_in_classes(&classes).await?;
        let preview = build_preview(&template, &students)?;

        debug!(
            template_id,
            students = preview.summary.total_students,
            total_final = preview.summary.total_final,
            "Preview built"
        );
        Ok(preview)
    }

    /// Bills every matched, not yet billed student in the selected classes.
    ///
    /// Idempotent: a second run over the same classes creates nothing and
    /// fails with [`LedgerError::NothingToGenerate`].
    pub async fn generate(
        &self,
        template_id: &str,
        request: &GenerateRequest,
        actor: &Actor,
    ) -> LedgerResult<GenerationOutcome> {
        validate_uuid("templateId", template_id)?;
        let classes = validate_class_filter(&request.class_names)?;
        let excluded: HashSet<&str> = request.exclude_student_ids.iter().map(String::as_str).collect();

        let _guard = self.db.locks().lock(&template_key(template_id)).await;
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let template = template::fetch(&mut *tx, template_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Billing template", template_id))?;
        if !template.is_active {
            return Err(LedgerError::conflict(
                format!("Template {} is inactive", template.name),
                None,
            ));
        }

        let students: Vec<_> = student::fetch_active(&mut *tx, &classes, None)
            .await?
            .into_iter()
            .filter(|s| !excluded.contains(s.id.as_str()))
            .collect();
        let student_ids: Vec<String> = students.iter().map(|s| s.id.clone()).collect();
        let billed = crate::repository::liability::billed_students(&mut *tx, template_id, &student_ids).await?;

        let mut created: i64 = 0;
        let mut skipped = billed.len() as i64;
        let mut total_billed = Money::zero();

        for student in students.iter().filter(|s| !billed.contains(&s.id)) {
            let Some(pricing) = price_student(&template, student) else {
                continue;
            };

            let liability = Liability {
                id: new_id(),
                student_id: student.id.clone(),
                template_id: Some(template.id.clone()),
                title: template.name.clone(),
                description: template.description.clone(),
                original_amount: pricing.original_amount.rupiah(),
                discount_amount: pricing.discount_amount.rupiah(),
                amount: pricing.final_amount.rupiah(),
                paid_amount: 0,
                status: LiabilityStatus::from_amounts(Money::zero(), pricing.final_amount),
                due_date: template.due_date,
                items: seed_items(&template.items),
                created_at: now,
                updated_at: now,
            };

            if create_liability(&mut *tx, &liability, now).await? {
                created += 1;
                total_billed = total_billed
                    .checked_add(pricing.final_amount)
                    .ok_or_else(|| ValidationError::total_overflow("totalAmount"))?;
            } else {
                skipped += 1;
            }
        }

        if created == 0 {
            info!(template_id, skipped, "Nothing to generate");
            return Err(LedgerError::NothingToGenerate { skipped });
        }

        tx.commit().await?;

        info!(
            template_id,
            created,
            skipped,
            total = total_billed.rupiah(),
            "Liabilities generated"
        );

        record_audit(
            &self.db,
            actor,
            AuditEvent {
                action: "generate",
                entity_type: "billing_template",
                entity_id: template_id,
                severity: AuditSeverity::Info,
                description: format!(
                    "Generated {} liabilities from {} ({} total)",
                    created,
                    template.name,
                    rp(total_billed.rupiah())
                ),
                details: json!({
                    "classNames": classes,
                    "created": created,
                    "skipped": skipped,
                    "totalAmount": total_billed.rupiah(),
                }),
            },
        )
        .await;

        Ok(GenerationOutcome { created, skipped })
    }

    /// Issues a template-less liability of one flat amount to every active
    /// student matching the filter.
    pub async fn create_adhoc(&self, input: &AdhocLiability, actor: &Actor) -> LedgerResult<GenerationOutcome> {
        let classes = validate_adhoc(input)?;
        let program = input
            .filter
            .program
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let now = Utc::now();
        let amount = Money::from_rupiah(input.amount);
        let mut tx = self.db.begin_write().await?;

        let students = student::fetch_active(&mut *tx, &classes, program).await?;
        if students.is_empty() {
            return Err(LedgerError::not_found("Students matching filter", classes.join(", ")));
        }

        for student in &students {
            let liability = Liability {
                id: new_id(),
                student_id: student.id.clone(),
                template_id: None,
                title: input.title.trim().to_string(),
                description: input.description.clone(),
                original_amount: amount.rupiah(),
                discount_amount: 0,
                amount: amount.rupiah(),
                paid_amount: 0,
                status: LiabilityStatus::Unpaid,
                due_date: input.due_date,
                items: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            create_liability(&mut *tx, &liability, now).await?;
        }

        tx.commit().await?;

        let created = students.len() as i64;
        info!(title = %input.title, created, amount = amount.rupiah(), "Ad-hoc liabilities created");

        record_audit(
            &self.db,
            actor,
            AuditEvent {
                action: "create_batch",
                entity_type: "liability",
                entity_id: "batch",
                severity: AuditSeverity::Info,
                description: format!("Created {} ad-hoc liabilities: {} ({} each)", created, input.title, amount),
                details: json!({
                    "classNames": classes,
                    "program": program,
                    "amount": amount.rupiah(),
                    "count": created,
                }),
            },
        )
        .await;

        Ok(GenerationOutcome { created, skipped: 0 })
    }
}
