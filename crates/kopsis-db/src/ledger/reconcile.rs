//! # Reconciliation
//!
//! Recomputes stored aggregates from the rows they summarise.
//!
//! ```text
//!   payments ──Σ per liability──► liabilities.paid_amount, status
//!   liabilities + payments ──Σ per student──► balance, total_liabilities, total_paid
//! ```
//!
//! Under normal operation both are no-ops; they exist for data imported from
//! elsewhere or edited by hand.

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use super::{record_audit, AuditEvent};
use crate::error::{LedgerError, LedgerResult};
use crate::pool::Database;
use crate::repository::{liability, student};
use kopsis_core::validation::validate_uuid;
use kopsis_core::{Actor, AuditSeverity, LedgerCheck, LiabilityStatus, Money, ReconcileReport};

#[derive(Debug, Clone)]
pub struct Reconciler {
    db: Database,
}

impl Reconciler {
    pub fn new(db: Database) -> Self {
        Reconciler { db }
    }

    /// Sets every live liability's `paid_amount` and status to what its
    /// payments add up to.
    pub async fn reconcile_paid_amounts(&self, actor: &Actor) -> LedgerResult<ReconcileReport> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let snapshot = liability::paid_snapshot(&mut *tx).await?;
        let mut report = ReconcileReport {
            checked: snapshot.len() as i64,
            ..ReconcileReport::default()
        };

        for (id, amount, stored_paid, stored_status, payments_sum) in snapshot {
            let status = LiabilityStatus::from_amounts(
                Money::from_rupiah(payments_sum),
                Money::from_rupiah(amount),
            );
            if stored_paid == payments_sum && stored_status == status {
                continue;
            }

            warn!(
                liability_id = %id,
                stored_paid,
                payments_sum,
                "Paid amount out of sync"
            );
            liability::overwrite_paid(&mut *tx, &id, payments_sum, status, now).await?;
            report.fixed_liability_ids.push(id);
        }
        report.fixed = report.fixed_liability_ids.len() as i64;

        tx.commit().await?;
        info!(checked = report.checked, fixed = report.fixed, "Paid amounts reconciled");

        if report.fixed > 0 {
            record_audit(
                &self.db,
                actor,
                AuditEvent {
                    action: "reconcile",
                    entity_type: "liability",
                    entity_id: "all",
                    severity: AuditSeverity::Warning,
                    description: format!("Reconciled paid amount of {} liabilities", report.fixed),
                    details: json!({ "liabilityIds": report.fixed_liability_ids }),
                },
            )
            .await;
        }

        Ok(report)
    }

    /// Stored versus recomputed ledger fields of one student. Read-only.
    pub async fn verify_student_ledger(&self, student_id: &str) -> LedgerResult<LedgerCheck> {
        validate_uuid("studentId", student_id)?;
        let mut conn = self.db.pool().acquire().await?;
        check_student(&mut conn, student_id).await
    }

    /// Rewrites a student's ledger fields from the rows. Returns the check
    /// as it was before the repair.
    pub async fn repair_student_ledger(&self, student_id: &str, actor: &Actor) -> LedgerResult<LedgerCheck> {
        validate_uuid("studentId", student_id)?;

        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;
        let check = check_student(&mut *tx, student_id).await?;
        if check.is_consistent() {
            return Ok(check);
        }

        student::overwrite_ledger(
            &mut *tx,
            student_id,
            check.computed_balance,
            check.computed_total_liabilities,
            check.computed_total_paid,
            now,
        )
        .await?;
        tx.commit().await?;

        warn!(
            student_id,
            stored_balance = check.stored_balance,
            computed_balance = check.computed_balance,
            "Student ledger repaired"
        );

        record_audit(
            &self.db,
            actor,
            AuditEvent {
                action: "repair_ledger",
                entity_type: "student",
                entity_id: student_id,
                severity: AuditSeverity::Warning,
                description: "Rewrote student ledger fields from liabilities and payments".to_string(),
                details: json!(check),
            },
        )
        .await;

        Ok(check)
    }
}

async fn check_student(conn: &mut sqlx::SqliteConnection, student_id: &str) -> LedgerResult<LedgerCheck> {
    let stored = student::fetch(&mut *conn, student_id)
        .await?
        .ok_or_else(|| LedgerError::not_found("Student", student_id))?;
    let (total_liabilities, total_paid) = liability::student_totals(conn, student_id).await?;

    Ok(LedgerCheck {
        student_id: stored.id,
        stored_balance: stored.balance,
        stored_total_liabilities: stored.total_liabilities,
        stored_total_paid: stored.total_paid,
        computed_balance: total_liabilities - total_paid,
        computed_total_liabilities: total_liabilities,
        computed_total_paid: total_paid,
    })
}
