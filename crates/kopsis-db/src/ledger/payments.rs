//! # Payment Ledger
//!
//! Pay, cancel and delete: the three operations that move a liability's
//! `paid_amount` or take it off a student's books.
//!
//! ## Pay Flow
//! ```text
//! lock liability:<id>
//! BEGIN (write)
//!   liability ──── missing ──► NotFound
//!   policy    = template installment policy (ad-hoc: none)
//!   plan      = plan_payment(liability, amount, policy, payments so far)
//!                   └─ AlreadyPaid / Overpayment / installment rules ──► rollback
//!   apply_payment(payment row + liability + student)
//! COMMIT
//! audit (critical)
//! ```
//!
//! Cancel is the exact inverse and is serialised on the same key.

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use super::{apply_payment, record_audit, remove_liability, reverse_payment, rp, AuditEvent};
use crate::error::{LedgerError, LedgerResult};
use crate::locks::liability_key;
use crate::pool::Database;
use crate::repository::payment::generate_receipt_number;
use crate::repository::{liability, new_id, payment, template};
use kopsis_core::payment::{plan_deletion, plan_payment, plan_reversal};
use kopsis_core::validation::{validate_payment_amount, validate_uuid};
use kopsis_core::{
    Actor, AuditSeverity, CancelOutcome, Money, Payment, PaymentFilter, PaymentReceipt,
    PaymentRequest, ValidationError,
};

const MAX_NOTES_LENGTH: usize = 500;

#[derive(Debug, Clone)]
pub struct PaymentLedger {
    db: Database,
}

impl PaymentLedger {
    pub fn new(db: Database) -> Self {
        PaymentLedger { db }
    }

    /// Payments matching `filter`, newest first.
    pub async fn list(&self, filter: &PaymentFilter) -> LedgerResult<Vec<Payment>> {
        Ok(self.db.payments().list(filter).await?)
    }

    /// Records a payment against a liability.
    ///
    /// Rejected before any write when the liability is settled, the amount
    /// exceeds the remainder, or the template's installment policy forbids it.
    pub async fn pay(&self, request: &PaymentRequest, actor: &Actor) -> LedgerResult<PaymentReceipt> {
        validate_uuid("liabilityId", &request.liability_id)?;
        validate_payment_amount(request.amount)?;
        if request.notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH) {
            return Err(ValidationError::TooLong {
                field: "notes".to_string(),
                max: MAX_NOTES_LENGTH,
            }
            .into());
        }

        let amount = Money::from_rupiah(request.amount);
        let _guard = self.db.locks().lock(&liability_key(&request.liability_id)).await;
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let target = liability::fetch(&mut *tx, &request.liability_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Liability", request.liability_id.clone()))?;

        let policy = match &target.template_id {
            Some(template_id) => template::fetch(&mut *tx, template_id)
                .await?
                .map(|t| t.installment_policy()),
            None => None,
        };
        let payments_made = payment::count_for_liability(&mut *tx, &target.id).await?;

        let plan = match plan_payment(&target, amount, policy.as_ref(), payments_made) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(liability_id = %target.id, amount = amount.rupiah(), error = %e, "Payment rejected");
                return Err(e.into());
            }
        };

        let record = Payment {
            id: new_id(),
            receipt_number: generate_receipt_number(now),
            liability_id: target.id.clone(),
            student_id: target.student_id.clone(),
            amount: amount.rupiah(),
            payment_method: request.payment_method,
            cashier_id: request.cashier_id.clone().unwrap_or_else(|| actor.id.clone()),
            notes: request.notes.clone(),
            payment_date: now,
        };

        apply_payment(&mut *tx, &target, &record, &plan, now).await?;
        tx.commit().await?;

        info!(
            liability_id = %target.id,
            student_id = %target.student_id,
            amount = amount.rupiah(),
            status = ?plan.status,
            receipt_number = %record.receipt_number,
            "Payment recorded"
        );

        record_audit(
            &self.db,
            actor,
            AuditEvent {
                action: "pay",
                entity_type: "liability",
                entity_id: &target.id,
                severity: AuditSeverity::Critical,
                description: format!(
                    "Payment {} for {} ({})",
                    rp(amount.rupiah()),
                    target.title,
                    record.receipt_number
                ),
                details: json!({
                    "paymentId": record.id,
                    "receiptNumber": record.receipt_number,
                    "amount": amount.rupiah(),
                    "paymentMethod": record.payment_method,
                    "paidAmount": plan.new_paid.rupiah(),
                    "remaining": plan.remaining.rupiah(),
                    "status": plan.status,
                }),
            },
        )
        .await;

        Ok(PaymentReceipt {
            payment_id: record.id,
            receipt_number: record.receipt_number,
            liability_id: target.id,
            status: plan.status,
            paid_amount: plan.new_paid.rupiah(),
            remaining: plan.remaining.rupiah(),
        })
    }

    /// Cancels a payment, restoring the liability and the student's ledger.
    pub async fn cancel(&self, payment_id: &str, actor: &Actor) -> LedgerResult<CancelOutcome> {
        validate_uuid("paymentId", payment_id)?;

        // The lock key is the liability, which is only known after a read.
        let liability_id = self
            .db
            .payments()
            .get_by_id(payment_id)
            .await?
            .map(|p| p.liability_id)
            .ok_or_else(|| LedgerError::not_found("Payment", payment_id))?;

        let _guard = self.db.locks().lock(&liability_key(&liability_id)).await;
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let record = payment::fetch(&mut *tx, payment_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Payment", payment_id))?;
        let target = liability::fetch(&mut *tx, &record.liability_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Liability", record.liability_id.clone()))?;

        let plan = plan_reversal(&target, record.amount());
        reverse_payment(&mut *tx, &target, &record, &plan, now).await?;
        tx.commit().await?;

        info!(
            payment_id,
            liability_id = %target.id,
            amount = record.amount,
            status = ?plan.status,
            "Payment cancelled"
        );

        record_audit(
            &self.db,
            actor,
            AuditEvent {
                action: "cancel_payment",
                entity_type: "payment",
                entity_id: payment_id,
                severity: AuditSeverity::Critical,
                description: format!(
                    "Cancelled payment {} of {} for {}",
                    record.receipt_number,
                    rp(record.amount),
                    target.title
                ),
                details: json!({
                    "liabilityId": target.id,
                    "receiptNumber": record.receipt_number,
                    "amount": record.amount,
                    "paidAmount": plan.new_paid.rupiah(),
                    "status": plan.status,
                }),
            },
        )
        .await;

        Ok(CancelOutcome {
            payment_id: record.id,
            liability_id: target.id,
            status: plan.status,
            paid_amount: plan.new_paid.rupiah(),
        })
    }

    /// Soft-deletes an unpaid liability. Liabilities with collected payments
    /// are refused; cancel the payments first.
    pub async fn delete_liability(&self, liability_id: &str, actor: &Actor) -> LedgerResult<()> {
        validate_uuid("liabilityId", liability_id)?;

        let _guard = self.db.locks().lock(&liability_key(liability_id)).await;
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let target = liability::fetch(&mut *tx, liability_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Liability", liability_id))?;

        let delta = plan_deletion(&target)?;
        remove_liability(&mut *tx, &target, &delta, now).await?;
        tx.commit().await?;

        info!(liability_id, student_id = %target.student_id, amount = target.amount, "Liability deleted");

        record_audit(
            &self.db,
            actor,
            AuditEvent {
                action: "delete",
                entity_type: "liability",
                entity_id: liability_id,
                severity: AuditSeverity::Warning,
                description: format!("Deleted liability {} ({})", target.title, rp(target.amount)),
                details: json!({
                    "studentId": target.student_id,
                    "templateId": target.template_id,
                    "amount": target.amount,
                }),
            },
        )
        .await;

        Ok(())
    }
}
