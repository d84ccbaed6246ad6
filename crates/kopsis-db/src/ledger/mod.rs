//! # Ledger Services
//!
//! The only code that moves money: every student ledger field change goes
//! through one of the unit-of-work functions below, always inside a write
//! transaction opened by a service.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_liability   INSERT liability (skip on unique conflict)         │
//! │                     + student: balance += amount, total_liab += amount │
//! │                                                                         │
//! │  apply_payment      INSERT payment                                     │
//! │                     + liability: paid_amount old → new (guarded)       │
//! │                     + student: balance −= x, total_paid += x           │
//! │                                                                         │
//! │  reverse_payment    DELETE payment                                     │
//! │                     + liability: paid_amount old → new (guarded)       │
//! │                     + student: balance += x, total_paid −= x           │
//! │                                                                         │
//! │  remove_liability   soft DELETE liability (guarded: unpaid)            │
//! │                     + student: balance −= outstanding,                 │
//! │                                total_liab −= amount                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A caller cannot update one side without the other. Audit entries are
//! written after commit and their failure is only logged.

mod fulfillment;
mod generation;
mod payments;
mod reconcile;
mod templates;

pub use fulfillment::FulfillmentTracker;
pub use generation::LiabilityGenerator;
pub use payments::PaymentLedger;
pub use reconcile::Reconciler;
pub use templates::TemplateCatalog;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::warn;

use crate::error::{DbResult, LedgerError, LedgerResult};
use crate::pool::Database;
use crate::repository::{liability, new_id, payment, student};
use kopsis_core::payment::{PaymentPlan, ReversalPlan};
use kopsis_core::{Actor, AuditEntry, AuditSeverity, LedgerDelta, Liability, Money, Payment};

/// Audit `module` for everything in this crate.
const AUDIT_MODULE: &str = "liability";

// =============================================================================
// Unit-of-work functions
// =============================================================================

/// Inserts `liability` and bills its student. Returns `false` (and changes
/// nothing) when the student already holds a live liability for the same
/// template.
pub(crate) async fn create_liability(
    conn: &mut SqliteConnection,
    liability: &Liability,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    if !liability::insert_if_absent(&mut *conn, liability).await? {
        return Ok(false);
    }
    student::apply_delta(conn, &liability.student_id, &LedgerDelta::billed(liability.amount()), now)
        .await?;
    Ok(true)
}

/// Records `payment` against `liability` (as read in this transaction).
pub(crate) async fn apply_payment(
    conn: &mut SqliteConnection,
    liability: &Liability,
    payment: &Payment,
    plan: &PaymentPlan,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    payment::insert(&mut *conn, payment).await?;

    let moved = liability::update_paid(
        &mut *conn,
        &liability.id,
        liability.paid_amount,
        plan.new_paid.rupiah(),
        plan.status,
        now,
    )
    .await?;
    if !moved {
        return Err(LedgerError::concurrent("Liability", liability.id.clone()));
    }

    student::apply_delta(conn, &liability.student_id, &plan.delta, now).await?;
    Ok(())
}

/// Removes `payment` and undoes its effect on `liability` and the student.
pub(crate) async fn reverse_payment(
    conn: &mut SqliteConnection,
    liability: &Liability,
    payment: &Payment,
    plan: &ReversalPlan,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    if !payment::delete(&mut *conn, &payment.id).await? {
        return Err(LedgerError::concurrent("Payment", payment.id.clone()));
    }

    let moved = liability::update_paid(
        &mut *conn,
        &liability.id,
        liability.paid_amount,
        plan.new_paid.rupiah(),
        plan.status,
        now,
    )
    .await?;
    if !moved {
        return Err(LedgerError::concurrent("Liability", liability.id.clone()));
    }

    student::apply_delta(conn, &payment.student_id, &plan.delta, now).await?;
    Ok(())
}

/// Soft-deletes an unpaid liability and takes it off the student's totals.
pub(crate) async fn remove_liability(
    conn: &mut SqliteConnection,
    liability: &Liability,
    delta: &LedgerDelta,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    if !liability::soft_delete(&mut *conn, &liability.id, now).await? {
        return Err(LedgerError::concurrent("Liability", liability.id.clone()));
    }
    student::apply_delta(conn, &liability.student_id, delta, now).await?;
    Ok(())
}

// =============================================================================
// Audit
// =============================================================================

pub(crate) struct AuditEvent<'a> {
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    pub severity: AuditSeverity,
    pub description: String,
    pub details: serde_json::Value,
}

/// Writes an audit entry on the pool. Failures are logged, never returned.
pub(crate) async fn record_audit(db: &Database, actor: &Actor, event: AuditEvent<'_>) {
    let entry = AuditEntry {
        id: new_id(),
        actor_id: actor.id.clone(),
        actor_name: actor.name.clone(),
        action: event.action.to_string(),
        module: AUDIT_MODULE.to_string(),
        entity_type: event.entity_type.to_string(),
        entity_id: event.entity_id.to_string(),
        description: event.description,
        details: event.details,
        severity: event.severity,
        created_at: Utc::now(),
    };

    if let Err(e) = db.audit().insert(&entry).await {
        warn!(
            error = %e,
            action = %entry.action,
            entity_id = %entry.entity_id,
            "Audit write failed; mutation stays committed"
        );
    }
}

fn rp(amount: i64) -> String {
    Money::from_rupiah(amount).to_string()
}
