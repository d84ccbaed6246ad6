//! Pay, cancel, delete and reconciliation against a real database.

mod common;

use common::*;
use kopsis_core::{
    AuditSeverity, CoreError, LiabilityStatus, PaymentFilter, PaymentMethod, PaymentRequest,
    TemplateDraft,
};
use kopsis_db::LedgerError;

fn pay_request(liability_id: &str, amount: i64) -> PaymentRequest {
    PaymentRequest {
        liability_id: liability_id.to_string(),
        amount,
        payment_method: PaymentMethod::Cash,
        cashier_id: None,
        notes: None,
    }
}

fn with_policy(allow: bool, min: Option<i64>, max: Option<u32>) -> impl FnOnce(i64) -> TemplateDraft {
    move |amount| {
        let mut d = uniform(amount);
        d.allow_installment = allow;
        d.min_installment = min;
        d.max_installments = max;
        d
    }
}

#[tokio::test]
async fn test_partial_then_full_payment() {
    let db = setup().await;
    let (student, liability) = billed_student(&db, uniform, 100_000).await;

    let first = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 40_000), &cashier())
        .await
        .unwrap();
    assert_eq!(first.status, LiabilityStatus::Partial);
    assert_eq!(first.remaining, 60_000);
    assert!(first.receipt_number.starts_with("PAY-"));

    let second = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 60_000), &cashier())
        .await
        .unwrap();
    assert_eq!(second.status, LiabilityStatus::Paid);
    assert_eq!(second.remaining, 0);
    assert_ne!(first.receipt_number, second.receipt_number);

    let reloaded = reload_student(&db, &student.id).await;
    assert_eq!(reloaded.total_paid, 100_000);
    assert_eq!(reloaded.balance, 0);
    assert_ledger_consistent(&db, &student.id).await;
}

#[tokio::test]
async fn test_paying_exact_remainder_marks_paid() {
    let db = setup().await;
    let (_, liability) = billed_student(&db, uniform, 100_000).await;

    let receipt = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 100_000), &cashier())
        .await
        .unwrap();

    assert_eq!(receipt.status, LiabilityStatus::Paid);
    assert_eq!(reload_liability(&db, &liability.id).await.paid_amount, 100_000);
}

#[tokio::test]
async fn test_overpayment_rejected_without_mutation() {
    let db = setup().await;
    let (student, liability) = billed_student(&db, uniform, 100_000).await;

    let result = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 100_001), &cashier())
        .await;
    assert!(matches!(result, Err(LedgerError::Core(CoreError::Overpayment { .. }))));

    let reloaded = reload_liability(&db, &liability.id).await;
    assert_eq!(reloaded.paid_amount, 0);
    assert_eq!(reloaded.status, LiabilityStatus::Unpaid);
    assert_eq!(reload_student(&db, &student.id).await.balance, 100_000);
    assert!(db
        .payments()
        .list(&PaymentFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_paid_liability_rejects_further_payment() {
    let db = setup().await;
    let (_, liability) = billed_student(&db, uniform, 100_000).await;
    db.payment_ledger()
        .pay(&pay_request(&liability.id, 100_000), &cashier())
        .await
        .unwrap();

    let result = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 1), &cashier())
        .await;
    assert!(matches!(result, Err(LedgerError::Core(CoreError::AlreadyPaid { .. }))));
}

#[tokio::test]
async fn test_non_positive_amount_rejected() {
    let db = setup().await;
    let (_, liability) = billed_student(&db, uniform, 100_000).await;

    for amount in [0, -5_000] {
        let result = db
            .payment_ledger()
            .pay(&pay_request(&liability.id, amount), &cashier())
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }
}

#[tokio::test]
async fn test_unknown_liability_is_not_found() {
    let db = setup().await;
    let missing = kopsis_db::repository::new_id();

    let result = db.payment_ledger().pay(&pay_request(&missing, 10_000), &cashier()).await;
    assert!(matches!(result, Err(LedgerError::NotFound { .. })));
}

#[tokio::test]
async fn test_pay_then_cancel_restores_everything() {
    let db = setup().await;
    let (student, liability) = billed_student(&db, uniform, 100_000).await;
    db.payment_ledger()
        .pay(&pay_request(&liability.id, 30_000), &cashier())
        .await
        .unwrap();
    let before_liability = reload_liability(&db, &liability.id).await;
    let before_student = reload_student(&db, &student.id).await;

    let receipt = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 50_000), &cashier())
        .await
        .unwrap();
    let outcome = db.payment_ledger().cancel(&receipt.payment_id, &cashier()).await.unwrap();

    assert_eq!(outcome.paid_amount, before_liability.paid_amount);
    assert_eq!(outcome.status, before_liability.status);

    let after_liability = reload_liability(&db, &liability.id).await;
    let after_student = reload_student(&db, &student.id).await;
    assert_eq!(after_liability.paid_amount, before_liability.paid_amount);
    assert_eq!(after_liability.status, before_liability.status);
    assert_eq!(after_student.balance, before_student.balance);
    assert_eq!(after_student.total_paid, before_student.total_paid);
    assert!(db.payments().get_by_id(&receipt.payment_id).await.unwrap().is_none());
    assert_ledger_consistent(&db, &student.id).await;
}

#[tokio::test]
async fn test_cancel_reopens_paid_liability() {
    let db = setup().await;
    let (student, liability) = billed_student(&db, uniform, 100_000).await;
    let receipt = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 100_000), &cashier())
        .await
        .unwrap();

    let outcome = db.payment_ledger().cancel(&receipt.payment_id, &cashier()).await.unwrap();

    assert_eq!(outcome.status, LiabilityStatus::Unpaid);
    assert_eq!(outcome.paid_amount, 0);
    assert_eq!(reload_student(&db, &student.id).await.balance, 100_000);
}

#[tokio::test]
async fn test_cancel_unknown_payment_is_not_found() {
    let db = setup().await;
    let missing = kopsis_db::repository::new_id();

    let result = db.payment_ledger().cancel(&missing, &cashier()).await;
    assert!(matches!(result, Err(LedgerError::NotFound { .. })));
}

#[tokio::test]
async fn test_installments_disallowed_requires_full_payment() {
    let db = setup().await;
    let (_, liability) = billed_student(&db, with_policy(false, None, None), 100_000).await;

    let partial = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 50_000), &cashier())
        .await;
    assert!(matches!(
        partial,
        Err(LedgerError::Core(CoreError::InstallmentNotAllowed { .. }))
    ));

    let full = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 100_000), &cashier())
        .await
        .unwrap();
    assert_eq!(full.status, LiabilityStatus::Paid);
}

#[tokio::test]
async fn test_minimum_installment_enforced_except_for_settlement() {
    let db = setup().await;
    let (_, liability) = billed_student(&db, with_policy(true, Some(30_000), None), 100_000).await;

    let small = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 10_000), &cashier())
        .await;
    assert!(matches!(
        small,
        Err(LedgerError::Core(CoreError::BelowMinimumInstallment { .. }))
    ));

    db.payment_ledger()
        .pay(&pay_request(&liability.id, 80_000), &cashier())
        .await
        .unwrap();

    // The remaining 20_000 is below the minimum but settles the liability.
    let last = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 20_000), &cashier())
        .await
        .unwrap();
    assert_eq!(last.status, LiabilityStatus::Paid);
}

#[tokio::test]
async fn test_last_allowed_installment_must_settle() {
    let db = setup().await;
    let (_, liability) = billed_student(&db, with_policy(true, None, Some(2)), 100_000).await;

    db.payment_ledger()
        .pay(&pay_request(&liability.id, 40_000), &cashier())
        .await
        .unwrap();

    let short = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 30_000), &cashier())
        .await;
    assert!(matches!(
        short,
        Err(LedgerError::Core(CoreError::FinalInstallmentMustSettle { .. }))
    ));

    let settle = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 60_000), &cashier())
        .await
        .unwrap();
    assert_eq!(settle.status, LiabilityStatus::Paid);
}

#[tokio::test]
async fn test_concurrent_payments_never_overpay() {
    let db = setup().await;
    let (student, liability) = billed_student(&db, uniform, 100_000).await;
    let ledger = db.payment_ledger();
    let actor = cashier();
    let request = pay_request(&liability.id, 60_000);

    let (a, b) = tokio::join!(ledger.pay(&request, &actor), ledger.pay(&request, &actor));

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(reload_liability(&db, &liability.id).await.paid_amount, 60_000);
    assert_ledger_consistent(&db, &student.id).await;
}

#[tokio::test]
async fn test_delete_unpaid_liability() {
    let db = setup().await;
    let (student, liability) = billed_student(&db, uniform, 100_000).await;

    db.payment_ledger().delete_liability(&liability.id, &cashier()).await.unwrap();

    assert!(db.liabilities().get_by_id(&liability.id).await.unwrap().is_none());
    let reloaded = reload_student(&db, &student.id).await;
    assert_eq!(reloaded.total_liabilities, 0);
    assert_eq!(reloaded.balance, 0);
    assert_ledger_consistent(&db, &student.id).await;
}

#[tokio::test]
async fn test_delete_liability_with_payments_rejected() {
    let db = setup().await;
    let (student, liability) = billed_student(&db, uniform, 100_000).await;
    db.payment_ledger()
        .pay(&pay_request(&liability.id, 25_000), &cashier())
        .await
        .unwrap();

    let result = db.payment_ledger().delete_liability(&liability.id, &cashier()).await;
    assert!(matches!(
        result,
        Err(LedgerError::Core(CoreError::LiabilityHasPayments { .. }))
    ));
    assert!(db.liabilities().get_by_id(&liability.id).await.unwrap().is_some());
    assert_ledger_consistent(&db, &student.id).await;
}

#[tokio::test]
async fn test_payments_listed_newest_first() {
    let db = setup().await;
    let (student, liability) = billed_student(&db, uniform, 100_000).await;
    let first = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 10_000), &cashier())
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 20_000), &cashier())
        .await
        .unwrap();

    let payments = db
        .payment_ledger()
        .list(&PaymentFilter {
            student_id: Some(student.id.clone()),
            liability_id: None,
        })
        .await
        .unwrap();

    let ids: Vec<&str> = payments.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec![second.payment_id.as_str(), first.payment_id.as_str()]);
    assert!(payments.iter().all(|p| p.cashier_id == "cashier-1"));
}

#[tokio::test]
async fn test_payment_and_cancel_are_audited_as_critical() {
    let db = setup().await;
    let (_, liability) = billed_student(&db, uniform, 100_000).await;
    let receipt = db
        .payment_ledger()
        .pay(&pay_request(&liability.id, 100_000), &cashier())
        .await
        .unwrap();
    db.payment_ledger().cancel(&receipt.payment_id, &cashier()).await.unwrap();

    let pay_entries = db.audit().list_for_entity("liability", &liability.id).await.unwrap();
    assert_eq!(pay_entries.len(), 1);
    assert_eq!(pay_entries[0].action, "pay");
    assert_eq!(pay_entries[0].severity, AuditSeverity::Critical);
    assert_eq!(pay_entries[0].actor_name, "Bu Siti");

    let cancel_entries = db.audit().list_for_entity("payment", &receipt.payment_id).await.unwrap();
    assert_eq!(cancel_entries.len(), 1);
    assert_eq!(cancel_entries[0].severity, AuditSeverity::Critical);
}

#[tokio::test]
async fn test_reconcile_restores_paid_amount_from_payments() {
    let db = setup().await;
    let (_, liability) = billed_student(&db, uniform, 100_000).await;
    db.payment_ledger()
        .pay(&pay_request(&liability.id, 40_000), &cashier())
        .await
        .unwrap();

    sqlx::query("UPDATE liabilities SET paid_amount = 0, status = 'unpaid' WHERE id = ?1")
        .bind(&liability.id)
        .execute(db.pool())
        .await
        .unwrap();

    let report = db.reconciler().reconcile_paid_amounts(&cashier()).await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.fixed, 1);
    assert_eq!(report.fixed_liability_ids, vec![liability.id.clone()]);

    let reloaded = reload_liability(&db, &liability.id).await;
    assert_eq!(reloaded.paid_amount, 40_000);
    assert_eq!(reloaded.status, LiabilityStatus::Partial);

    let again = db.reconciler().reconcile_paid_amounts(&cashier()).await.unwrap();
    assert_eq!(again.fixed, 0);
}

#[tokio::test]
async fn test_repair_student_ledger_rewrites_drifted_fields() {
    let db = setup().await;
    let (student, _) = billed_student(&db, uniform, 100_000).await;

    sqlx::query("UPDATE students SET balance = 999, total_paid = 5 WHERE id = ?1")
        .bind(&student.id)
        .execute(db.pool())
        .await
        .unwrap();

    let check = db.reconciler().verify_student_ledger(&student.id).await.unwrap();
    assert!(!check.is_consistent());
    assert_eq!(check.computed_balance, 100_000);

    let before = db.reconciler().repair_student_ledger(&student.id, &cashier()).await.unwrap();
    assert_eq!(before.stored_balance, 999);
    assert_ledger_consistent(&db, &student.id).await;
}
