//! # Payment Rules
//!
//! Decides what a payment, a cancellation or a deletion does to a liability
//! and to the student's ledger fields. Nothing here writes; `kopsis-db`
//! applies the returned plan inside one transaction.
//!
//! ## Status Machine
//! ```text
//!            pay (partial)          pay (settles)
//!   ┌────────┐ ──────────► ┌─────────┐ ──────────► ┌──────┐
//!   │ unpaid │             │ partial │             │ paid │
//!   └────────┘ ◄────────── └─────────┘ ◄────────── └──────┘
//!              cancel                   cancel
//! ```
//!
//! The status is always recomputed from `paid_amount` and `amount`, never
//! stepped, so a cancellation can land on any state the numbers dictate.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{InstallmentPolicy, Liability, LiabilityStatus};

// =============================================================================
// Ledger Delta
// =============================================================================

/// Change to a student's three ledger fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerDelta {
    pub balance: Money,
    pub total_liabilities: Money,
    pub total_paid: Money,
}

impl LedgerDelta {
    /// A new liability of `amount`.
    pub fn billed(amount: Money) -> Self {
        LedgerDelta {
            balance: amount,
            total_liabilities: amount,
            total_paid: Money::zero(),
        }
    }

    /// `amount` collected.
    pub fn paid(amount: Money) -> Self {
        LedgerDelta {
            balance: -amount,
            total_liabilities: Money::zero(),
            total_paid: amount,
        }
    }
}

// =============================================================================
// Pay
// =============================================================================

/// Outcome of an accepted payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPlan {
    pub new_paid: Money,
    pub status: LiabilityStatus,
    pub remaining: Money,
    pub delta: LedgerDelta,
}

/// Checks a payment of `amount` against `liability` and returns its effect.
///
/// `policy` is the template's installment policy (ad-hoc liabilities have
/// none) and `payments_made` the number of payments already recorded.
///
/// ## Rejections
/// - amount not positive
/// - liability already settled
/// - amount above the outstanding remainder
/// - installment policy violations (see [`check_installment`])
pub fn plan_payment(
    liability: &Liability,
    amount: Money,
    policy: Option<&InstallmentPolicy>,
    payments_made: u32,
) -> CoreResult<PaymentPlan> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into());
    }

    if liability.paid() >= liability.amount() {
        return Err(CoreError::AlreadyPaid {
            liability_id: liability.id.clone(),
        });
    }

    let remaining = liability.outstanding();
    if amount > remaining {
        return Err(CoreError::Overpayment {
            requested: amount,
            remaining,
        });
    }

    if let Some(policy) = policy {
        check_installment(policy, amount, remaining, payments_made)?;
    }

    let new_paid = liability.paid() + amount;
    Ok(PaymentPlan {
        new_paid,
        status: LiabilityStatus::from_amounts(new_paid, liability.amount()),
        remaining: remaining - amount,
        delta: LedgerDelta::paid(amount),
    })
}

/// Installment rules. A payment that settles the remainder is always
/// acceptable, except when the payment count cap is already used up.
pub fn check_installment(
    policy: &InstallmentPolicy,
    amount: Money,
    remaining: Money,
    payments_made: u32,
) -> CoreResult<()> {
    let settles = amount == remaining;

    if !policy.allow_installment && !settles {
        return Err(CoreError::InstallmentNotAllowed { remaining });
    }

    if let Some(max) = policy.max_installments.filter(|m| *m > 0) {
        if payments_made >= max {
            return Err(CoreError::InstallmentLimitReached { max });
        }
        if payments_made + 1 == max && !settles {
            return Err(CoreError::FinalInstallmentMustSettle {
                requested: amount,
                remaining,
            });
        }
    }

    if let Some(minimum) = policy.min_installment.map(Money::from_rupiah) {
        if !settles && amount < minimum {
            return Err(CoreError::BelowMinimumInstallment {
                requested: amount,
                minimum,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Cancel
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReversalPlan {
    pub new_paid: Money,
    pub status: LiabilityStatus,
    pub delta: LedgerDelta,
}

/// The exact inverse of a payment of `payment_amount`. The liability's paid
/// amount is floored at zero; the student fields move by the full amount.
pub fn plan_reversal(liability: &Liability, payment_amount: Money) -> ReversalPlan {
    let new_paid = (liability.paid() - payment_amount).non_negative();
    ReversalPlan {
        new_paid,
        status: LiabilityStatus::from_amounts(new_paid, liability.amount()),
        delta: LedgerDelta {
            balance: payment_amount,
            total_liabilities: Money::zero(),
            total_paid: -payment_amount,
        },
    }
}

// =============================================================================
// Delete
// =============================================================================

/// Student delta for removing `liability`.
///
/// Only unpaid liabilities can be removed: `total_liabilities` drops by the
/// full amount and `balance` by the outstanding remainder, which for an
/// unpaid liability is the same number.
pub fn plan_deletion(liability: &Liability) -> CoreResult<LedgerDelta> {
    if liability.paid().is_positive() {
        return Err(CoreError::LiabilityHasPayments {
            liability_id: liability.id.clone(),
            paid: liability.paid(),
        });
    }

    Ok(LedgerDelta {
        balance: -liability.outstanding(),
        total_liabilities: -liability.amount(),
        total_paid: Money::zero(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn liability(amount: i64, paid: i64) -> Liability {
        let now = Utc::now();
        Liability {
            id: "l1".to_string(),
            student_id: "s1".to_string(),
            template_id: Some("t1".to_string()),
            title: "SPP".to_string(),
            description: None,
            original_amount: amount,
            discount_amount: 0,
            amount,
            paid_amount: paid,
            status: LiabilityStatus::from_amounts(Money::from_rupiah(paid), Money::from_rupiah(amount)),
            due_date: None,
            items: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn rp(v: i64) -> Money {
        Money::from_rupiah(v)
    }

    #[test]
    fn test_exact_remainder_settles() {
        let plan = plan_payment(&liability(100_000, 40_000), rp(60_000), None, 1).unwrap();

        assert_eq!(plan.status, LiabilityStatus::Paid);
        assert!(plan.remaining.is_zero());
        assert_eq!(plan.new_paid.rupiah(), 100_000);
        assert_eq!(plan.delta.balance.rupiah(), -60_000);
        assert_eq!(plan.delta.total_paid.rupiah(), 60_000);
    }

    #[test]
    fn test_one_over_remainder_rejected() {
        let err = plan_payment(&liability(100_000, 40_000), rp(60_001), None, 1).unwrap_err();
        assert!(matches!(err, CoreError::Overpayment { .. }));
    }

    #[test]
    fn test_partial_payment() {
        let plan = plan_payment(&liability(100_000, 0), rp(30_000), None, 0).unwrap();
        assert_eq!(plan.status, LiabilityStatus::Partial);
        assert_eq!(plan.remaining.rupiah(), 70_000);
    }

    #[test]
    fn test_already_paid_rejected() {
        let err = plan_payment(&liability(100_000, 100_000), rp(1), None, 2).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyPaid { .. }));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let err = plan_payment(&liability(100_000, 0), rp(0), None, 0).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_installments_disallowed() {
        let policy = InstallmentPolicy {
            allow_installment: false,
            min_installment: None,
            max_installments: None,
        };
        let l = liability(100_000, 0);

        assert!(matches!(
            plan_payment(&l, rp(50_000), Some(&policy), 0),
            Err(CoreError::InstallmentNotAllowed { .. })
        ));
        assert!(plan_payment(&l, rp(100_000), Some(&policy), 0).is_ok());
    }

    #[test]
    fn test_minimum_installment() {
        let policy = InstallmentPolicy {
            allow_installment: true,
            min_installment: Some(25_000),
            max_installments: None,
        };

        assert!(matches!(
            plan_payment(&liability(100_000, 0), rp(10_000), Some(&policy), 0),
            Err(CoreError::BelowMinimumInstallment { .. })
        ));
        // Settling a small remainder is fine even below the minimum.
        assert!(plan_payment(&liability(100_000, 90_000), rp(10_000), Some(&policy), 3).is_ok());
    }

    #[test]
    fn test_max_installments() {
        let policy = InstallmentPolicy {
            allow_installment: true,
            min_installment: None,
            max_installments: Some(3),
        };

        assert!(plan_payment(&liability(90_000, 0), rp(30_000), Some(&policy), 0).is_ok());
        assert!(matches!(
            plan_payment(&liability(90_000, 60_000), rp(10_000), Some(&policy), 2),
            Err(CoreError::FinalInstallmentMustSettle { .. })
        ));
        assert!(plan_payment(&liability(90_000, 60_000), rp(30_000), Some(&policy), 2).is_ok());
        assert!(matches!(
            plan_payment(&liability(90_000, 60_000), rp(30_000), Some(&policy), 3),
            Err(CoreError::InstallmentLimitReached { max: 3 })
        ));
    }

    #[test]
    fn test_reversal_reopens_paid_liability() {
        let plan = plan_reversal(&liability(100_000, 100_000), rp(40_000));
        assert_eq!(plan.new_paid.rupiah(), 60_000);
        assert_eq!(plan.status, LiabilityStatus::Partial);
        assert_eq!(plan.delta.balance.rupiah(), 40_000);
        assert_eq!(plan.delta.total_paid.rupiah(), -40_000);

        let plan = plan_reversal(&liability(100_000, 40_000), rp(40_000));
        assert_eq!(plan.status, LiabilityStatus::Unpaid);
    }

    #[test]
    fn test_reversal_floors_at_zero() {
        let plan = plan_reversal(&liability(100_000, 10_000), rp(40_000));
        assert!(plan.new_paid.is_zero());
        assert_eq!(plan.status, LiabilityStatus::Unpaid);
    }

    #[test]
    fn test_pay_then_reverse_restores() {
        let before = liability(100_000, 25_000);
        let pay = plan_payment(&before, rp(75_000), None, 1).unwrap();

        let mut after = before.clone();
        after.paid_amount = pay.new_paid.rupiah();
        after.status = pay.status;

        let rev = plan_reversal(&after, rp(75_000));
        assert_eq!(rev.new_paid, before.paid());
        assert_eq!(rev.status, before.status);
        assert_eq!(rev.delta.balance, -pay.delta.balance);
        assert_eq!(rev.delta.total_paid, -pay.delta.total_paid);
    }

    #[test]
    fn test_deletion() {
        let delta = plan_deletion(&liability(100_000, 0)).unwrap();
        assert_eq!(delta.balance.rupiah(), -100_000);
        assert_eq!(delta.total_liabilities.rupiah(), -100_000);
        assert!(delta.total_paid.is_zero());

        assert!(matches!(
            plan_deletion(&liability(100_000, 1)),
            Err(CoreError::LiabilityHasPayments { .. })
        ));
    }
}
