//! # Domain Types
//!
//! Core domain types of the billing ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ BillingTemplate │   │    Liability    │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  variants[]  ───┼──►│  original_amount│◄──┤  liability_id   │       │
//! │  │  items[]     ───┼──►│  items[] (snap) │   │  receipt_number │       │
//! │  │  policy flags   │   │  paid_amount    │   │  amount         │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │                                       │
//! │                        ┌────────▼────────┐                              │
//! │                        │     Student     │                              │
//! │                        │  balance        │                              │
//! │                        │  total_liabs    │                              │
//! │                        │  total_paid     │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A liability copies the template's line items when it is generated. Later
//! edits to the template never reach liabilities that already exist.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::matcher::VariantPredicate;
use crate::money::Money;

// =============================================================================
// Actor
// =============================================================================

/// Whoever performs a ledger mutation. Authentication happens upstream; the
/// ledger only records the identity it is handed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            name: name.into(),
        }
    }

    /// The identity used by maintenance jobs and seeders.
    pub fn system() -> Self {
        Actor::new("system", "System")
    }
}

// =============================================================================
// Student
// =============================================================================

/// Enrollment status of a student. Only active students are billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
    Graduated,
}

impl Default for StudentStatus {
    fn default() -> Self {
        StudentStatus::Active
    }
}

/// A student with the three running ledger totals.
///
/// ## Ledger Fields
/// - `balance`: outstanding across all live liabilities
/// - `total_liabilities`: gross amount billed
/// - `total_paid`: gross amount collected
///
/// Only the ledger services in `kopsis-db` write these.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub registration_number: String,
    pub full_name: String,
    pub class_name: String,
    pub program: Option<String>,
    pub gender: Option<String>,
    /// 0..=100
    pub scholarship_percent: u8,
    pub status: StudentStatus,
    pub balance: i64,
    pub total_liabilities: i64,
    pub total_paid: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Student {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_rupiah(self.balance)
    }

    #[inline]
    pub fn total_paid(&self) -> Money {
        Money::from_rupiah(self.total_paid)
    }

    #[inline]
    pub fn total_liabilities(&self) -> Money {
        Money::from_rupiah(self.total_liabilities)
    }
}

/// Input for registering a student in the directory.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub registration_number: String,
    pub full_name: String,
    pub class_name: String,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub scholarship_percent: u8,
}

/// The slice of a student shown next to a liability.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: String,
    pub full_name: String,
    pub class_name: String,
    pub registration_number: String,
}

impl From<&Student> for StudentSummary {
    fn from(student: &Student) -> Self {
        StudentSummary {
            id: student.id.clone(),
            full_name: student.full_name.clone(),
            class_name: student.class_name.clone(),
            registration_number: student.registration_number.clone(),
        }
    }
}

// =============================================================================
// Billing Template
// =============================================================================

/// A physical good bundled with a template (uniform, textbook).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    #[serde(default)]
    pub price: Option<i64>,
}

/// A priced rule as submitted by the template form.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    /// Comma separated class tokens, or `*`.
    pub class_names: String,
    /// Comma separated programs; empty means any.
    #[serde(default)]
    pub programs: Option<String>,
    /// Comma separated genders; empty means any.
    #[serde(default)]
    pub genders: Option<String>,
    pub amount: i64,
}

/// A stored priced rule of a template.
///
/// The comma strings are kept for display; matching runs against the
/// predicate compiled once in [`Variant::new`].
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    pub template_id: String,
    pub position: i64,
    pub class_names: String,
    pub programs: Option<String>,
    pub genders: Option<String>,
    pub amount: i64,
    #[serde(skip)]
    #[ts(skip)]
    predicate: VariantPredicate,
}

impl Variant {
    pub fn new(
        id: impl Into<String>,
        template_id: impl Into<String>,
        position: i64,
        class_names: impl Into<String>,
        programs: Option<String>,
        genders: Option<String>,
        amount: i64,
    ) -> Self {
        let class_names = class_names.into();
        let predicate =
            VariantPredicate::parse(&class_names, programs.as_deref(), genders.as_deref());
        Variant {
            id: id.into(),
            template_id: template_id.into(),
            position,
            class_names,
            programs,
            genders,
            amount,
            predicate,
        }
    }

    #[inline]
    pub fn predicate(&self) -> &VariantPredicate {
        &self.predicate
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_rupiah(self.amount)
    }
}

/// Installment rules of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPolicy {
    pub allow_installment: bool,
    pub min_installment: Option<i64>,
    pub max_installments: Option<u32>,
}

impl Default for InstallmentPolicy {
    fn default() -> Self {
        InstallmentPolicy {
            allow_installment: true,
            min_installment: None,
            max_installments: None,
        }
    }
}

/// A reusable billing definition.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillingTemplate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub academic_year: Option<String>,
    pub semester: Option<String>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub apply_scholarship: bool,
    pub allow_installment: bool,
    pub min_installment: Option<i64>,
    pub max_installments: Option<u32>,
    pub is_recurring: bool,
    pub recurring_type: Option<String>,
    pub is_active: bool,
    /// In precedence order.
    pub variants: Vec<Variant>,
    pub items: Vec<LineItem>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl BillingTemplate {
    pub fn installment_policy(&self) -> InstallmentPolicy {
        InstallmentPolicy {
            allow_installment: self.allow_installment,
            min_installment: self.min_installment,
            max_installments: self.max_installments,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Create/update payload for a template.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub apply_scholarship: bool,
    #[serde(default = "default_true")]
    pub allow_installment: bool,
    #[serde(default)]
    pub min_installment: Option<i64>,
    #[serde(default)]
    pub max_installments: Option<u32>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurring_type: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub variants: Vec<VariantInput>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// A template plus the number of liabilities generated from it.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    #[serde(flatten)]
    pub template: BillingTemplate,
    pub liability_count: i64,
}

/// Filters for listing templates. `None` means "don't filter".
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFilter {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

// =============================================================================
// Liability
// =============================================================================

/// Payment status of a liability. Always derived from the amounts, see
/// [`LiabilityStatus::from_amounts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LiabilityStatus {
    Unpaid,
    Partial,
    Paid,
}

impl LiabilityStatus {
    /// `paid` iff paid >= amount, `partial` iff 0 < paid < amount, else `unpaid`.
    pub fn from_amounts(paid: Money, amount: Money) -> Self {
        if paid.rupiah() <= 0 {
            // A zero-amount liability is settled from the start.
            if amount.rupiah() <= 0 {
                LiabilityStatus::Paid
            } else {
                LiabilityStatus::Unpaid
            }
        } else if paid >= amount {
            LiabilityStatus::Paid
        } else {
            LiabilityStatus::Partial
        }
    }
}

impl Default for LiabilityStatus {
    fn default() -> Self {
        LiabilityStatus::Unpaid
    }
}

/// Delivery status of one physical item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Delivered,
}

impl Default for ItemStatus {
    fn default() -> Self {
        ItemStatus::Pending
    }
}

/// A physical good attached to a liability, tracked apart from payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentItem {
    pub name: String,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_by: Option<String>,
}

impl FulfillmentItem {
    #[inline]
    pub fn is_delivered(&self) -> bool {
        self.status == ItemStatus::Delivered
    }
}

/// An item as submitted by a client. The status is free text on purpose:
/// anything other than `"delivered"` is normalised to pending, and the
/// delivery stamps are decided server side.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    pub name: String,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A billed obligation of one student.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Liability {
    pub id: String,
    pub student_id: String,
    /// `None` for ad-hoc liabilities.
    pub template_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    /// Price of the matched variant.
    pub original_amount: i64,
    /// Scholarship reduction.
    pub discount_amount: i64,
    /// What is owed: original minus discount.
    pub amount: i64,
    pub paid_amount: i64,
    pub status: LiabilityStatus,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub items: Vec<FulfillmentItem>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Liability {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_rupiah(self.amount)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_rupiah(self.paid_amount)
    }

    /// Amount still owed on this liability, never negative.
    #[inline]
    pub fn outstanding(&self) -> Money {
        (self.amount() - self.paid()).non_negative()
    }
}

/// A liability together with its student and template.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LiabilityDetail {
    pub liability: Liability,
    pub student: StudentSummary,
    pub template: Option<BillingTemplate>,
}

/// Which students an ad-hoc liability is issued to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StudentFilter {
    pub class_names: Vec<String>,
    #[serde(default)]
    pub program: Option<String>,
}

/// Input for an ad-hoc liability (no template, one flat amount).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AdhocLiability {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub amount: i64,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub filter: StudentFilter,
}

// =============================================================================
// Payment
// =============================================================================

/// How a payment was tendered.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash at the cooperative counter.
    Cash,
    /// Bank transfer confirmed by the cashier.
    Transfer,
    /// QRIS e-wallet payment.
    Qris,
}

/// A payment against a liability.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub receipt_number: String,
    pub liability_id: String,
    pub student_id: String,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub cashier_id: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub payment_date: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_rupiah(self.amount)
    }
}

/// Filters for listing payments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFilter {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub liability_id: Option<String>,
}

// =============================================================================
// Requests & Outcomes
// =============================================================================

/// Which classes to bill from a template, minus individual students.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub class_names: Vec<String>,
    #[serde(default)]
    pub exclude_student_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub created: i64,
    pub skipped: i64,
}

/// A payment as entered at the counter. The cashier defaults to the actor.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub liability_id: String,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub cashier_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// What the cashier hands back to the payer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment_id: String,
    pub receipt_number: String,
    pub liability_id: String,
    pub status: LiabilityStatus,
    pub paid_amount: i64,
    pub remaining: i64,
}

/// State of the liability after a payment was cancelled.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    pub payment_id: String,
    pub liability_id: String,
    pub status: LiabilityStatus,
    pub paid_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BulkFulfillmentRequest {
    pub liability_ids: Vec<String>,
    pub item_names: Vec<String>,
}

/// Stored versus recomputed ledger fields of one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCheck {
    pub student_id: String,
    pub stored_balance: i64,
    pub stored_total_liabilities: i64,
    pub stored_total_paid: i64,
    pub computed_balance: i64,
    pub computed_total_liabilities: i64,
    pub computed_total_paid: i64,
}

impl LedgerCheck {
    pub fn is_consistent(&self) -> bool {
        self.stored_balance == self.computed_balance
            && self.stored_total_liabilities == self.computed_total_liabilities
            && self.stored_total_paid == self.computed_total_paid
    }
}

/// Result of recomputing paid amounts from payment rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub checked: i64,
    pub fixed: i64,
    pub fixed_liability_ids: Vec<String>,
}

// =============================================================================
// Audit
// =============================================================================

/// How loudly an audit entry should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

/// One line of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub actor_id: String,
    pub actor_name: String,
    pub action: String,
    pub module: String,
    pub entity_type: String,
    pub entity_id: String,
    pub description: String,
    /// Resulting amounts and other context.
    pub details: serde_json::Value,
    pub severity: AuditSeverity,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rp(v: i64) -> Money {
        Money::from_rupiah(v)
    }

    #[test]
    fn test_status_from_amounts() {
        assert_eq!(
            LiabilityStatus::from_amounts(rp(0), rp(100)),
            LiabilityStatus::Unpaid
        );
        assert_eq!(
            LiabilityStatus::from_amounts(rp(1), rp(100)),
            LiabilityStatus::Partial
        );
        assert_eq!(
            LiabilityStatus::from_amounts(rp(99), rp(100)),
            LiabilityStatus::Partial
        );
        assert_eq!(
            LiabilityStatus::from_amounts(rp(100), rp(100)),
            LiabilityStatus::Paid
        );
        assert_eq!(
            LiabilityStatus::from_amounts(rp(-5), rp(100)),
            LiabilityStatus::Unpaid
        );
    }

    #[test]
    fn test_full_scholarship_liability_is_paid() {
        assert_eq!(
            LiabilityStatus::from_amounts(rp(0), rp(0)),
            LiabilityStatus::Paid
        );
    }

    #[test]
    fn test_variant_compiles_predicate_once() {
        let variant = Variant::new("v1", "t1", 0, "7, 8", None, Some("L".into()), 100_000);
        assert!(variant.predicate().class_tokens().contains("7"));
        assert!(variant.predicate().class_tokens().contains("8"));
        assert!(variant.predicate().gender_tokens().contains("L"));
        assert!(variant.predicate().program_tokens().is_empty());
    }

    #[test]
    fn test_variant_serializes_without_predicate() {
        let variant = Variant::new("v1", "t1", 0, "*", None, None, 50_000);
        let json = serde_json::to_value(&variant).unwrap();
        assert_eq!(json["classNames"], "*");
        assert_eq!(json["amount"], 50_000);
        assert!(json.get("predicate").is_none());
    }

    #[test]
    fn test_template_draft_defaults() {
        let draft: TemplateDraft = serde_json::from_value(serde_json::json!({
            "name": "Seragam 2026",
            "category": "Seragam",
            "variants": [{ "classNames": "*", "amount": 100000 }]
        }))
        .unwrap();

        assert!(draft.allow_installment);
        assert!(draft.is_active);
        assert!(!draft.apply_scholarship);
        assert!(draft.items.is_empty());
    }

    #[test]
    fn test_outstanding_never_negative() {
        let now = Utc::now();
        let liability = Liability {
            id: "l1".into(),
            student_id: "s1".into(),
            template_id: None,
            title: "Buku".into(),
            description: None,
            original_amount: 100,
            discount_amount: 0,
            amount: 100,
            paid_amount: 120,
            status: LiabilityStatus::Paid,
            due_date: None,
            items: vec![],
            created_at: now,
            updated_at: now,
        };
        assert_eq!(liability.outstanding(), Money::zero());
    }
}
