//! Fixtures shared by the ledger integration tests.

#![allow(dead_code)]

use kopsis_core::{
    Actor, BillingTemplate, GenerateRequest, Liability, LineItem, NewStudent, Student,
    TemplateDraft, VariantInput,
};
use kopsis_db::{Database, DbConfig};

pub async fn setup() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub fn cashier() -> Actor {
    Actor::new("cashier-1", "Bu Siti")
}

pub async fn enroll(db: &Database, reg: &str, name: &str, class_name: &str, scholarship: u8) -> Student {
    db.students()
        .insert(&NewStudent {
            registration_number: reg.to_string(),
            full_name: name.to_string(),
            class_name: class_name.to_string(),
            program: None,
            gender: None,
            scholarship_percent: scholarship,
        })
        .await
        .unwrap()
}

pub fn variant(class_names: &str, amount: i64) -> VariantInput {
    VariantInput {
        class_names: class_names.to_string(),
        programs: None,
        genders: None,
        amount,
    }
}

pub fn draft(name: &str, variants: Vec<VariantInput>) -> TemplateDraft {
    TemplateDraft {
        name: name.to_string(),
        description: None,
        category: "Seragam".to_string(),
        academic_year: Some("2026/2027".to_string()),
        semester: None,
        due_date: None,
        apply_scholarship: true,
        allow_installment: true,
        min_installment: None,
        max_installments: None,
        is_recurring: false,
        recurring_type: None,
        is_active: true,
        variants,
        items: vec![
            LineItem {
                name: "Baju".to_string(),
                price: Some(60_000),
            },
            LineItem {
                name: "Celana".to_string(),
                price: Some(40_000),
            },
        ],
    }
}

pub async fn create_template(db: &Database, draft: TemplateDraft) -> BillingTemplate {
    db.catalog().create(&draft, &cashier()).await.unwrap()
}

pub fn classes(names: &[&str]) -> GenerateRequest {
    GenerateRequest {
        class_names: names.iter().map(|n| n.to_string()).collect(),
        exclude_student_ids: Vec::new(),
    }
}

/// Student with one liability of `amount` from a single-variant template.
pub async fn billed_student(db: &Database, draft_fn: impl FnOnce(i64) -> TemplateDraft, amount: i64) -> (Student, Liability) {
    let student = enroll(db, "REG-001", "Ahmad", "Kelas 7A", 0).await;
    let template = create_template(db, draft_fn(amount)).await;
    db.generator()
        .generate(&template.id, &classes(&["Kelas 7A"]), &cashier())
        .await
        .unwrap();
    let liability = only_liability(db, &student.id).await;
    (student, liability)
}

pub fn uniform(amount: i64) -> TemplateDraft {
    draft("Seragam", vec![variant("*", amount)])
}

pub async fn only_liability(db: &Database, student_id: &str) -> Liability {
    let mut liabilities = db.liabilities().list_for_student(student_id).await.unwrap();
    assert_eq!(liabilities.len(), 1);
    liabilities.remove(0)
}

pub async fn reload_student(db: &Database, id: &str) -> Student {
    db.students().get_by_id(id).await.unwrap().unwrap()
}

pub async fn reload_liability(db: &Database, id: &str) -> Liability {
    db.liabilities().get_by_id(id).await.unwrap().unwrap()
}

/// balance == total_liabilities - total_paid, and all three agree with the rows.
pub async fn assert_ledger_consistent(db: &Database, student_id: &str) {
    let student = reload_student(db, student_id).await;
    assert_eq!(student.balance, student.total_liabilities - student.total_paid);

    let check = db.reconciler().verify_student_ledger(student_id).await.unwrap();
    assert!(check.is_consistent(), "ledger drifted: {:?}", check);
}
