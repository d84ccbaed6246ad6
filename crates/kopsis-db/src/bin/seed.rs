//! # Seed Data Generator
//!
//! Populates the database with students and a uniform template for
//! development.
//!
//! ## Usage
//! ```bash
//! # 60 students per grade (default)
//! cargo run -p kopsis-db --bin seed
//!
//! # Custom amount
//! cargo run -p kopsis-db --bin seed -- --count 120
//!
//! # Specify database path
//! cargo run -p kopsis-db --bin seed -- --db ./data/kopsis.db
//! ```
//!
//! ## Generated Data
//! - Students spread over classes `Kelas 7A` .. `Kelas 9C`, alternating
//!   gender, every seventh one on a 50% scholarship
//! - One active `Seragam` template: grade 7 pays more than the rest, with
//!   three line items to deliver
//! - Liabilities generated for grade 7

use std::env;

use kopsis_core::{Actor, GenerateRequest, LineItem, NewStudent, TemplateDraft, TemplateFilter, VariantInput};
use kopsis_db::{Database, DbConfig};

const GRADES: &[&str] = &["7", "8", "9"];
const SECTIONS: &[&str] = &["A", "B", "C"];
const PROGRAMS: &[&str] = &["Reguler", "Tahfidz"];

const FIRST_NAMES: &[&str] = &[
    "Ahmad", "Fatimah", "Muhammad", "Aisyah", "Rizki", "Khadijah", "Fajar", "Zahra", "Hasan",
    "Nabila", "Umar", "Salsabila",
];
const LAST_NAMES: &[&str] = &["Hidayat", "Rahman", "Saputra", "Nurhaliza", "Pratama", "Maulana"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut per_grade: usize = 60;
    let mut db_path = String::from("./kopsis_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    per_grade = args[i + 1].parse().unwrap_or(60);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kopsis Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Students per grade (default: 60)");
                println!("  -d, --db <PATH>    Database file path (default: ./kopsis_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Kopsis Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Students per grade: {}", per_grade);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.templates().list(&TemplateFilter::default()).await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} templates", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Registering students...");
    let start = std::time::Instant::now();
    let mut registered = 0;

    for (grade_idx, grade) in GRADES.iter().enumerate() {
        for n in 0..per_grade {
            let seed = grade_idx * 1000 + n;
            let student = generate_student(grade, seed);
            if let Err(e) = db.students().insert(&student).await {
                eprintln!("Failed to insert {}: {}", student.registration_number, e);
                continue;
            }
            registered += 1;
        }
    }
    println!("✓ Registered {} students in {:?}", registered, start.elapsed());

    let actor = Actor::system();
    let template = db.catalog().create(&uniform_template(), &actor).await?;
    println!("✓ Created template {} ({} variants)", template.name, template.variants.len());

    let class_names: Vec<String> = SECTIONS.iter().map(|s| format!("Kelas 7{}", s)).collect();
    let outcome = db
        .generator()
        .generate(
            &template.id,
            &GenerateRequest {
                class_names,
                exclude_student_ids: Vec::new(),
            },
            &actor,
        )
        .await?;
    println!("✓ Generated {} liabilities for grade 7", outcome.created);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn generate_student(grade: &str, seed: usize) -> NewStudent {
    let first = FIRST_NAMES[seed % FIRST_NAMES.len()];
    let last = LAST_NAMES[(seed / FIRST_NAMES.len()) % LAST_NAMES.len()];

    NewStudent {
        registration_number: format!("NIS-{}{:04}", grade, seed % 1000),
        full_name: format!("{} {}", first, last),
        class_name: format!("Kelas {}{}", grade, SECTIONS[seed % SECTIONS.len()]),
        program: Some(PROGRAMS[seed % PROGRAMS.len()].to_string()),
        gender: Some(if seed % 2 == 0 { "L" } else { "P" }.to_string()),
        scholarship_percent: if seed % 7 == 0 { 50 } else { 0 },
    }
}

fn uniform_template() -> TemplateDraft {
    TemplateDraft {
        name: "Seragam 2026/2027".to_string(),
        description: Some("Seragam harian dan olahraga".to_string()),
        category: "Seragam".to_string(),
        academic_year: Some("2026/2027".to_string()),
        semester: Some("Ganjil".to_string()),
        due_date: None,
        apply_scholarship: true,
        allow_installment: true,
        min_installment: Some(50_000),
        max_installments: Some(3),
        is_recurring: false,
        recurring_type: None,
        is_active: true,
        variants: vec![
            VariantInput {
                class_names: "7".to_string(),
                programs: None,
                genders: None,
                amount: 450_000,
            },
            VariantInput {
                class_names: "*".to_string(),
                programs: None,
                genders: None,
                amount: 300_000,
            },
        ],
        items: vec![
            LineItem {
                name: "Baju Putih".to_string(),
                price: Some(150_000),
            },
            LineItem {
                name: "Celana/Rok".to_string(),
                price: Some(150_000),
            },
            LineItem {
                name: "Kaos Olahraga".to_string(),
                price: None,
            },
        ],
    }
}
