//! # Seed Data Generator
//!
//! Populates an empty database with demo users, products and customers for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed ./tally_dev.db
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Data
//! - One user per role, all with the password `changeme`
//! - Products across a handful of categories, each with an opening stock
//! - Customers owned by the demo sales rep, with a few sales and payments
//!
//! Every stock level and balance goes through the ledger, so the seeded
//! history reconciles exactly like production data.

use chrono::Utc;
use std::env;
use tally_core::input::{BalanceEntry, StockEntry};
use tally_core::{
    Customer, CustomerTransactionType, EntityStatus, InventoryTransactionType, Money, Product,
    Role,
};
use tally_db::repository::customer::generate_customer_id;
use tally_db::repository::product::generate_product_id;
use tally_db::{Database, DbConfig};

const DEMO_PASSWORD: &str = "changeme";

const USERS: &[(&str, &str, Role)] = &[
    ("admin@tally.local", "Admin", Role::Admin),
    ("manager@tally.local", "Store Manager", Role::Manager),
    ("rep@tally.local", "Sales Rep", Role::SalesRep),
    ("viewer@tally.local", "Auditor", Role::Viewer),
];

/// (category, unit, names)
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "Hardware",
        "pcs",
        &["Hex Bolt M8", "Wood Screw 40mm", "Hinge 75mm", "Padlock 50mm"],
    ),
    (
        "Paint",
        "can",
        &["Primer White 4L", "Gloss Black 1L", "Wood Stain Oak 1L"],
    ),
    (
        "Electrical",
        "pcs",
        &["Wall Socket", "LED Bulb 9W", "Extension Cord 5m", "Cable Tie Pack"],
    ),
    ("Garden", "bag", &["Potting Soil 20L", "Lawn Seed 1kg", "Bark Mulch 50L"]),
];

const CUSTOMERS: &[(&str, &str, i64)] = &[
    ("Northside Builders", "Lisbon", 500_000),
    ("Harbour Joinery", "Porto", 250_000),
    ("Greenway Landscaping", "Faro", 100_000),
    ("Corner Hardware Co.", "Braga", 150_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("===========================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.users().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} users", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Users
    let mut admin_id = String::new();
    let mut rep_id = String::new();
    for (email, name, role) in USERS {
        let user = db.users().create(email, name, *role, DEMO_PASSWORD).await?;
        match role {
            Role::Admin => admin_id = user.id.clone(),
            Role::SalesRep => rep_id = user.id.clone(),
            _ => {}
        }
        println!("  {:<10} {}", role.as_str(), user.email);
    }
    println!("✓ Created {} users (password: {})", USERS.len(), DEMO_PASSWORD);

    // Products
    let ledger = db.ledger();
    let mut products = Vec::new();
    for (category, unit, names) in CATEGORIES {
        for name in names.iter() {
            let seed = products.len();
            let product = demo_product(seed, category, unit, name, &admin_id);
            let opening = 5 + ((seed * 13) % 60) as i64;
            let (product, _) = ledger.create_product(product, opening).await?;
            products.push(product);
        }
    }
    println!("✓ Created {} products", products.len());

    // Sell some stock so a few products land under their critical level.
    for product in products.iter().step_by(3) {
        let entry = StockEntry {
            transaction_type: InventoryTransactionType::StockOut,
            quantity: product.current_stock - product.critical_stock_level / 2,
            reference_number: Some("SEED".to_string()),
            notes: None,
        };
        if entry.quantity > 0 {
            ledger
                .apply_inventory_transaction(&product.id, &entry, Some(&admin_id))
                .await?;
        }
    }

    // Customers
    for (seed, (name, city, risk_limit_cents)) in CUSTOMERS.iter().enumerate() {
        let customer = demo_customer(seed, name, city, *risk_limit_cents, &rep_id);
        let customer = ledger.create_customer(customer).await?;

        let sale = BalanceEntry {
            transaction_type: CustomerTransactionType::Sale,
            amount: Money::from_cents(*risk_limit_cents / 2 + (seed as i64) * 90_000),
            reference_number: Some(format!("INV-{:04}", seed + 1)),
            notes: None,
        };
        ledger
            .apply_customer_transaction(&customer.id, &sale, Some(&rep_id), None)
            .await?;

        if seed % 2 == 0 {
            let payment = BalanceEntry {
                transaction_type: CustomerTransactionType::Payment,
                amount: Money::from_cents(*risk_limit_cents / 5),
                reference_number: None,
                notes: Some("Bank transfer".to_string()),
            };
            ledger
                .apply_customer_transaction(&customer.id, &payment, Some(&rep_id), None)
                .await?;
        }
    }
    println!("✓ Created {} customers", CUSTOMERS.len());

    let low_stock = db.products().low_stock().await?;
    let at_risk = db.customers().at_risk(None).await?;
    println!();
    println!("  Low stock products:  {}", low_stock.len());
    println!("  At-risk customers:   {}", at_risk.len());

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Builds a product with deterministic demo pricing.
fn demo_product(seed: usize, category: &str, unit: &str, name: &str, admin_id: &str) -> Product {
    let now = Utc::now();

    // Cost: 1.99 - 9.99, price at a 30-50% margin
    let unit_cost_cents = 199 + ((seed * 37) % 800) as i64;
    let margin_pct = 130 + (seed % 21) as i64;

    Product {
        id: generate_product_id(),
        code: format!("PRD{:06}", seed + 1),
        name: name.to_string(),
        brand: None,
        category: category.to_string(),
        unit: unit.to_string(),
        unit_cost_cents,
        selling_price_cents: unit_cost_cents * margin_pct / 100,
        current_stock: 0,
        critical_stock_level: 10,
        status: EntityStatus::Active,
        created_by: Some(admin_id.to_string()),
        created_at: now,
        updated_at: now,
    }
}

fn demo_customer(
    seed: usize,
    name: &str,
    city: &str,
    balance_risk_limit_cents: i64,
    rep_id: &str,
) -> Customer {
    let now = Utc::now();

    Customer {
        id: generate_customer_id(),
        code: format!("CUS{:06}", seed + 1),
        name: name.to_string(),
        contact_person: None,
        email: None,
        phone: None,
        address: None,
        city: Some(city.to_string()),
        region: None,
        country: Some("Portugal".to_string()),
        sales_rep: Some(rep_id.to_string()),
        payment_terms_limit: 30,
        balance_risk_limit_cents,
        current_balance_cents: 0,
        status: EntityStatus::Active,
        created_by: Some(rep_id.to_string()),
        created_at: now,
        updated_at: now,
    }
}
