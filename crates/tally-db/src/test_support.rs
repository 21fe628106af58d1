//! Fixtures shared by the unit tests of this crate.

use chrono::Utc;
use uuid::Uuid;

use crate::audit::{AuditMode, AuditRecorder};
use crate::pool::{Database, DbConfig};
use crate::repository::customer::generate_customer_id;
use crate::repository::product::generate_product_id;
use crate::service::{RequestContext, Services};
use tally_core::{Customer, EntityStatus, Product, Role, User};

pub async fn create_user(db: &Database, email: &str, role: Role) -> User {
    db.users()
        .create(email, "Test User", role, "password")
        .await
        .unwrap()
}

pub async fn insert_product(db: &Database, code: &str) -> Product {
    insert_product_with(db, code, 0, 0).await
}

pub async fn insert_product_with(db: &Database, code: &str, stock: i64, critical: i64) -> Product {
    let now = Utc::now();
    let product = Product {
        id: generate_product_id(),
        code: code.to_string(),
        name: format!("Product {code}"),
        brand: None,
        category: "General".to_string(),
        unit: "pcs".to_string(),
        unit_cost_cents: 100,
        selling_price_cents: 150,
        current_stock: 0,
        critical_stock_level: critical,
        status: EntityStatus::Active,
        created_by: None,
        created_at: now,
        updated_at: now,
    };

    let (product, _) = db.ledger().create_product(product, stock).await.unwrap();
    product
}

pub async fn insert_customer(db: &Database, code: &str, sales_rep: Option<&str>) -> Customer {
    let now = Utc::now();
    let customer = Customer {
        id: generate_customer_id(),
        code: code.to_string(),
        name: format!("Customer {code}"),
        contact_person: None,
        email: None,
        phone: None,
        address: None,
        city: None,
        region: None,
        country: None,
        sales_rep: sales_rep.map(str::to_string),
        payment_terms_limit: 30,
        balance_risk_limit_cents: 0,
        current_balance_cents: 0,
        status: EntityStatus::Active,
        created_by: None,
        created_at: now,
        updated_at: now,
    };

    db.ledger().create_customer(customer).await.unwrap()
}

/// Services over a fresh in-memory database, auditing inline.
pub async fn services() -> (Services, Database) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let audit = AuditRecorder::new(db.audit_logs(), AuditMode::Inline);
    (Services::new(db.clone(), audit), db)
}

/// A request context for a new user with `role`.
pub async fn context(db: &Database, role: Role) -> RequestContext {
    let email = format!("{}-{}@example.com", role, Uuid::new_v4().simple());
    let user = create_user(db, &email, role).await;
    RequestContext::new(user, "127.0.0.1")
}
