//! Shared fixtures for integration tests.
#![allow(dead_code)]

use axum::Router;
use rusqlite::Connection;
use tempfile::TempDir;

pub use xfb_pay::config::PaymentSecret;
pub use xfb_pay::db::{self, AppState, DbPool, queries};
pub use xfb_pay::models::*;

pub const TEST_SECRET: &str = "test-key";

pub fn test_secret() -> PaymentSecret {
    PaymentSecret::new(TEST_SECRET).expect("valid secret")
}

/// Fresh single-connection in-memory database with the schema applied.
pub fn create_test_pool() -> DbPool {
    db::create_pool(":memory:").expect("Failed to create test pool")
}

/// File-backed database that supports several concurrent connections.
/// Keep the returned `TempDir` alive for as long as the pool is used.
pub fn create_file_pool() -> (DbPool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("test.db");
    let pool = db::create_pool(path.to_str().expect("utf-8 path")).expect("Failed to create pool");
    (pool, dir)
}

pub fn create_test_app_state() -> AppState {
    AppState {
        db: create_test_pool(),
        base_url: "http://localhost:3000".to_string(),
        payment_secret: test_secret(),
    }
}

pub fn test_app(state: AppState) -> Router {
    xfb_pay::app(state)
}

pub fn create_test_product(conn: &Connection, name: &str, price_cents: i64) -> Product {
    queries::create_product(
        conn,
        &CreateProduct {
            name: name.to_string(),
            price_cents,
            usage_days: 365,
            is_active: true,
            notes: None,
        },
    )
    .expect("Failed to create test product")
}

pub fn order_input(product_id: &str) -> CreateOrder {
    CreateOrder {
        product_id: product_id.to_string(),
        total_amount_cents: None,
        customer_service: Some("alice".to_string()),
        buyer_nickname: None,
        buyer_name: "Wang".to_string(),
        buyer_phone: "13800138000".to_string(),
        buyer_company: "Acme Law".to_string(),
        notes: None,
    }
}

pub fn create_test_order(conn: &Connection, product: &Product) -> Order {
    queries::create_order(conn, product, &order_input(&product.id))
        .expect("Failed to create test order")
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
