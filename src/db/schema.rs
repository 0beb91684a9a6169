use rusqlite::Connection;

use crate::error::Result;

/// Create tables and indexes if they don't exist yet.
///
/// Every generated identifier column is UNIQUE: the application checks for
/// collisions before inserting, and the constraint catches whatever slips
/// through between the check and the insert.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            price_cents INTEGER NOT NULL CHECK (price_cents > 0),
            usage_days INTEGER NOT NULL DEFAULT 0,
            url_code TEXT NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 1,
            purchase_count INTEGER NOT NULL DEFAULT 0,
            view_count INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_products_created_at ON products(created_at);

        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            order_number TEXT NOT NULL UNIQUE,
            payment_code TEXT NOT NULL UNIQUE,
            product_id TEXT REFERENCES products(id) ON DELETE SET NULL,
            product_name TEXT NOT NULL,
            product_price_cents INTEGER NOT NULL,
            product_usage_days INTEGER NOT NULL DEFAULT 0,
            total_amount_cents INTEGER NOT NULL,
            customer_service TEXT,
            buyer_nickname TEXT NOT NULL,
            buyer_name TEXT NOT NULL,
            buyer_phone TEXT NOT NULL,
            buyer_company TEXT NOT NULL,
            payment_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (payment_status IN ('pending', 'paid', 'canceled')),
            notes TEXT,
            payment_link TEXT UNIQUE,
            payment_link_issued_at INTEGER,
            payment_link_expires_at INTEGER,
            payment_link_used INTEGER NOT NULL DEFAULT 0,
            completed_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Tokens are "{payment_id}:{signature}" with an 8-char payment id;
        -- lookups go by payment id, so it must be unambiguous.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_payment_link_id
            ON orders(substr(payment_link, 1, 8));
        CREATE INDEX IF NOT EXISTS idx_orders_product_id ON orders(product_id);
        CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(payment_status);
        CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at);
        "#,
    )?;
    Ok(())
}
