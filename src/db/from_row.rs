use rusqlite::{Connection, OptionalExtension, Params, Row, types::Type};

use crate::error::Result;
use crate::models::{Order, PaymentStatus, Product};

pub const PRODUCT_COLS: &str = "id, name, price_cents, usage_days, url_code, is_active, purchase_count, view_count, notes, created_at, updated_at";

pub const ORDER_COLS: &str = "id, order_number, payment_code, product_id, product_name, product_price_cents, product_usage_days, total_amount_cents, customer_service, buyer_nickname, buyer_name, buyer_phone, buyer_company, payment_status, notes, payment_link, payment_link_issued_at, payment_link_expires_at, payment_link_used, completed_at, created_at, updated_at";

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            price_cents: row.get(2)?,
            usage_days: row.get(3)?,
            url_code: row.get(4)?,
            is_active: row.get::<_, i32>(5)? != 0,
            purchase_count: row.get(6)?,
            view_count: row.get(7)?,
            notes: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status: String = row.get(13)?;
        let payment_status = status.parse::<PaymentStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(13, Type::Text, Box::new(e))
        })?;

        Ok(Order {
            id: row.get(0)?,
            order_number: row.get(1)?,
            payment_code: row.get(2)?,
            product_id: row.get(3)?,
            product_name: row.get(4)?,
            product_price_cents: row.get(5)?,
            product_usage_days: row.get(6)?,
            total_amount_cents: row.get(7)?,
            customer_service: row.get(8)?,
            buyer_nickname: row.get(9)?,
            buyer_name: row.get(10)?,
            buyer_phone: row.get(11)?,
            buyer_company: row.get(12)?,
            payment_status,
            notes: row.get(14)?,
            payment_link: row.get(15)?,
            payment_link_issued_at: row.get(16)?,
            payment_link_expires_at: row.get(17)?,
            payment_link_used: row.get::<_, i32>(18)? != 0,
            completed_at: row.get(19)?,
            created_at: row.get(20)?,
            updated_at: row.get(21)?,
        })
    }
}

pub fn query_one<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Option<T>> {
    let row = conn.query_row(sql, params, |row| T::from_row(row)).optional()?;
    Ok(row)
}

pub fn query_all<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
