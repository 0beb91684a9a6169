use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior, params, types::Value};
use uuid::Uuid;

use crate::codes::{self, CodeFormat, MAX_ATTEMPTS};
use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{ORDER_COLS, PRODUCT_COLS, query_all, query_one};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// True for a violated UNIQUE constraint (not primary key or CHECK).
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Run an insert that carries freshly generated codes, regenerating them
/// whenever the store rejects one as a duplicate. The existence check in the
/// generator is only advisory; this is what makes uniqueness hold under
/// concurrent inserts.
fn insert_with_fresh_codes<T>(mut attempt: impl FnMut() -> Result<T>) -> Result<T> {
    for _ in 0..MAX_ATTEMPTS {
        match attempt() {
            Err(AppError::Database(ref e)) if is_unique_violation(e) => {
                tracing::warn!("generated code collided on insert, regenerating");
            }
            other => return other,
        }
    }
    Err(AppError::GenerationExhausted {
        attempts: MAX_ATTEMPTS,
    })
}

fn value_exists(conn: &Connection, sql: &str, value: &str) -> Result<bool> {
    let exists: bool = conn.query_row(sql, params![value], |row| row.get(0))?;
    Ok(exists)
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query for efficiency.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Set a column to an explicit value (including NULL).
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.fields.push((column, v.into())),
            None => self.fields.push((column, Value::Null)),
        }
        self
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

/// Collects `WHERE` clauses and their bound values for list queries.
#[derive(Default)]
struct Filters {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Filters {
    fn push(&mut self, clause: impl Into<String>, value: impl Into<Value>) {
        self.clauses.push(clause.into());
        self.values.push(value.into());
    }

    /// `LIKE` over several columns against one search term.
    fn push_search(&mut self, columns: &[&str], term: &str) {
        let pattern = format!("%{}%", escape_like(term));
        let ors: Vec<String> = columns
            .iter()
            .map(|col| format!("{} LIKE ? ESCAPE '\\'", col))
            .collect();
        self.clauses.push(format!("({})", ors.join(" OR ")));
        for _ in columns {
            self.values.push(pattern.clone().into());
        }
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// ============ Products ============

pub fn url_code_exists(conn: &Connection, url_code: &str) -> Result<bool> {
    value_exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM products WHERE url_code = ?1)",
        url_code,
    )
}

/// Create a product with a freshly generated, checksummed URL code.
pub fn create_product(conn: &Connection, input: &CreateProduct) -> Result<Product> {
    insert_with_fresh_codes(|| {
        let id = gen_id();
        let now = now();
        let url_code = codes::generate_unique_code(CodeFormat::PRODUCT_URL, |code| {
            url_code_exists(conn, code).map(|exists| !exists)
        })?;
        let name = input.name.trim().to_string();

        conn.execute(
            "INSERT INTO products (id, name, price_cents, usage_days, url_code, is_active, purchase_count, view_count, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?8, ?8)",
            params![
                &id,
                &name,
                input.price_cents,
                input.usage_days,
                &url_code,
                input.is_active,
                &input.notes,
                now
            ],
        )?;

        Ok(Product {
            id,
            name,
            price_cents: input.price_cents,
            usage_days: input.usage_days,
            url_code,
            is_active: input.is_active,
            purchase_count: 0,
            view_count: 0,
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        })
    })
}

pub fn get_product_by_id(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        [id],
    )
}

pub fn get_product_by_url_code(conn: &Connection, url_code: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE url_code = ?1", PRODUCT_COLS),
        [url_code],
    )
}

#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    pub active: Option<bool>,
    /// Substring match on the product name
    pub search: Option<String>,
}

pub fn list_products_paginated(
    conn: &Connection,
    filter: &ProductFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Product>, i64)> {
    let mut filters = Filters::default();
    if let Some(active) = filter.active {
        filters.push("is_active = ?", active);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        filters.push_search(&["name"], search.trim());
    }
    let where_sql = filters.where_sql();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM products {}", where_sql),
        rusqlite::params_from_iter(filters.values.iter()),
        |row| row.get(0),
    )?;

    let mut values = filters.values;
    values.push(limit.into());
    values.push(offset.into());
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM products {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            PRODUCT_COLS, where_sql
        ),
        rusqlite::params_from_iter(values),
    )?;

    Ok((items, total))
}

/// Apply a partial update. Counters and the URL code are never touched here.
pub fn update_product(conn: &Connection, id: &str, input: &UpdateProduct) -> Result<bool> {
    UpdateBuilder::new("products", id)
        .with_updated_at()
        .set_opt("name", input.name.as_ref().map(|n| n.trim().to_string()))
        .set_opt("price_cents", input.price_cents)
        .set_opt("usage_days", input.usage_days)
        .set_opt("is_active", input.is_active)
        .set_opt(
            "notes",
            input
                .notes
                .clone()
                .map(|notes| notes.map(Value::from).unwrap_or(Value::Null)),
        )
        .execute(conn)
}

/// Delete a product. Orders keep their snapshot and lose the reference.
pub fn delete_product(conn: &mut Connection, id: &str) -> Result<bool> {
    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE orders SET product_id = NULL WHERE product_id = ?1",
        params![id],
    )?;
    let deleted = tx.execute("DELETE FROM products WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

/// Bump the view counter without touching `updated_at`.
pub fn increment_view_count(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE products SET view_count = view_count + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

// ============ Orders ============

pub fn order_number_exists(conn: &Connection, order_number: &str) -> Result<bool> {
    value_exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM orders WHERE order_number = ?1)",
        order_number,
    )
}

pub fn payment_code_exists(conn: &Connection, payment_code: &str) -> Result<bool> {
    value_exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM orders WHERE payment_code = ?1)",
        payment_code,
    )
}

/// Mint an order number that no order currently uses.
pub fn generate_order_number(conn: &Connection) -> Result<String> {
    codes::generate_unique_code(CodeFormat::ORDER_NUMBER, |code| {
        order_number_exists(conn, code).map(|exists| !exists)
    })
}

/// Mint a payment code that no order currently uses.
pub fn generate_payment_code(conn: &Connection) -> Result<String> {
    codes::generate_unique_code(CodeFormat::PAYMENT_CODE, |code| {
        payment_code_exists(conn, code).map(|exists| !exists)
    })
}

/// Create a pending order for `product`, snapshotting its name, price and
/// usage days and minting a unique order number and payment code.
pub fn create_order(conn: &Connection, product: &Product, input: &CreateOrder) -> Result<Order> {
    let total_amount_cents = input.total_amount_cents.unwrap_or(product.price_cents);
    let buyer_nickname = input
        .buyer_nickname
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_BUYER_NICKNAME)
        .to_string();

    insert_with_fresh_codes(|| {
        let id = gen_id();
        let now = now();
        let order_number = generate_order_number(conn)?;
        let payment_code = generate_payment_code(conn)?;

        conn.execute(
            "INSERT INTO orders (id, order_number, payment_code, product_id, product_name, product_price_cents, product_usage_days, total_amount_cents, customer_service, buyer_nickname, buyer_name, buyer_phone, buyer_company, payment_status, notes, payment_link_used, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 'pending', ?14, 0, ?15, ?15)",
            params![
                &id,
                &order_number,
                &payment_code,
                &product.id,
                &product.name,
                product.price_cents,
                product.usage_days,
                total_amount_cents,
                &input.customer_service,
                &buyer_nickname,
                input.buyer_name.trim(),
                input.buyer_phone.trim(),
                input.buyer_company.trim(),
                &input.notes,
                now
            ],
        )?;

        Ok(Order {
            id,
            order_number,
            payment_code,
            product_id: Some(product.id.clone()),
            product_name: product.name.clone(),
            product_price_cents: product.price_cents,
            product_usage_days: product.usage_days,
            total_amount_cents,
            customer_service: input.customer_service.clone(),
            buyer_nickname: buyer_nickname.clone(),
            buyer_name: input.buyer_name.trim().to_string(),
            buyer_phone: input.buyer_phone.trim().to_string(),
            buyer_company: input.buyer_company.trim().to_string(),
            payment_status: PaymentStatus::Pending,
            notes: input.notes.clone(),
            payment_link: None,
            payment_link_issued_at: None,
            payment_link_expires_at: None,
            payment_link_used: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    })
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        [id],
    )
}

pub fn get_order_by_number(conn: &Connection, order_number: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE order_number = ?1", ORDER_COLS),
        [order_number],
    )
}

#[derive(Debug, Default, Clone)]
pub struct OrderFilter {
    pub status: Option<PaymentStatus>,
    pub customer_service: Option<String>,
    /// Substring match on order number, buyer name, phone or company
    pub search: Option<String>,
}

pub fn list_orders_paginated(
    conn: &Connection,
    filter: &OrderFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Order>, i64)> {
    let mut filters = Filters::default();
    if let Some(status) = filter.status {
        filters.push("payment_status = ?", status.as_ref().to_string());
    }
    if let Some(ref cs) = filter.customer_service {
        filters.push("customer_service = ?", cs.clone());
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        filters.push_search(
            &["order_number", "buyer_name", "buyer_phone", "buyer_company"],
            search.trim(),
        );
    }
    let where_sql = filters.where_sql();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM orders {}", where_sql),
        rusqlite::params_from_iter(filters.values.iter()),
        |row| row.get(0),
    )?;

    let mut values = filters.values;
    values.push(limit.into());
    values.push(offset.into());
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM orders {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            ORDER_COLS, where_sql
        ),
        rusqlite::params_from_iter(values),
    )?;

    Ok((items, total))
}

/// Store a freshly issued link on a pending order, resetting the used flag.
/// Only the link columns (and `order_number`, when it was missing) change.
/// Returns false when the order is gone or no longer pending.
pub fn set_payment_link(
    conn: &Connection,
    order_id: &str,
    order_number: &str,
    token: &str,
    issued_at: i64,
    expires_at: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders
         SET order_number = ?1, payment_link = ?2, payment_link_issued_at = ?3,
             payment_link_expires_at = ?4, payment_link_used = 0
         WHERE id = ?5 AND payment_status = 'pending'",
        params![order_number, token, issued_at, expires_at, order_id],
    )?;
    Ok(affected > 0)
}

/// Find the pending order whose live link carries `payment_id`.
///
/// Matches on the payment id half of the stored token only; the caller must
/// still check the signature. Both the link expiry and the order's age are
/// bounded by `now`.
pub fn find_linked_pending_order(
    conn: &Connection,
    payment_id: &str,
    now: i64,
    max_order_age_secs: i64,
) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM orders
             WHERE substr(payment_link, 1, 8) = ?1
               AND substr(payment_link, 9, 1) = ':'
               AND payment_link_expires_at > ?2
               AND created_at > ?3
               AND payment_status = 'pending'
             ORDER BY created_at DESC
             LIMIT 1",
            ORDER_COLS
        ),
        params![payment_id, now, now - max_order_age_secs],
    )
}

/// Flag an order's link as consumed without changing its status.
pub fn mark_payment_link_used(conn: &Connection, order_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET payment_link_used = 1, updated_at = ?1
         WHERE id = ?2 AND payment_link IS NOT NULL AND payment_link_used = 0",
        params![now(), order_id],
    )?;
    Ok(affected > 0)
}

/// Move a pending order to `paid` and count the purchase on its product.
///
/// The status change is a compare-and-swap on `payment_status = 'pending'`,
/// so only the first caller gets `true` and the counter moves exactly once.
/// With `consume_link` the link must also be unused and is marked used in
/// the same statement. Call inside a transaction so the counter update
/// cannot be separated from the status change.
pub(crate) fn mark_order_paid(conn: &Connection, order_id: &str, consume_link: bool) -> Result<bool> {
    let now = now();
    let affected = if consume_link {
        conn.execute(
            "UPDATE orders
             SET payment_status = 'paid', payment_link_used = 1, completed_at = ?1, updated_at = ?1
             WHERE id = ?2 AND payment_status = 'pending' AND payment_link_used = 0",
            params![now, order_id],
        )?
    } else {
        conn.execute(
            "UPDATE orders
             SET payment_status = 'paid', completed_at = ?1, updated_at = ?1
             WHERE id = ?2 AND payment_status = 'pending'",
            params![now, order_id],
        )?
    };

    if affected == 0 {
        return Ok(false);
    }

    conn.execute(
        "UPDATE products SET purchase_count = purchase_count + 1
         WHERE id = (SELECT product_id FROM orders WHERE id = ?1)",
        params![order_id],
    )?;
    Ok(true)
}

/// Mark an order paid outside the link flow (e.g. confirmed manually).
///
/// Returns `Ok(false)` if the order was not pending (already paid, canceled
/// or missing).
pub fn complete_payment(conn: &mut Connection, order_id: &str) -> Result<bool> {
    // IMMEDIATE takes the write lock up front so concurrent completions
    // serialize instead of both reading 'pending'.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let transitioned = mark_order_paid(&tx, order_id, false)?;
    tx.commit()?;
    Ok(transitioned)
}

/// `pending -> canceled`. Returns false if the order was not pending.
pub fn cancel_order(conn: &Connection, order_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET payment_status = 'canceled', updated_at = ?1
         WHERE id = ?2 AND payment_status = 'pending'",
        params![now(), order_id],
    )?;
    Ok(affected > 0)
}

/// Replace an order's notes or assignee. Status, codes and link fields are
/// not editable through this path.
pub fn update_order_details(
    conn: &Connection,
    order_id: &str,
    customer_service: Option<Option<String>>,
    notes: Option<Option<String>>,
) -> Result<bool> {
    let mut builder = UpdateBuilder::new("orders", order_id).with_updated_at();
    if let Some(cs) = customer_service {
        builder = builder.set_nullable("customer_service", cs);
    }
    if let Some(notes) = notes {
        builder = builder.set_nullable("notes", notes);
    }
    builder.execute(conn)
}
