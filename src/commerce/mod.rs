/// Commerce Module
///
/// In-process composite operations for the e-commerce tables (`products`,
/// `reviews`, `orders`, `order_items`). They are built from the same row
/// functions remote callers use, but run next to the engine, so multi-step
/// work such as order creation can use the registry's transaction helper.
///
/// The tables themselves are created by callers; these helpers only assume
/// the column names they read and filter on.

pub mod orders;
pub mod products;
pub mod stats;

pub use orders::*;
pub use products::*;
pub use stats::*;

use chrono::Local;
use rusqlite::Connection;
use serde_json::Value;

use crate::core::db::{self, ExecOutcome, Row};
use crate::core::Result;

/// Current local time as `YYYY-MM-DD HH:MM:SS`
pub fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Fresh random identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Runs a read-only statement through the raw executor and returns its rows
pub(crate) fn query_rows(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
    match db::execute(conn, sql, params)? {
        ExecOutcome::Rows(rows) => Ok(rows),
        ExecOutcome::Affected(_) => Ok(Vec::new()),
    }
}

/// Reads an integer the way loosely-typed clients send it: an integer, a
/// float (truncated) or a numeric string.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// AND-joined filter clauses with their positional parameters
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Filter {
    clauses: Vec<&'static str>,
    params: Vec<Value>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    /// Adds `clause` (with one `?`) bound to `value`
    pub fn push(&mut self, clause: &'static str, value: impl Into<Value>) -> &mut Self {
        self.clauses.push(clause);
        self.params.push(value.into());
        self
    }

    /// The combined condition, `None` when no clause was added
    pub fn condition(&self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            Some(self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Creates the commerce tables used by unit tests
#[cfg(test)]
pub(crate) fn create_test_tables(conn: &Connection) {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        CREATE TABLE products (
            product_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            category TEXT,
            seller_id TEXT,
            price REAL,
            stock_quantity INTEGER DEFAULT 0,
            created_at TEXT,
            updated_at TEXT
        );
        CREATE TABLE reviews (
            review_id TEXT PRIMARY KEY,
            product_id TEXT REFERENCES products(product_id),
            rating INTEGER,
            comment TEXT,
            created_at TEXT
        );
        CREATE TABLE orders (
            order_id TEXT PRIMARY KEY,
            customer_id TEXT,
            status TEXT,
            total_amount REAL,
            created_at TEXT,
            updated_at TEXT
        );
        CREATE TABLE order_items (
            item_id TEXT PRIMARY KEY,
            order_id TEXT REFERENCES orders(order_id),
            product_id TEXT REFERENCES products(product_id),
            quantity INTEGER,
            price REAL
        );
    ",
    )
    .unwrap();
}
