/// Statistics Module
///
/// Aggregate product and order figures computed with plain SQL over the
/// commerce tables.

use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

use super::query_rows;
use crate::core::db::Row;
use crate::core::Result;

const TOP_SELLERS_SQL: &str = "SELECT p.product_id, p.name, p.price, SUM(oi.quantity) AS total_sold
     FROM products p
     JOIN order_items oi ON p.product_id = oi.product_id
     GROUP BY p.product_id
     ORDER BY total_sold DESC
     LIMIT 5";

const RECENT_ORDERS_SQL: &str = "SELECT date(created_at) AS order_date, COUNT(*) AS count, SUM(total_amount) AS total_sales
     FROM orders
     WHERE created_at >= date('now', '-7 days')
     GROUP BY date(created_at)
     ORDER BY order_date";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductStats {
    pub total_products: i64,
    pub by_category: Vec<Row>,
    /// `null` when there are no priced products
    pub avg_price: Value,
    /// Up to five products with the most units ordered
    pub top_sellers: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderStats {
    pub total_orders: i64,
    pub by_status: Vec<Row>,
    pub avg_value: Value,
    /// Per-day order count and sales over the last seven days
    pub recent_orders: Vec<Row>,
}

/// First column of the first row, or `Null`
fn scalar(conn: &Connection, sql: &str) -> Result<Value> {
    let rows = query_rows(conn, sql, &[])?;
    Ok(rows
        .into_iter()
        .next()
        .and_then(|row| row.into_iter().next().map(|(_, v)| v))
        .unwrap_or(Value::Null))
}

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(scalar(conn, sql)?.as_i64().unwrap_or(0))
}

pub fn product_stats(conn: &Connection) -> Result<ProductStats> {
    Ok(ProductStats {
        total_products: count(conn, "SELECT COUNT(*) AS total_products FROM products")?,
        by_category: query_rows(
            conn,
            "SELECT category, COUNT(*) AS count FROM products GROUP BY category",
            &[],
        )?,
        avg_price: scalar(conn, "SELECT AVG(price) AS avg_price FROM products")?,
        top_sellers: query_rows(conn, TOP_SELLERS_SQL, &[])?,
    })
}

pub fn order_stats(conn: &Connection) -> Result<OrderStats> {
    Ok(OrderStats {
        total_orders: count(conn, "SELECT COUNT(*) AS total_orders FROM orders")?,
        by_status: query_rows(
            conn,
            "SELECT status, COUNT(*) AS count FROM orders GROUP BY status",
            &[],
        )?,
        avg_value: scalar(conn, "SELECT AVG(total_amount) AS avg_value FROM orders")?,
        recent_orders: query_rows(conn, RECENT_ORDERS_SQL, &[])?,
    })
}
