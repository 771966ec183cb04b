/// Orders Module
///
/// Order listing, lookup and status updates. Placing an order inserts the
/// order, its items and the stock decrements inside one transaction.

use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{as_integer, new_id, now_timestamp, Filter};
use crate::core::db::{self, ConnectionRegistry, Row};
use crate::core::{GatewayError, Result};

/// Optional order listing filters, AND-combined
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OrderFilter {
    pub customer_id: Option<String>,
    pub status: Option<String>,
}

/// An order together with its line items
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedOrder {
    pub order: Row,
    pub items: Vec<Row>,
}

pub fn list_orders(conn: &Connection, filter: &OrderFilter) -> Result<Vec<Row>> {
    let mut clauses = Filter::new();
    if let Some(customer_id) = &filter.customer_id {
        clauses.push("customer_id = ?", customer_id.as_str());
    }
    if let Some(status) = &filter.status {
        clauses.push("status = ?", status.as_str());
    }
    db::select(conn, "orders", "*", clauses.condition().as_deref(), clauses.params())
}

/// Places an order atomically on the registry's active database.
///
/// Either the order, every item and every stock decrement are stored, or
/// nothing is.
pub fn create_order(registry: &ConnectionRegistry, order: Row, items: Vec<Row>) -> Result<PlacedOrder> {
    registry.transaction(|tx| place_order(tx, order, items))
}

/// The steps of [`create_order`]; callers must supply the transaction.
pub fn place_order(conn: &Connection, mut order: Row, items: Vec<Row>) -> Result<PlacedOrder> {
    let now = now_timestamp();
    order.entry("order_id").or_insert_with(|| json!(new_id()));
    order.entry("created_at").or_insert_with(|| json!(now));
    order.entry("updated_at").or_insert_with(|| json!(now));
    order.entry("status").or_insert_with(|| json!("pending"));
    let order_id = order["order_id"].clone();

    db::insert(conn, "orders", &order)?;

    let mut stored = Vec::with_capacity(items.len());
    for mut item in items {
        item.entry("item_id").or_insert_with(|| json!(new_id()));
        item.insert("order_id".to_string(), order_id.clone());

        let (product_id, quantity) = match (item.get("product_id"), item.get("quantity").and_then(as_integer)) {
            (Some(product_id), Some(quantity)) => (product_id.clone(), quantity),
            _ => {
                return Err(GatewayError::InvalidRequest(
                    "Each order item requires product_id and quantity".to_string(),
                ))
            }
        };
        let label = display_id(&product_id);

        let stock = db::select(
            conn,
            "products",
            "stock_quantity",
            Some("product_id = ?"),
            std::slice::from_ref(&product_id),
        )?;
        let current = match stock.first() {
            Some(row) => row.get("stock_quantity").and_then(as_integer).unwrap_or(0),
            None => {
                return Err(GatewayError::Transaction(format!(
                    "Product with ID {} not found",
                    label
                )))
            }
        };
        let remaining = current - quantity;
        if remaining < 0 {
            warn!("Rejecting order {}: product {} has {} in stock", display_id(&order_id), label, current);
            return Err(GatewayError::Transaction(format!(
                "Insufficient stock for product {}",
                label
            )));
        }

        db::insert(conn, "order_items", &item)?;
        let mut change = Row::new();
        change.insert("stock_quantity".to_string(), json!(remaining));
        db::update(conn, "products", &change, "product_id = ?", &[product_id])?;

        stored.push(item);
    }

    info!("Placed order {} with {} item(s)", display_id(&order_id), stored.len());
    Ok(PlacedOrder { order, items: stored })
}

fn display_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn order_not_found(order_id: &str) -> GatewayError {
    GatewayError::NotFound(format!("Order with ID {} not found", order_id))
}

fn order_items(conn: &Connection, order_id: &Value) -> Result<Vec<Row>> {
    db::select(
        conn,
        "order_items",
        "*",
        Some("order_id = ?"),
        std::slice::from_ref(order_id),
    )
}

pub fn get_order(conn: &Connection, order_id: &str) -> Result<PlacedOrder> {
    let mut rows = db::select(conn, "orders", "*", Some("order_id = ?"), &[json!(order_id)])?;
    if rows.is_empty() {
        return Err(order_not_found(order_id));
    }
    let order = rows.swap_remove(0);
    let items = order_items(conn, &json!(order_id))?;
    Ok(PlacedOrder { order, items })
}

/// Applies `changes` to an order and refreshes `updated_at`
pub fn update_order(conn: &Connection, order_id: &str, mut changes: Row) -> Result<usize> {
    let key = [json!(order_id)];
    let found = db::select(conn, "orders", "order_id", Some("order_id = ?"), &key)?;
    if found.is_empty() {
        return Err(order_not_found(order_id));
    }
    changes.insert("updated_at".to_string(), json!(now_timestamp()));
    db::update(conn, "orders", &changes, "order_id = ?", &key)
}

/// A customer's orders, each with its line items under `items`
pub fn customer_orders(conn: &Connection, customer_id: &str) -> Result<Vec<Row>> {
    let mut orders = db::select(conn, "orders", "*", Some("customer_id = ?"), &[json!(customer_id)])?;
    for order in &mut orders {
        let id = order.get("order_id").cloned().unwrap_or(Value::Null);
        let items = order_items(conn, &id)?;
        order.insert(
            "items".to_string(),
            Value::Array(items.into_iter().map(Value::Object).collect()),
        );
    }
    Ok(orders)
}
