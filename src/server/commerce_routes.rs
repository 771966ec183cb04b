//! Commerce HTTP Routes
//!
//! Products, reviews, orders, statistics and search over the commerce tables
//! of the active database.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::response::{parse_body, ApiError, ApiResponse, ApiResult};
use super::GatewayState;
use crate::commerce::{self, OrderFilter, ProductFilter};
use crate::core::db::Row;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub seller_id: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

impl ProductQuery {
    fn into_filter(self) -> Result<ProductFilter, ApiError> {
        Ok(ProductFilter {
            category: non_empty(self.category),
            seller_id: non_empty(self.seller_id),
            min_price: parse_price("min_price", self.min_price)?,
            max_price: parse_price("max_price", self.max_price)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub customer_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_price(field: &str, value: Option<String>) -> Result<Option<f64>, ApiError> {
    match non_empty(value) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("Invalid {}: {}", field, raw))),
    }
}

/// Decodes a JSON object body, answering 400 with `missing` when it is
/// absent or empty.
fn required_object(body: &Bytes, missing: &str) -> Result<Row, ApiError> {
    let row: Option<Row> = parse_body(body)?;
    row.filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::bad_request(missing))
}

/// Create the commerce routes
pub fn commerce_routes(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/products", get(list_products_handler).post(create_product_handler))
        .route(
            "/products/:id",
            get(get_product_handler)
                .put(update_product_handler)
                .delete(delete_product_handler),
        )
        .route(
            "/products/:id/reviews",
            get(list_reviews_handler).post(add_review_handler),
        )
        .route("/orders", get(list_orders_handler).post(create_order_handler))
        .route("/orders/:id", get(get_order_handler).put(update_order_handler))
        .route("/sellers/:id/products", get(seller_products_handler))
        .route("/customers/:id/orders", get(customer_orders_handler))
        .route("/stats/products", get(product_stats_handler))
        .route("/stats/orders", get(order_stats_handler))
        .route("/search/products", get(search_products_handler))
        .with_state(state)
}

// ==================
// Product Handlers
// ==================

async fn list_products_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ProductQuery>,
) -> ApiResult {
    let filter = query.into_filter()?;
    let rows = state
        .run("Error selecting data", move |registry| {
            registry.with_connection(|conn| commerce::list_products(conn, &filter))
        })
        .await?;
    Ok(ApiResponse::success(format!("Retrieved {} rows from 'products'", rows.len())).with("data", rows))
}

async fn create_product_handler(State(state): State<Arc<GatewayState>>, body: Bytes) -> ApiResult {
    let product = required_object(&body, "Product data is required")?;
    let (last_row_id, stored) = state
        .run("Error inserting data", move |registry| {
            registry.with_connection(|conn| commerce::create_product(conn, product))
        })
        .await?;
    Ok(ApiResponse::success("Data inserted into 'products' successfully")
        .with("last_row_id", last_row_id)
        .with("product_id", stored.get("product_id")))
}

async fn get_product_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let product = state
        .run("Error selecting data", move |registry| {
            registry.with_connection(|conn| commerce::get_product(conn, &id))
        })
        .await?;
    // Same shape as a one-row table select
    Ok(ApiResponse::success("Retrieved 1 rows from 'products'").with("data", [product]))
}

async fn update_product_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let changes = required_object(&body, "Update data is required")?;
    let rows_affected = state
        .run("Error updating data", move |registry| {
            registry.with_connection(|conn| commerce::update_product(conn, &id, changes))
        })
        .await?;
    Ok(
        ApiResponse::success(format!("{} row(s) updated in 'products'", rows_affected))
            .with("rows_affected", rows_affected),
    )
}

async fn delete_product_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let rows_affected = state
        .run("Error deleting data", move |registry| {
            registry.transaction(|tx| commerce::delete_product(tx, &id))
        })
        .await?;
    Ok(
        ApiResponse::success(format!("{} row(s) deleted from 'products'", rows_affected))
            .with("rows_affected", rows_affected),
    )
}

async fn list_reviews_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let rows = state
        .run("Error selecting data", move |registry| {
            registry.with_connection(|conn| commerce::list_reviews(conn, &id))
        })
        .await?;
    Ok(ApiResponse::success(format!("Retrieved {} rows from 'reviews'", rows.len())).with("data", rows))
}

async fn add_review_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let review = required_object(&body, "Review data is required")?;
    let (last_row_id, stored) = state
        .run("Error inserting data", move |registry| {
            registry.with_connection(|conn| commerce::add_review(conn, &id, review))
        })
        .await?;
    Ok(ApiResponse::success("Data inserted into 'reviews' successfully")
        .with("last_row_id", last_row_id)
        .with("review_id", stored.get("review_id")))
}

async fn seller_products_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let rows = state
        .run("Error selecting data", move |registry| {
            registry.with_connection(|conn| commerce::seller_products(conn, &id))
        })
        .await?;
    Ok(ApiResponse::success(format!("Retrieved {} rows from 'products'", rows.len())).with("data", rows))
}

async fn search_products_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult {
    let term = non_empty(query.q).ok_or_else(|| ApiError::bad_request("Search query is required"))?;
    let rows = state
        .run("Error executing query", move |registry| {
            registry.with_connection(|conn| commerce::search_products(conn, &term))
        })
        .await?;
    Ok(ApiResponse::success(format!(
        "Query executed successfully. Retrieved {} rows.",
        rows.len()
    ))
    .with("data", rows))
}

// ==================
// Order Handlers
// ==================

async fn list_orders_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<OrderQuery>,
) -> ApiResult {
    let filter = OrderFilter {
        customer_id: non_empty(query.customer_id),
        status: non_empty(query.status),
    };
    let rows = state
        .run("Error selecting data", move |registry| {
            registry.with_connection(|conn| commerce::list_orders(conn, &filter))
        })
        .await?;
    Ok(ApiResponse::success(format!("Retrieved {} rows from 'orders'", rows.len())).with("data", rows))
}

async fn create_order_handler(State(state): State<Arc<GatewayState>>, body: Bytes) -> ApiResult {
    const MISSING: &str = "Order data with items is required";
    let mut order: Row = parse_body::<Option<Row>>(&body)?.ok_or_else(|| ApiError::bad_request(MISSING))?;
    let items = match order.remove("items") {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(item) => Ok(item),
                _ => Err(ApiError::bad_request("Order items must be objects")),
            })
            .collect::<Result<Vec<Row>, ApiError>>()?,
        _ => return Err(ApiError::bad_request(MISSING)),
    };

    let placed = state
        .run("Error creating order", move |registry| {
            commerce::create_order(registry, order, items)
        })
        .await?;
    Ok(ApiResponse::success("Order created successfully")
        .with("order", placed.order)
        .with("items", placed.items))
}

async fn get_order_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let order_id = id.clone();
    let placed = state
        .run("Error selecting data", move |registry| {
            registry.with_connection(|conn| commerce::get_order(conn, &order_id))
        })
        .await?;
    Ok(ApiResponse::success(format!("Retrieved order {}", id))
        .with("order", placed.order)
        .with("items", placed.items))
}

async fn update_order_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let changes = required_object(&body, "Update data is required")?;
    let rows_affected = state
        .run("Error updating data", move |registry| {
            registry.with_connection(|conn| commerce::update_order(conn, &id, changes))
        })
        .await?;
    Ok(
        ApiResponse::success(format!("{} row(s) updated in 'orders'", rows_affected))
            .with("rows_affected", rows_affected),
    )
}

async fn customer_orders_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let customer_id = id.clone();
    let orders = state
        .run("Error selecting data", move |registry| {
            registry.with_connection(|conn| commerce::customer_orders(conn, &customer_id))
        })
        .await?;
    Ok(ApiResponse::success(format!("Retrieved orders for customer {}", id)).with("data", orders))
}

// ==================
// Statistics Handlers
// ==================

async fn product_stats_handler(State(state): State<Arc<GatewayState>>) -> ApiResult {
    let stats = state
        .run("Error executing query", |registry| {
            registry.with_connection(commerce::product_stats)
        })
        .await?;
    Ok(ApiResponse::success("Product statistics retrieved successfully")
        .with("total_products", stats.total_products)
        .with("by_category", stats.by_category)
        .with("avg_price", stats.avg_price)
        .with("top_sellers", stats.top_sellers))
}

async fn order_stats_handler(State(state): State<Arc<GatewayState>>) -> ApiResult {
    let stats = state
        .run("Error executing query", |registry| {
            registry.with_connection(commerce::order_stats)
        })
        .await?;
    Ok(ApiResponse::success("Order statistics retrieved successfully")
        .with("total_orders", stats.total_orders)
        .with("by_status", stats.by_status)
        .with("avg_value", stats.avg_value)
        .with("recent_orders", stats.recent_orders))
}
