//! Gateway HTTP Routes
//!
//! Endpoints for connection switching, table management, generic row CRUD,
//! raw query execution and backups.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::response::{parse_body, ApiError, ApiResponse, ApiResult};
use super::GatewayState;
use crate::core::db::{self, ColumnSpec, ExecOutcome, Row};

/// Service name reported by `/health`
pub const SERVICE_NAME: &str = "Database Management API";

// ==================
// Request Types
// ==================

#[derive(Debug, Default, Deserialize)]
pub struct ConnectRequest {
    pub db_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    pub query: Option<String>,
    pub params: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTableRequest {
    pub table_name: Option<String>,
    pub columns: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectQuery {
    pub columns: Option<String>,
    pub condition: Option<String>,
    /// Comma-joined positional parameters
    pub params: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    pub values: Option<Row>,
    pub condition: Option<String>,
    pub params: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteRequest {
    pub condition: Option<String>,
    pub params: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackupRequest {
    pub backup_dir: Option<String>,
}

// ==================
// Gateway Routes
// ==================

/// Create the gateway routes
pub fn gateway_routes(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/connect", post(connect_handler))
        .route("/disconnect", post(disconnect_handler))
        .route("/execute", post(execute_handler))
        .route("/tables", get(list_tables_handler).post(create_table_handler))
        .route("/tables/:name", axum::routing::delete(drop_table_handler))
        .route("/tables/:name/schema", get(get_schema_handler))
        .route(
            "/tables/:name/data",
            get(select_handler)
                .post(insert_handler)
                .put(update_handler)
                .delete(delete_handler),
        )
        .route("/backup", post(backup_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

// ==================
// Connection Handlers
// ==================

async fn connect_handler(State(state): State<Arc<GatewayState>>, body: Bytes) -> ApiResult {
    let request: ConnectRequest = parse_body(&body)?;
    let name = state
        .run("Error connecting to database", move |registry| {
            registry.connect(request.db_name.as_deref())
        })
        .await?;
    Ok(ApiResponse::success(format!("Connected to {} successfully", name)))
}

async fn disconnect_handler(State(state): State<Arc<GatewayState>>) -> ApiResult {
    let closed = state
        .run("Error disconnecting from database", |registry| registry.disconnect())
        .await?;
    Ok(match closed {
        Some(_) => ApiResponse::success("Disconnected from database"),
        None => ApiResponse::info("Not connected to any database"),
    })
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    let db_name = state.registry.active_name();
    Json(json!({
        "status": "up",
        "service": SERVICE_NAME,
        "connected": db_name.is_some(),
        "db_name": db_name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ==================
// Query Execution Handlers
// ==================

async fn execute_handler(State(state): State<Arc<GatewayState>>, body: Bytes) -> ApiResult {
    let request: ExecuteRequest = parse_body(&body)?;
    let query = request
        .query
        .ok_or_else(|| ApiError::bad_request("Query is required"))?;
    let params = request.params.unwrap_or_default();

    let outcome = state
        .run("Error executing query", move |registry| {
            registry.with_connection(|conn| db::execute_remote(conn, &query, &params))
        })
        .await?;

    Ok(match outcome {
        ExecOutcome::Rows(rows) => ApiResponse::success(format!(
            "Query executed successfully. Retrieved {} rows.",
            rows.len()
        ))
        .with("data", rows),
        ExecOutcome::Affected(n) => {
            ApiResponse::success(format!("Query executed successfully. {} rows affected.", n))
                .with("rows_affected", n)
        }
    })
}

// ==================
// Table Management Handlers
// ==================

async fn list_tables_handler(State(state): State<Arc<GatewayState>>) -> ApiResult {
    let tables = state
        .run("Error listing tables", |registry| {
            registry.with_connection(db::list_tables)
        })
        .await?;
    Ok(ApiResponse::success(format!("Found {} tables", tables.len())).with("tables", tables))
}

async fn create_table_handler(State(state): State<Arc<GatewayState>>, body: Bytes) -> ApiResult {
    let request: CreateTableRequest = parse_body(&body)?;
    let (table, columns) = match (request.table_name, request.columns) {
        (Some(table), Some(columns)) => (table, columns),
        _ => return Err(ApiError::bad_request("Table name and columns are required")),
    };
    let columns: Vec<ColumnSpec> = columns
        .into_iter()
        .map(|(name, definition)| match definition {
            Value::String(s) => ColumnSpec::new(name, s),
            other => ColumnSpec::new(name, other.to_string()),
        })
        .collect();

    let name = table.clone();
    state
        .run("Error creating table", move |registry| {
            registry.with_connection(|conn| db::create_table(conn, &name, &columns))
        })
        .await?;
    Ok(ApiResponse::success(format!("Table '{}' created successfully", table)))
}

async fn drop_table_handler(
    State(state): State<Arc<GatewayState>>,
    Path(table): Path<String>,
) -> ApiResult {
    let name = table.clone();
    state
        .run("Error dropping table", move |registry| {
            registry.with_connection(|conn| db::drop_table(conn, &name))
        })
        .await?;
    Ok(ApiResponse::success(format!("Table '{}' dropped successfully", table)))
}

async fn get_schema_handler(
    State(state): State<Arc<GatewayState>>,
    Path(table): Path<String>,
) -> ApiResult {
    let name = table.clone();
    let schema = state
        .run("Error getting table schema", move |registry| {
            registry.with_connection(|conn| db::get_schema(conn, &name))
        })
        .await?;
    Ok(ApiResponse::success(format!("Retrieved schema for '{}'", table)).with("schema", schema))
}

// ==================
// Row Handlers
// ==================

async fn select_handler(
    State(state): State<Arc<GatewayState>>,
    Path(table): Path<String>,
    Query(query): Query<SelectQuery>,
) -> ApiResult {
    let columns = query.columns.unwrap_or_else(|| "*".to_string());
    let params = query
        .params
        .filter(|p| !p.is_empty())
        .map(|p| db::split_params(&p))
        .unwrap_or_default();
    let condition = query.condition;

    let name = table.clone();
    let rows = state
        .run("Error selecting data", move |registry| {
            registry.with_connection(|conn| {
                db::select(conn, &name, &columns, condition.as_deref(), &params)
            })
        })
        .await?;
    Ok(
        ApiResponse::success(format!("Retrieved {} rows from '{}'", rows.len(), table))
            .with("data", rows),
    )
}

async fn insert_handler(
    State(state): State<Arc<GatewayState>>,
    Path(table): Path<String>,
    body: Bytes,
) -> ApiResult {
    let row: Option<Row> = parse_body(&body)?;
    let row = row
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::bad_request("Data is required"))?;

    let name = table.clone();
    let last_row_id = state
        .run("Error inserting data", move |registry| {
            registry.with_connection(|conn| db::insert(conn, &name, &row))
        })
        .await?;
    Ok(
        ApiResponse::success(format!("Data inserted into '{}' successfully", table))
            .with("last_row_id", last_row_id),
    )
}

async fn update_handler(
    State(state): State<Arc<GatewayState>>,
    Path(table): Path<String>,
    body: Bytes,
) -> ApiResult {
    let request: UpdateRequest = parse_body(&body)?;
    let (values, condition) = match (request.values, request.condition) {
        (Some(values), Some(condition)) => (values, condition),
        _ => return Err(ApiError::bad_request("Update values and condition are required")),
    };
    let params = request.params.unwrap_or_default();

    let name = table.clone();
    let rows_affected = state
        .run("Error updating data", move |registry| {
            registry.with_connection(|conn| db::update(conn, &name, &values, &condition, &params))
        })
        .await?;
    Ok(
        ApiResponse::success(format!("{} row(s) updated in '{}'", rows_affected, table))
            .with("rows_affected", rows_affected),
    )
}

async fn delete_handler(
    State(state): State<Arc<GatewayState>>,
    Path(table): Path<String>,
    body: Bytes,
) -> ApiResult {
    let request: DeleteRequest = parse_body(&body)?;
    let params = request.params.unwrap_or_default();
    let condition = request.condition;

    let name = table.clone();
    let rows_affected = state
        .run("Error deleting data", move |registry| {
            registry.with_connection(|conn| db::delete(conn, &name, condition.as_deref(), &params))
        })
        .await?;
    Ok(
        ApiResponse::success(format!("{} row(s) deleted from '{}'", rows_affected, table))
            .with("rows_affected", rows_affected),
    )
}

// ==================
// Backup Handlers
// ==================

async fn backup_handler(State(state): State<Arc<GatewayState>>, body: Bytes) -> ApiResult {
    let request: BackupRequest = parse_body(&body)?;
    let dir = request
        .backup_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| state.backup_dir.clone());

    let file = state
        .run("Error backing up database", move |registry| {
            registry.with_database(|database| db::backup(database, &dir))
        })
        .await?;
    Ok(ApiResponse::success("Database backup created successfully")
        .with("backup_file", file.to_string_lossy()))
}
