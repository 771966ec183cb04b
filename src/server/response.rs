//! # Reply Envelope
//!
//! Every endpoint except `/health` answers with
//! `{"status": "success" | "error" | "info", "message": ..., ...}`.
//! Operation failures are still HTTP 200; only malformed requests (400),
//! missing records in the commerce endpoints (404) and internal failures
//! (500) change the status code.

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use crate::core::GatewayError;

/// Outcome reported in the `status` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Info,
}

/// The uniform JSON reply
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: Status,
    pub message: String,
    /// Endpoint-specific fields (`data`, `rows_affected`, `tables`, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ApiResponse {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        ApiResponse {
            status,
            message: message.into(),
            fields: Map::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Status::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Status::Info, message)
    }

    /// Adds an endpoint-specific field
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or_default();
        self.fields.insert(key.to_string(), value);
        self
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// An error reply: the envelope with `status: "error"` plus an HTTP code
#[derive(Debug)]
pub struct ApiError {
    pub code: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            code: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Converts a gateway error raised while running `context`.
    ///
    /// Engine errors are prefixed with the context ("Error inserting data: ...");
    /// other errors keep their own message.
    pub fn from_gateway(context: &str, err: GatewayError) -> Self {
        let code = match &err {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Transaction(_) | GatewayError::App(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        };
        let message = if err.is_engine_error() {
            format!("{}: {}", context, err)
        } else {
            err.to_string()
        };
        error!("{}", message);
        ApiError { code, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::new(Status::Error, self.message);
        (self.code, Json(body)).into_response()
    }
}

pub type ApiResult = Result<ApiResponse, ApiError>;

/// Decodes an optional JSON body. An empty body yields `T::default()`.
pub fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

/// Runs blocking engine work off the async executor
pub async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("Request task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let reply = ApiResponse::success("Found 2 tables").with("tables", vec!["a", "b"]);
        insta::assert_snapshot!(
            serde_json::to_string(&reply).unwrap(),
            @r#"{"status":"success","message":"Found 2 tables","tables":["a","b"]}"#
        );

        let info = ApiResponse::info("Not connected to any database");
        insta::assert_snapshot!(
            serde_json::to_string(&info).unwrap(),
            @r#"{"status":"info","message":"Not connected to any database"}"#
        );
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ApiError::from_gateway("ctx", GatewayError::NotConnected).code, StatusCode::OK);
        assert_eq!(
            ApiError::from_gateway("ctx", GatewayError::InvalidRequest("x".into())).code,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from_gateway("ctx", GatewayError::NotFound("x".into())).code,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_engine_errors_carry_context() {
        let err = ApiError::from_gateway(
            "Error getting table schema",
            GatewayError::UnknownTable("t".to_string()),
        );
        assert_eq!(err.message, "Error getting table schema: no such table: t");

        let err = ApiError::from_gateway("Error selecting data", GatewayError::NotConnected);
        assert_eq!(err.message, "Not connected to database. Connect first.");
    }

    #[test]
    fn test_parse_body() {
        let empty: Option<Map<String, Value>> = parse_body(&Bytes::new()).unwrap();
        assert!(empty.is_none());

        let row: Option<Map<String, Value>> = parse_body(&Bytes::from_static(b"{\"a\":1}")).unwrap();
        assert_eq!(row.unwrap()["a"], json!(1));

        let bad: Result<Option<Map<String, Value>>, _> = parse_body(&Bytes::from_static(b"[1]"));
        assert_eq!(bad.unwrap_err().code, StatusCode::BAD_REQUEST);
    }
}
