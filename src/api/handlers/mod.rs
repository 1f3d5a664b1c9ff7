//! API handlers and shared response helpers.
//!
//! Validation failures mirror the serializer-style error bodies the frontend
//! expects: field-keyed lists for per-field problems and a `detail` object for
//! terminal failures.

pub mod articles;
pub mod auth;
pub mod health;
pub mod profiles;
pub mod users;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Respond with `{"<field>": ["<message>"]}`.
pub(crate) fn field_error(status: StatusCode, field: &str, message: &str) -> Response {
    (status, Json(json!({ field: [message] }))).into_response()
}

/// Respond with `{"detail": "<message>"}`.
pub(crate) fn detail_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}
