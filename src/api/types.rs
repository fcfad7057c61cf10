// src/api/types.rs
use actix_web::{http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::network::NetworkMessageResponse;

/// Uniform JSON answer of the gateway's own endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub error: bool,
    pub status_code: u16,
    pub status_code_reason: String,
    pub message: Value,
}

impl StatusMessage {
    pub fn new(status: StatusCode, reason: impl Into<String>, message: Value) -> Self {
        Self {
            error: status.is_client_error() || status.is_server_error(),
            status_code: status.as_u16(),
            status_code_reason: reason.into(),
            message,
        }
    }

    pub fn ok(reason: impl Into<String>, message: Value) -> Self {
        Self::new(StatusCode::OK, reason, message)
    }

    pub fn into_response(self) -> HttpResponse {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        HttpResponse::build(status).json(self)
    }
}

/// Relays what the remote object answered. A body is passed through as is;
/// a bodiless answer is described with a [`StatusMessage`].
pub fn forward_response(response: &NetworkMessageResponse) -> HttpResponse {
    let status = StatusCode::from_u16(response.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);

    match response.body() {
        Some(body) => HttpResponse::build(status)
            .content_type("application/json")
            .body(body.to_string()),
        None => {
            let reason = response
                .status_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
            let mut message = StatusMessage::new(status, reason, Value::Null);
            message.error = response.is_error();
            message.into_response()
        }
    }
}
