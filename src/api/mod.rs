// src/api/mod.rs
pub mod auth;
pub mod handlers;
pub mod types;

use actix_web::{
    http::{header, StatusCode},
    web, HttpResponse, ResponseError,
};
use serde_json::Value;

use crate::utils::error::GatewayError;
use types::StatusMessage;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(handlers::objects::scope())
            .service(handlers::events::scope()),
    );
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::NotConnected(_) | GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::ServiceUnavailable(_) | GatewayError::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Agent(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Config(_) | GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let reason = status.canonical_reason().unwrap_or_default();
        let body = StatusMessage::new(status, reason, Value::String(self.to_string()));

        let mut response = HttpResponse::build(status);
        if status == StatusCode::UNAUTHORIZED {
            response.insert_header((header::WWW_AUTHENTICATE, "Basic realm=\"object-gateway\""));
        }
        response.json(body)
    }
}
