// src/api/auth.rs
use actix_web::{dev::Payload, http::header::AUTHORIZATION, FromRequest, HttpRequest};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::future::{ready, Ready};

use crate::utils::error::GatewayError;

/// HTTP Basic credentials of the calling object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub object_id: String,
    pub password: String,
}

impl Credentials {
    pub fn parse(header: &str) -> Result<Self, GatewayError> {
        let unauthorized = || GatewayError::Unauthorized(String::new());

        let encoded = header
            .strip_prefix("Basic ")
            .ok_or_else(unauthorized)?
            .trim();
        let decoded = STANDARD.decode(encoded).map_err(|_| unauthorized())?;
        let decoded = String::from_utf8(decoded).map_err(|_| unauthorized())?;
        let (object_id, password) = decoded.split_once(':').ok_or_else(unauthorized)?;

        if object_id.is_empty() {
            return Err(unauthorized());
        }

        Ok(Self {
            object_id: object_id.to_string(),
            password: password.to_string(),
        })
    }
}

impl FromRequest for Credentials {
    type Error = GatewayError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| GatewayError::Unauthorized(String::new()))
            .and_then(Credentials::parse);

        ready(result)
    }
}
