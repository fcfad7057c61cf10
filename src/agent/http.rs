// src/agent/http.rs
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Method};
use std::time::Duration;
use tracing::{debug, warn};

use super::AgentCommunicator;
use crate::network::message::{
    status, NetworkMessageEvent, NetworkMessageRequest, NetworkMessageResponse, RequestOperation,
    ATTR_AID, ATTR_PID,
};
use crate::utils::error::{GatewayError, Result};

const PARAM_SOURCE_OID: &str = "sourceOid";

/// Forwards network traffic to the agent's REST interface.
pub struct HttpAgentCommunicator {
    client: Client,
    base_url: String,
}

impl HttpAgentCommunicator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Agent(format!("Failed to build agent client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, request: &NetworkMessageRequest) -> std::result::Result<(Method, String), String> {
        let object = format!("{}/objects/{}", self.base_url, request.destination_oid());
        let required = |key: &str| {
            request
                .attribute(key)
                .ok_or_else(|| format!("Missing attribute '{}'", key))
        };

        match request.operation() {
            RequestOperation::GetPropertyValue => {
                Ok((Method::GET, format!("{}/properties/{}", object, required(ATTR_PID)?)))
            }
            RequestOperation::SetPropertyValue => {
                Ok((Method::PUT, format!("{}/properties/{}", object, required(ATTR_PID)?)))
            }
            RequestOperation::StartAction => {
                Ok((Method::POST, format!("{}/actions/{}", object, required(ATTR_AID)?)))
            }
            other => Err(format!("Operation {:?} is not served by the agent", other)),
        }
    }
}

#[async_trait]
impl AgentCommunicator for HttpAgentCommunicator {
    async fn handle_request(&self, request: &NetworkMessageRequest) -> NetworkMessageResponse {
        let (method, url) = match self.endpoint(request) {
            Ok(endpoint) => endpoint,
            Err(reason) => {
                warn!("Rejecting request {}: {}", request.request_id(), reason);
                return NetworkMessageResponse::failure(request, status::BAD_REQUEST, reason);
            }
        };

        debug!("Forwarding request {} to agent: {} {}", request.request_id(), method, url);

        let mut builder = self
            .client
            .request(method, &url)
            .query(request.parameters())
            .query(&[(PARAM_SOURCE_OID, request.source_oid())]);
        if let Some(body) = request.body() {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Agent unreachable for request {}: {}", request.request_id(), e);
                return NetworkMessageResponse::failure(request, status::BAD_GATEWAY, e.to_string());
            }
        };

        let status_code = response.status().as_u16();
        match response.text().await {
            Ok(text) => {
                let body = if text.is_empty() { None } else { Some(text) };
                NetworkMessageResponse::reply(request, status_code, body)
            }
            Err(e) => {
                warn!("Failed to read agent response for request {}: {}", request.request_id(), e);
                NetworkMessageResponse::failure(request, status::BAD_GATEWAY, e.to_string())
            }
        }
    }

    async fn forward_event(&self, destination_oid: &str, event: &NetworkMessageEvent) -> bool {
        let url = format!(
            "{}/objects/{}/events/{}",
            self.base_url,
            destination_oid,
            event.event_id()
        );

        let mut builder = self
            .client
            .put(&url)
            .query(&[(PARAM_SOURCE_OID, event.source_oid())]);
        if let Some(body) = event.body() {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        match builder.send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Agent refused event '{}' for '{}': {}", event.event_id(), destination_oid, response.status());
                false
            }
            Err(e) => {
                warn!("Failed to forward event '{}' to '{}': {}", event.event_id(), destination_oid, e);
                false
            }
        }
    }
}
