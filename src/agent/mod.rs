// src/agent/mod.rs
mod http;

use async_trait::async_trait;

use crate::network::message::{NetworkMessageEvent, NetworkMessageRequest, NetworkMessageResponse};

pub use http::HttpAgentCommunicator;

/// The local adapter side of the gateway: everything the network asks of an
/// object served here ends up at its agent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentCommunicator: Send + Sync {
    /// Always answers; failures to reach the agent become error responses.
    async fn handle_request(&self, request: &NetworkMessageRequest) -> NetworkMessageResponse;

    /// Hands an event received from a subscribed channel to the agent of `destination_oid`.
    async fn forward_event(&self, destination_oid: &str, event: &NetworkMessageEvent) -> bool;
}
