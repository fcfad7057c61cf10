// tests/integration/common.rs
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use object_gateway::{
    agent::AgentCommunicator,
    network::{
        message::{status, ATTR_PID},
        CommunicationManager, MemoryHub, NetworkMessageEvent, NetworkMessageRequest, NetworkMessageResponse,
    },
    utils::config::SessionSettings,
};

/// Agent answering every property read with the property name and keeping
/// the events it is handed.
#[derive(Default)]
pub struct StubAgent {
    pub events: Mutex<Vec<(String, NetworkMessageEvent)>>,
}

#[async_trait]
impl AgentCommunicator for StubAgent {
    async fn handle_request(&self, request: &NetworkMessageRequest) -> NetworkMessageResponse {
        let body = serde_json::json!({
            "object": request.destination_oid(),
            "property": request.attribute(ATTR_PID),
            "body": request.body(),
        });
        NetworkMessageResponse::reply(request, status::OK, Some(body.to_string()))
    }

    async fn forward_event(&self, destination_oid: &str, event: &NetworkMessageEvent) -> bool {
        self.events.lock().push((destination_oid.to_string(), event.clone()));
        true
    }
}

pub fn test_settings() -> SessionSettings {
    SessionSettings {
        response_timeout: Duration::from_secs(2),
        message_expiry: Duration::from_secs(10),
        poll_interval: Duration::from_millis(50),
    }
}

/// A gateway attached to `hub`, with its agent exposed for inspection.
pub struct TestGateway {
    pub manager: Arc<CommunicationManager>,
    pub agent: Arc<StubAgent>,
}

impl TestGateway {
    pub fn new(hub: &MemoryHub) -> Self {
        let agent = Arc::new(StubAgent::default());
        let manager = Arc::new(CommunicationManager::new(
            Arc::new(hub.clone()),
            agent.clone(),
            test_settings(),
        ));

        Self { manager, agent }
    }
}

/// Polls `condition` until it holds or a second has passed.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
