// src/network/message.rs
use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Correlation identifier linking a request to its response.
pub type RequestId = u64;

pub const ATTR_PID: &str = "pid";
pub const ATTR_AID: &str = "aid";
pub const ATTR_EID: &str = "eid";

pub mod status {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL_ERROR: u16 = 500;
    pub const BAD_GATEWAY: u16 = 502;
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Response,
    Event,
}

/// Envelope exchanged between gateways. The wire form is a JSON object whose
/// `messageType` field selects the variant.
///
/// `timestamp` is stamped locally when a message is built or parsed and never
/// travels on the wire, so staleness is measured against the local clock only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "camelCase")]
pub enum NetworkMessage {
    Request(NetworkMessageRequest),
    Response(NetworkMessageResponse),
    Event(NetworkMessageEvent),
}

impl NetworkMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            NetworkMessage::Request(_) => MessageType::Request,
            NetworkMessage::Response(_) => MessageType::Response,
            NetworkMessage::Event(_) => MessageType::Event,
        }
    }

    pub fn request_id(&self) -> RequestId {
        match self {
            NetworkMessage::Request(m) => m.request_id,
            NetworkMessage::Response(m) => m.request_id,
            NetworkMessage::Event(m) => m.request_id,
        }
    }

    pub fn source_oid(&self) -> &str {
        match self {
            NetworkMessage::Request(m) => &m.source_oid,
            NetworkMessage::Response(m) => &m.source_oid,
            NetworkMessage::Event(m) => &m.source_oid,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            NetworkMessage::Request(m) => m.timestamp,
            NetworkMessage::Response(m) => m.timestamp,
            NetworkMessage::Event(m) => m.timestamp,
        }
    }

    /// True while the message is younger than `expiry`.
    pub fn is_valid(&self, expiry: Duration) -> bool {
        self.is_valid_at(now_millis(), expiry)
    }

    pub fn is_valid_at(&self, now_millis: i64, expiry: Duration) -> bool {
        let age = now_millis.saturating_sub(self.timestamp());
        age < expiry.as_millis() as i64
    }
}

/// What the requesting side wants the destination object to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestOperation {
    GetPropertyValue,
    SetPropertyValue,
    StartAction,
    SubscribeToEvent,
    UnsubscribeFromEvent,
    GetEventChannelStatus,
}

impl RequestOperation {
    /// Operations answered by the gateway itself rather than the local agent.
    pub fn is_event_management(&self) -> bool {
        matches!(
            self,
            RequestOperation::SubscribeToEvent
                | RequestOperation::UnsubscribeFromEvent
                | RequestOperation::GetEventChannelStatus
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMessageRequest {
    request_id: RequestId,
    source_oid: String,
    destination_oid: String,
    operation: RequestOperation,
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    parameters: HashMap<String, String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(skip, default = "now_millis")]
    timestamp: i64,
}

impl NetworkMessageRequest {
    pub fn new(
        request_id: RequestId,
        source_oid: impl Into<String>,
        destination_oid: impl Into<String>,
        operation: RequestOperation,
    ) -> Self {
        Self {
            request_id,
            source_oid: source_oid.into(),
            destination_oid: destination_oid.into(),
            operation,
            attributes: HashMap::new(),
            parameters: HashMap::new(),
            body: None,
            timestamp: now_millis(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn source_oid(&self) -> &str {
        &self.source_oid
    }

    pub fn destination_oid(&self) -> &str {
        &self.destination_oid
    }

    pub fn operation(&self) -> RequestOperation {
        self.operation
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMessageResponse {
    request_id: RequestId,
    source_oid: String,
    status_code: u16,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    status_reason: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(skip, default = "now_millis")]
    timestamp: i64,
}

impl NetworkMessageResponse {
    pub fn new(
        request_id: RequestId,
        source_oid: impl Into<String>,
        status_code: u16,
        body: Option<String>,
    ) -> Self {
        Self {
            request_id,
            source_oid: source_oid.into(),
            status_code,
            error: status_code >= 400,
            status_reason: None,
            body,
            timestamp: now_millis(),
        }
    }

    /// Response answering `request` from the object it was addressed to.
    pub fn reply(request: &NetworkMessageRequest, status_code: u16, body: Option<String>) -> Self {
        Self::new(request.request_id, request.destination_oid.clone(), status_code, body)
    }

    pub fn failure(request: &NetworkMessageRequest, status_code: u16, reason: impl Into<String>) -> Self {
        let mut response = Self::reply(request, status_code, None);
        response.error = true;
        response.status_reason = Some(reason.into());
        response
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn source_oid(&self) -> &str {
        &self.source_oid
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    #[default]
    Published,
    /// The owner deactivated the channel; the receiver is no longer subscribed.
    ChannelClosed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMessageEvent {
    request_id: RequestId,
    source_oid: String,
    event_id: String,
    #[serde(default)]
    kind: EventKind,
    #[serde(default)]
    body: Option<String>,
    #[serde(skip, default = "now_millis")]
    timestamp: i64,
}

impl NetworkMessageEvent {
    pub fn new(
        request_id: RequestId,
        source_oid: impl Into<String>,
        event_id: impl Into<String>,
        kind: EventKind,
        body: Option<String>,
    ) -> Self {
        Self {
            request_id,
            source_oid: source_oid.into(),
            event_id: event_id.into(),
            kind,
            body,
            timestamp: now_millis(),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn source_oid(&self) -> &str {
        &self.source_oid
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

impl From<NetworkMessageRequest> for NetworkMessage {
    fn from(message: NetworkMessageRequest) -> Self {
        NetworkMessage::Request(message)
    }
}

impl From<NetworkMessageResponse> for NetworkMessage {
    fn from(message: NetworkMessageResponse) -> Self {
        NetworkMessage::Response(message)
    }
}

impl From<NetworkMessageEvent> for NetworkMessage {
    fn from(message: NetworkMessageEvent) -> Self {
        NetworkMessage::Event(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_window() {
        let message: NetworkMessage = NetworkMessageResponse::new(7, "b", status::OK, None).into();
        let created = message.timestamp();
        let expiry = Duration::from_millis(100);

        assert!(message.is_valid_at(created, expiry));
        assert!(message.is_valid_at(created + 99, expiry));
        assert!(!message.is_valid_at(created + 100, expiry));
        assert!(message.is_valid(Duration::from_secs(60)));
    }

    #[test]
    fn test_common_accessors_follow_variant() {
        let request = NetworkMessageRequest::new(42, "a", "b", RequestOperation::GetPropertyValue)
            .with_attribute(ATTR_PID, "temperature");
        let message = NetworkMessage::from(request.clone());

        assert_eq!(message.message_type(), MessageType::Request);
        assert_eq!(message.request_id(), 42);
        assert_eq!(message.source_oid(), "a");
        assert_eq!(request.attribute(ATTR_PID), Some("temperature"));
        assert_eq!(request.attribute(ATTR_AID), None);
    }

    #[test]
    fn test_reply_comes_from_destination() {
        let request = NetworkMessageRequest::new(5, "a", "b", RequestOperation::StartAction);
        let ok = NetworkMessageResponse::reply(&request, status::OK, Some("{}".into()));
        let failed = NetworkMessageResponse::failure(&request, status::BAD_GATEWAY, "agent down");

        assert_eq!(ok.request_id(), 5);
        assert_eq!(ok.source_oid(), "b");
        assert!(!ok.is_error());
        assert!(failed.is_error());
        assert_eq!(failed.status_reason(), Some("agent down"));
    }

    #[test]
    fn test_event_management_operations() {
        assert!(RequestOperation::SubscribeToEvent.is_event_management());
        assert!(RequestOperation::GetEventChannelStatus.is_event_management());
        assert!(!RequestOperation::SetPropertyValue.is_event_management());
    }
}
