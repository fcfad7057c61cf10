// src/network/descriptor.rs
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};

use super::engine::{CommunicationEngine, InboundHandler};
use super::event_channel::EventChannel;
use super::message::{
    status, EventKind, NetworkMessage, NetworkMessageEvent, NetworkMessageRequest, NetworkMessageResponse,
    RequestId, RequestOperation, ATTR_EID,
};
use super::parser;
use super::queue::InboundQueue;
use crate::agent::AgentCommunicator;
use crate::utils::config::SessionSettings;
use crate::utils::error::{GatewayError, Result};

/// One object's session with the network.
///
/// Lifecycle: build with [`ConnectionDescriptor::new`], [`connect`](Self::connect),
/// use, [`disconnect`](Self::disconnect). HTTP callers authenticate on every
/// request, so [`verify_password`](Self::verify_password) is checked each time.
///
/// Outbound requests are fire-and-wait: the caller sends a request and then
/// blocks in [`retrieve_message`](Self::retrieve_message) until the response
/// carrying the same request ID shows up in the inbound queue. Inbound
/// requests are answered by the local agent (or by the descriptor itself for
/// event subscriptions) and the answer is sent straight back.
pub struct ConnectionDescriptor {
    object_id: String,
    password: String,
    engine: Arc<dyn CommunicationEngine>,
    agent: Arc<dyn AgentCommunicator>,
    settings: SessionSettings,
    queue: InboundQueue,
    provided_event_channels: RwLock<Vec<EventChannel>>,
    // event ID -> object ID of the channel owner
    subscribed_event_channels: RwLock<HashMap<String, String>>,
    next_request_id: AtomicU64,
}

impl ConnectionDescriptor {
    pub fn new(
        object_id: impl Into<String>,
        password: impl Into<String>,
        engine: Arc<dyn CommunicationEngine>,
        agent: Arc<dyn AgentCommunicator>,
        settings: SessionSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let handler: Weak<dyn InboundHandler> = this.clone();
            engine.register_handler(handler);

            Self {
                object_id: object_id.into(),
                password: password.into(),
                engine,
                agent,
                settings,
                queue: InboundQueue::new(),
                provided_event_channels: RwLock::new(Vec::new()),
                subscribed_event_channels: RwLock::new(HashMap::new()),
                // seeded from the clock so a re-created session does not reuse live IDs
                next_request_id: AtomicU64::new(Utc::now().timestamp_millis().unsigned_abs()),
            }
        })
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn verify_password(&self, candidate: &str) -> bool {
        candidate == self.password
    }

    pub async fn connect(&self) -> bool {
        self.queue.reopen();
        match self.engine.connect(&self.object_id, &self.password).await {
            Ok(()) => {
                info!("Object '{}' connected", self.object_id);
                true
            }
            Err(e) => {
                warn!("Object '{}' failed to connect: {}", self.object_id, e);
                false
            }
        }
    }

    /// Tears the session down; callers blocked in `retrieve_message` return `None`.
    pub async fn disconnect(&self) {
        self.engine.disconnect().await;
        self.queue.close();
        info!("Object '{}' disconnected", self.object_id);
    }

    pub async fn is_connected(&self) -> bool {
        self.engine.is_connected().await
    }

    pub async fn roster(&self) -> HashSet<String> {
        self.engine.roster().await
    }

    pub fn next_request_id(&self) -> RequestId {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// False when the destination is offline or the engine failed; never an error.
    pub async fn send_message(&self, destination: &str, message: &NetworkMessage) -> bool {
        match parser::to_wire(message) {
            Ok(wire) => self.send_wire(destination, &wire).await,
            Err(e) => {
                error!("Failed to encode message {}: {}", message.request_id(), e);
                false
            }
        }
    }

    /// Waits for the inbound message correlated with `request_id`.
    ///
    /// At most one caller gets a given response. `None` means the configured
    /// timeout elapsed or the session was disconnected while waiting.
    pub async fn retrieve_message(&self, request_id: RequestId) -> Option<NetworkMessage> {
        self.queue.take(request_id, &self.settings).await
    }

    /// Sends a request and waits for its response.
    pub async fn request(
        &self,
        destination: &str,
        operation: RequestOperation,
        attributes: HashMap<String, String>,
        parameters: HashMap<String, String>,
        body: Option<String>,
    ) -> Result<NetworkMessageResponse> {
        let request_id = self.next_request_id();
        let request = attributes
            .into_iter()
            .fold(
                NetworkMessageRequest::new(request_id, self.object_id.clone(), destination, operation),
                |request, (key, value)| request.with_attribute(key, value),
            )
            .with_parameters(parameters)
            .with_body(body);

        if !self.send_message(destination, &request.into()).await {
            return Err(GatewayError::Unreachable(destination.to_string()));
        }

        match self.retrieve_message(request_id).await {
            Some(NetworkMessage::Response(response)) => Ok(response),
            Some(other) => {
                warn!("Request {} was answered with a {:?}", request_id, other.message_type());
                Err(GatewayError::Timeout(request_id))
            }
            None => Err(GatewayError::Timeout(request_id)),
        }
    }

    /// Entry point for everything the engine receives for this object.
    pub async fn process_incoming_message(&self, from: &str, raw: &str) {
        trace!("New message from {}: {}", from, raw);

        let message = match parser::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Invalid message received from '{}': {}", from, e);
                return;
            }
        };

        if message.source_oid() != from {
            warn!(
                "Message {} from '{}' claims to come from '{}'",
                message.request_id(),
                from,
                message.source_oid()
            );
        }

        match message {
            NetworkMessage::Request(request) => self.process_request(from, request).await,
            NetworkMessage::Response(response) => {
                trace!(
                    "Response {} queued, message count: {}",
                    response.request_id(),
                    self.queue.len() + 1
                );
                self.queue.push(response.into(), self.settings.message_expiry);
            }
            NetworkMessage::Event(event) => self.process_event(from, event).await,
        }
    }

    /// Sets the status of the provided channel `event_id`.
    ///
    /// Activating an unknown channel creates it. Deactivating an unknown
    /// channel returns false and creates nothing. Deactivating an existing one
    /// notifies every subscriber and drops them from the channel.
    pub async fn set_event_channel_status(&self, event_id: &str, active: bool) -> bool {
        let dropped = {
            let mut channels = self.provided_event_channels.write();
            match channels.iter_mut().find(|channel| channel.event_id() == event_id) {
                Some(channel) => {
                    channel.set_active(active);
                    info!(
                        "Object '{}' changed the activeness of existing event channel '{}' to {}",
                        channel.object_id(),
                        event_id,
                        active
                    );
                    if active {
                        HashSet::new()
                    } else {
                        channel.take_subscribers()
                    }
                }
                None if active => {
                    channels.push(EventChannel::new(self.object_id.clone(), event_id, true));
                    info!("Object '{}' created active event channel '{}'", self.object_id, event_id);
                    return true;
                }
                None => {
                    debug!(
                        "Could not deactivate the event channel '{}' of the object '{}'. The event channel does not exist.",
                        event_id, self.object_id
                    );
                    return false;
                }
            }
        };

        if !dropped.is_empty() {
            let notice = NetworkMessageEvent::new(
                self.next_request_id(),
                self.object_id.clone(),
                event_id,
                EventKind::ChannelClosed,
                None,
            );
            let notified = self.fan_out(&dropped, &notice.into()).await;
            info!(
                "Event channel '{}' of '{}' closed, {}/{} subscribers notified",
                event_id,
                self.object_id,
                notified,
                dropped.len()
            );
        }

        true
    }

    /// Publishes an event on the provided channel `event_id`.
    ///
    /// Returns `None` if there is no such channel, otherwise the number of
    /// subscribers. A subscriber that cannot be reached does not stop delivery
    /// to the others.
    pub async fn send_event_to_subscribers(&self, event_id: &str, body: Option<String>) -> Option<usize> {
        let subscribers = self.with_channel(event_id, |channel| channel.subscribers())?;

        let event = NetworkMessageEvent::new(
            self.next_request_id(),
            self.object_id.clone(),
            event_id,
            EventKind::Published,
            body,
        );
        let delivered = self.fan_out(&subscribers, &event.into()).await;

        debug!(
            "Event '{}' of '{}' delivered to {}/{} subscribers",
            event_id,
            self.object_id,
            delivered,
            subscribers.len()
        );
        Some(subscribers.len())
    }

    /// Number of subscribers of the provided channel `event_id`, `None` if absent.
    pub fn number_of_subscribers(&self, event_id: &str) -> Option<usize> {
        self.with_channel(event_id, |channel| channel.subscriber_count())
    }

    pub fn event_channel_active(&self, event_id: &str) -> Option<bool> {
        self.with_channel(event_id, |channel| channel.is_active())
    }

    /// Subscribes this object to `owner`'s channel `event_id`.
    ///
    /// The subscription is recorded only if the owner accepted it. One owner is
    /// tracked per event ID, so an accepted subscription to a new owner cancels
    /// the one held at the previous owner.
    pub async fn subscribe_to_event_channel(&self, owner: &str, event_id: &str) -> Result<NetworkMessageResponse> {
        let response = self
            .request(
                owner,
                RequestOperation::SubscribeToEvent,
                HashMap::from([(ATTR_EID.to_string(), event_id.to_string())]),
                HashMap::new(),
                None,
            )
            .await?;

        if response.is_error() {
            return Ok(response);
        }

        let previous = self
            .subscribed_event_channels
            .write()
            .insert(event_id.to_string(), owner.to_string());
        info!("Object '{}' subscribed to '{}' of '{}'", self.object_id, event_id, owner);

        if let Some(previous) = previous.filter(|previous| previous != owner) {
            self.cancel_subscription(&previous, event_id).await;
        }

        Ok(response)
    }

    async fn cancel_subscription(&self, owner: &str, event_id: &str) {
        let result = self
            .request(
                owner,
                RequestOperation::UnsubscribeFromEvent,
                HashMap::from([(ATTR_EID.to_string(), event_id.to_string())]),
                HashMap::new(),
                None,
            )
            .await;

        match result {
            Ok(response) if !response.is_error() => {
                info!("Object '{}' left '{}' of '{}'", self.object_id, event_id, owner)
            }
            Ok(response) => warn!(
                "Object '{}' could not leave '{}' of '{}': status {}",
                self.object_id,
                event_id,
                owner,
                response.status_code()
            ),
            Err(e) => warn!(
                "Object '{}' could not leave '{}' of '{}': {}",
                self.object_id, event_id, owner, e
            ),
        }
    }

    pub async fn unsubscribe_from_event_channel(&self, owner: &str, event_id: &str) -> Result<NetworkMessageResponse> {
        let response = self
            .request(
                owner,
                RequestOperation::UnsubscribeFromEvent,
                HashMap::from([(ATTR_EID.to_string(), event_id.to_string())]),
                HashMap::new(),
                None,
            )
            .await?;

        if !response.is_error() {
            let mut subscribed = self.subscribed_event_channels.write();
            if subscribed.get(event_id).is_some_and(|current| current == owner) {
                subscribed.remove(event_id);
            }
            info!("Object '{}' unsubscribed from '{}' of '{}'", self.object_id, event_id, owner);
        }

        Ok(response)
    }

    pub fn subscribed_event_channels(&self) -> HashMap<String, String> {
        self.subscribed_event_channels.read().clone()
    }

    async fn process_request(&self, from: &str, request: NetworkMessageRequest) {
        let response = if request.destination_oid() != self.object_id {
            warn!(
                "Request {} for '{}' was delivered to '{}'",
                request.request_id(),
                request.destination_oid(),
                self.object_id
            );
            NetworkMessageResponse::new(request.request_id(), self.object_id.clone(), status::NOT_FOUND, None)
        } else if request.operation().is_event_management() {
            self.serve_event_request(from, &request)
        } else {
            self.agent.handle_request(&request).await
        };

        if !self.send_message(from, &response.into()).await {
            warn!("Could not send response to request {} back to '{}'", request.request_id(), from);
        }
    }

    fn serve_event_request(&self, from: &str, request: &NetworkMessageRequest) -> NetworkMessageResponse {
        let Some(event_id) = request.attribute(ATTR_EID) else {
            return NetworkMessageResponse::failure(request, status::BAD_REQUEST, "Missing attribute 'eid'");
        };

        let mut channels = self.provided_event_channels.write();
        let Some(channel) = channels.iter_mut().find(|channel| channel.event_id() == event_id) else {
            return NetworkMessageResponse::failure(
                request,
                status::NOT_FOUND,
                format!("Object '{}' has no event channel '{}'", self.object_id, event_id),
            );
        };

        match request.operation() {
            RequestOperation::SubscribeToEvent if !channel.is_active() => NetworkMessageResponse::failure(
                request,
                status::FORBIDDEN,
                format!("Event channel '{}' is not active", event_id),
            ),
            RequestOperation::SubscribeToEvent => {
                if channel.subscribe(from) {
                    info!("Object '{}' subscribed to event channel '{}' of '{}'", from, event_id, self.object_id);
                }
                NetworkMessageResponse::reply(request, status::OK, None)
            }
            RequestOperation::UnsubscribeFromEvent => {
                if channel.unsubscribe(from) {
                    info!("Object '{}' unsubscribed from event channel '{}' of '{}'", from, event_id, self.object_id);
                }
                NetworkMessageResponse::reply(request, status::OK, None)
            }
            _ => {
                let body = serde_json::json!({
                    "active": channel.is_active(),
                    "subscribers": channel.subscriber_count(),
                });
                NetworkMessageResponse::reply(request, status::OK, Some(body.to_string()))
            }
        }
    }

    async fn process_event(&self, from: &str, event: NetworkMessageEvent) {
        let subscribed = self
            .subscribed_event_channels
            .read()
            .get(event.event_id())
            .is_some_and(|owner| owner == from);
        if !subscribed {
            warn!(
                "Object '{}' dropped event '{}' from '{}': not subscribed",
                self.object_id,
                event.event_id(),
                from
            );
            return;
        }

        if event.kind() == EventKind::ChannelClosed {
            self.subscribed_event_channels.write().remove(event.event_id());
            info!(
                "Event channel '{}' of '{}' was closed, subscription of '{}' removed",
                event.event_id(),
                from,
                self.object_id
            );
        }

        if !self.agent.forward_event(&self.object_id, &event).await {
            warn!("Agent of '{}' did not accept event '{}'", self.object_id, event.event_id());
        }
    }

    /// Sends `message` to every object in `destinations` concurrently; returns how many succeeded.
    async fn fan_out(&self, destinations: &HashSet<String>, message: &NetworkMessage) -> usize {
        let wire = match parser::to_wire(message) {
            Ok(wire) => wire,
            Err(e) => {
                error!("Failed to encode message {}: {}", message.request_id(), e);
                return 0;
            }
        };

        let results = join_all(
            destinations
                .iter()
                .map(|destination| self.send_wire(destination, &wire)),
        )
        .await;

        results.into_iter().filter(|sent| *sent).count()
    }

    async fn send_wire(&self, destination: &str, wire: &str) -> bool {
        match self.engine.send(destination, wire).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Object '{}' could not send to '{}': {}", self.object_id, destination, e);
                false
            }
        }
    }

    fn with_channel<R>(&self, event_id: &str, f: impl FnOnce(&EventChannel) -> R) -> Option<R> {
        self.provided_event_channels
            .read()
            .iter()
            .find(|channel| channel.event_id() == event_id)
            .map(f)
    }
}

#[async_trait]
impl InboundHandler for ConnectionDescriptor {
    async fn on_message(&self, from: &str, payload: &str) {
        self.process_incoming_message(from, payload).await;
    }
}
