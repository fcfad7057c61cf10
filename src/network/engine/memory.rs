// src/network/engine/memory.rs
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

use super::{CommunicationEngine, EngineError, EngineFactory, InboundHandler, Result};

#[derive(Default)]
struct HubInner {
    endpoints: RwLock<HashMap<String, Weak<dyn InboundHandler>>>,
    credentials: RwLock<HashMap<String, String>>,
}

/// In-process network: every object attached to the same hub can reach every
/// other one. Delivery runs on a spawned task, like a real engine's receive loop.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Once credentials are registered for an object, connecting as it requires them.
    pub fn register_credentials(&self, object_id: impl Into<String>, password: impl Into<String>) {
        self.inner.credentials.write().insert(object_id.into(), password.into());
    }

    pub fn members(&self) -> HashSet<String> {
        self.inner
            .endpoints
            .read()
            .iter()
            .filter(|(_, handler)| handler.strong_count() > 0)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn authenticate(&self, object_id: &str, password: &str) -> Result<()> {
        match self.inner.credentials.read().get(object_id) {
            Some(expected) if expected != password => {
                Err(EngineError::AuthenticationFailed(object_id.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn attach(&self, object_id: &str, handler: Weak<dyn InboundHandler>) {
        self.inner.endpoints.write().insert(object_id.to_string(), handler);
        debug!("Object '{}' attached to memory hub", object_id);
    }

    fn detach(&self, object_id: &str, handler: &Weak<dyn InboundHandler>) {
        let mut endpoints = self.inner.endpoints.write();
        // a newer session for the same object may have replaced this one
        if endpoints.get(object_id).is_some_and(|current| current.ptr_eq(handler)) {
            endpoints.remove(object_id);
            debug!("Object '{}' detached from memory hub", object_id);
        }
    }

    fn is_attached(&self, object_id: &str, handler: &Weak<dyn InboundHandler>) -> bool {
        self.inner
            .endpoints
            .read()
            .get(object_id)
            .is_some_and(|current| current.ptr_eq(handler) && current.strong_count() > 0)
    }

    fn deliver(&self, from: &str, destination: &str, payload: &str) -> Result<()> {
        let handler = self
            .inner
            .endpoints
            .read()
            .get(destination)
            .and_then(Weak::upgrade)
            .ok_or_else(|| EngineError::Unreachable(destination.to_string()))?;

        trace!("Delivering message {} -> {}", from, destination);
        let from = from.to_string();
        let payload = payload.to_string();
        tokio::spawn(async move {
            handler.on_message(&from, &payload).await;
        });

        Ok(())
    }
}

impl EngineFactory for MemoryHub {
    fn create(&self, object_id: &str) -> Arc<dyn CommunicationEngine> {
        Arc::new(MemoryEngine::new(object_id, self.clone()))
    }
}

pub struct MemoryEngine {
    object_id: String,
    hub: MemoryHub,
    handler: RwLock<Option<Weak<dyn InboundHandler>>>,
    connected: AtomicBool,
}

impl MemoryEngine {
    pub fn new(object_id: impl Into<String>, hub: MemoryHub) -> Self {
        Self {
            object_id: object_id.into(),
            hub,
            handler: RwLock::new(None),
            connected: AtomicBool::new(false),
        }
    }

    fn handler(&self) -> Option<Weak<dyn InboundHandler>> {
        self.handler.read().clone()
    }
}

#[async_trait]
impl CommunicationEngine for MemoryEngine {
    fn register_handler(&self, handler: Weak<dyn InboundHandler>) {
        *self.handler.write() = Some(handler);
    }

    async fn connect(&self, object_id: &str, password: &str) -> Result<()> {
        if object_id != self.object_id {
            return Err(EngineError::ConnectionError(format!(
                "engine belongs to '{}', not '{}'",
                self.object_id, object_id
            )));
        }
        self.hub.authenticate(object_id, password)?;

        let handler = self
            .handler()
            .ok_or_else(|| EngineError::ConnectionError("no inbound handler registered".into()))?;
        self.hub.attach(object_id, handler);
        self.connected.store(true, Ordering::SeqCst);

        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            if let Some(handler) = self.handler() {
                self.hub.detach(&self.object_id, &handler);
            }
        } else {
            warn!("Object '{}' disconnect requested while not connected", self.object_id);
        }
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
            && self
                .handler()
                .is_some_and(|handler| self.hub.is_attached(&self.object_id, &handler))
    }

    async fn roster(&self) -> HashSet<String> {
        let mut roster = self.hub.members();
        roster.remove(&self.object_id);
        roster
    }

    async fn send(&self, destination: &str, payload: &str) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(EngineError::NotConnected);
        }
        self.hub.deliver(&self.object_id, destination, payload)
    }
}
