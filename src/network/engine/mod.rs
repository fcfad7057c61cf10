// src/network/engine/mod.rs
mod error;
mod memory;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

pub use error::{EngineError, Result};
pub use memory::{MemoryEngine, MemoryHub};

/// Receives raw payloads delivered by an engine.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn on_message(&self, from: &str, payload: &str);
}

/// The messaging substrate connecting this gateway to the object network.
///
/// One engine instance serves exactly one object session. Inbound traffic is
/// pushed to the registered handler on tasks owned by the engine.
#[async_trait]
pub trait CommunicationEngine: Send + Sync {
    /// The handler is held weakly; the session owning the engine also owns the handler.
    fn register_handler(&self, handler: Weak<dyn InboundHandler>);
    async fn connect(&self, object_id: &str, password: &str) -> Result<()>;
    async fn disconnect(&self);
    async fn is_connected(&self) -> bool;
    async fn roster(&self) -> HashSet<String>;
    async fn send(&self, destination: &str, payload: &str) -> Result<()>;
}

pub trait EngineFactory: Send + Sync {
    fn create(&self, object_id: &str) -> Arc<dyn CommunicationEngine>;
}
