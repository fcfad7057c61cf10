// src/network/mod.rs
pub mod descriptor;
pub mod engine;
pub mod event_channel;
pub mod manager;
pub mod message;
pub mod parser;
pub mod queue;

pub use descriptor::ConnectionDescriptor;
pub use engine::{CommunicationEngine, EngineError, EngineFactory, InboundHandler, MemoryEngine, MemoryHub};
pub use event_channel::EventChannel;
pub use manager::CommunicationManager;
pub use message::{
    EventKind, MessageType, NetworkMessage, NetworkMessageEvent, NetworkMessageRequest, NetworkMessageResponse,
    RequestId, RequestOperation,
};
pub use parser::ParseError;
pub use queue::InboundQueue;
