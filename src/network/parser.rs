// src/network/parser.rs
use serde_json::Value;
use thiserror::Error;

use super::message::NetworkMessage;

const FIELD_MESSAGE_TYPE: &str = "messageType";
const KNOWN_TYPES: [&str; 3] = ["request", "response", "event"];

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Empty payload")]
    Empty,
    #[error("Payload is not a JSON object")]
    NotAnObject,
    #[error("Missing messageType")]
    MissingType,
    #[error("Unknown messageType: {0}")]
    UnknownType(String),
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Decodes a raw transport payload. Unknown fields are ignored; fields the
/// variant requires must be present and non-empty.
pub fn parse(raw: &str) -> Result<NetworkMessage> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ParseError::InvalidMessage(e.to_string()))?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;

    match object.get(FIELD_MESSAGE_TYPE) {
        None => return Err(ParseError::MissingType),
        Some(Value::String(kind)) if KNOWN_TYPES.contains(&kind.as_str()) => {}
        Some(other) => return Err(ParseError::UnknownType(other.to_string())),
    }

    let message: NetworkMessage = serde_json::from_value(value)
        .map_err(|e| ParseError::InvalidMessage(e.to_string()))?;
    validate(&message)?;

    Ok(message)
}

pub fn to_wire(message: &NetworkMessage) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

fn validate(message: &NetworkMessage) -> Result<()> {
    if message.source_oid().is_empty() {
        return Err(ParseError::InvalidMessage("empty sourceOid".into()));
    }

    match message {
        NetworkMessage::Request(request) if request.destination_oid().is_empty() => {
            Err(ParseError::InvalidMessage("empty destinationOid".into()))
        }
        NetworkMessage::Event(event) if event.event_id().is_empty() => {
            Err(ParseError::InvalidMessage("empty eventId".into()))
        }
        _ => Ok(()),
    }
}
