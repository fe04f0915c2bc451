//! Encodes domain events to `(type tag, payload)` pairs for the outbox and back.

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::event::{DomainEvent, EventType};

/// An event in its persisted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEvent {
    pub event_type: EventType,
    pub payload: String,
}

/// Errors raised while turning a stored record back into an event.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stored tag is not a registered event type.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// The payload does not match the schema of its tag.
    #[error("Malformed payload for {event_type}: {source}")]
    MalformedPayload {
        event_type: EventType,
        #[source]
        source: serde_json::Error,
    },
}

/// Serializes an event's body under its registered tag.
pub fn encode(event: &DomainEvent) -> serde_json::Result<EncodedEvent> {
    let payload = match event {
        DomainEvent::MissionCreated(data) => serde_json::to_string(data)?,
        DomainEvent::MissionRenamed(data) => serde_json::to_string(data)?,
        DomainEvent::CollaboratorAdded(data) => serde_json::to_string(data)?,
        DomainEvent::CollaboratorRemoved(data) => serde_json::to_string(data)?,
        DomainEvent::ObjectiveAdded(data) => serde_json::to_string(data)?,
        DomainEvent::ObjectiveCompleted(data) => serde_json::to_string(data)?,
        DomainEvent::MetricValueRecorded(data) => serde_json::to_string(data)?,
    };

    Ok(EncodedEvent {
        event_type: event.event_type(),
        payload,
    })
}

/// Rebuilds an event from its tag and payload.
pub fn decode(event_type: &str, payload: &str) -> Result<DomainEvent, DecodeError> {
    let event_type = EventType::from_tag(event_type)
        .ok_or_else(|| DecodeError::UnknownEventType(event_type.to_string()))?;

    let event = match event_type {
        EventType::MissionCreated => DomainEvent::MissionCreated(parse(event_type, payload)?),
        EventType::MissionRenamed => DomainEvent::MissionRenamed(parse(event_type, payload)?),
        EventType::CollaboratorAdded => {
            DomainEvent::CollaboratorAdded(parse(event_type, payload)?)
        }
        EventType::CollaboratorRemoved => {
            DomainEvent::CollaboratorRemoved(parse(event_type, payload)?)
        }
        EventType::ObjectiveAdded => DomainEvent::ObjectiveAdded(parse(event_type, payload)?),
        EventType::ObjectiveCompleted => {
            DomainEvent::ObjectiveCompleted(parse(event_type, payload)?)
        }
        EventType::MetricValueRecorded => {
            DomainEvent::MetricValueRecorded(parse(event_type, payload)?)
        }
    };

    Ok(event)
}

fn parse<T: DeserializeOwned>(event_type: EventType, payload: &str) -> Result<T, DecodeError> {
    serde_json::from_str(payload)
        .map_err(|source| DecodeError::MalformedPayload { event_type, source })
}
