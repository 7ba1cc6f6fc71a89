//! Inventory event types
//!
//! Events are produced by the diff engine and serialized into a
//! [`PushMessage`] before being handed to the upstream push function.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Domain;

/// Module tag carried by every event
pub const MODULE_NAME: &str = "inventory";

/// Change operation carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Before/after state of one changed entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaEvent {
    /// Stable entity identifier (hash of the primary key)
    pub id: String,
    pub operation: Operation,
    /// Domain the entity belongs to
    pub collector: Domain,
    pub module: String,
    /// Time the producing pass started
    pub scanned_at: DateTime<Utc>,
    /// Normalized state before the change (absent for create)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Value>,
    /// Normalized state after the change (absent for delete)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Value>,
    /// Dotted paths whose normalized value differs (update only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_fields: Option<Vec<String>>,
}

/// One-shot discovery fact used for baseline reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatelessEvent {
    pub operation: Operation,
    #[serde(rename = "type")]
    pub kind: Domain,
    pub module: String,
    pub scanned_at: DateTime<Utc>,
    pub data: Value,
}

/// Event handed to the emitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Delta(DeltaEvent),
    Stateless(StatelessEvent),
}

impl Event {
    /// Domain the event was produced for
    #[must_use]
    pub fn domain(&self) -> Domain {
        match self {
            Event::Delta(e) => e.collector,
            Event::Stateless(e) => e.kind,
        }
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Event::Delta(e) => e.operation,
            Event::Stateless(e) => e.operation,
        }
    }

    /// Delivery channel for this event shape
    #[must_use]
    pub fn message_kind(&self) -> MessageKind {
        match self {
            Event::Delta(_) => MessageKind::Stateful,
            Event::Stateless(_) => MessageKind::Stateless,
        }
    }

    #[must_use]
    pub fn is_delta(&self) -> bool {
        matches!(self, Event::Delta(_))
    }
}

/// Delivery channel of a push message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Delta events, tracked against persisted state upstream
    Stateful,
    /// Discovery events, not tied to prior state
    Stateless,
}

/// Serialized event as received by the push function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub kind: MessageKind,
    pub module: String,
    /// JSON-encoded [`Event`]
    pub payload: String,
}

impl PushMessage {
    /// Serialize an event into a push message
    ///
    /// # Errors
    /// Returns an error if the event cannot be encoded as JSON.
    pub fn from_event(event: &Event) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: event.message_kind(),
            module: MODULE_NAME.to_string(),
            payload: serde_json::to_string(event)?,
        })
    }

    /// Decode the carried event
    ///
    /// # Errors
    /// Returns an error if the payload is not a valid event.
    pub fn event(&self) -> Result<Event, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_delete() -> Event {
        Event::Delta(DeltaEvent {
            id: "abc".to_string(),
            operation: Operation::Delete,
            collector: Domain::Ports,
            module: MODULE_NAME.to_string(),
            scanned_at: Utc::now(),
            previous: Some(json!({"process": {"pid": 100}})),
            current: None,
            changed_fields: None,
        })
    }

    #[test]
    fn test_delta_wire_shape() {
        let value = serde_json::to_value(sample_delete()).unwrap();
        assert_eq!(value["kind"], "delta");
        assert_eq!(value["operation"], "delete");
        assert_eq!(value["collector"], "ports");
        assert!(value.get("current").is_none());
        assert!(value.get("changed_fields").is_none());
        assert_eq!(value["previous"]["process"]["pid"], 100);
    }

    #[test]
    fn test_stateless_wire_shape() {
        let event = Event::Stateless(StatelessEvent {
            operation: Operation::Create,
            kind: Domain::Packages,
            module: MODULE_NAME.to_string(),
            scanned_at: Utc::now(),
            data: json!({"package": {"name": "vim"}}),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "stateless");
        assert_eq!(value["type"], "packages");
        assert_eq!(event.message_kind(), MessageKind::Stateless);
    }

    #[test]
    fn test_push_message_carries_event() {
        let event = sample_delete();
        let msg = PushMessage::from_event(&event).unwrap();
        assert_eq!(msg.kind, MessageKind::Stateful);
        assert_eq!(msg.module, "inventory");
        assert_eq!(msg.event().unwrap(), event);
    }
}
