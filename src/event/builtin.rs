use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{Event, EventInit};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloseEventInit {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub was_clean: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEventInit {
    #[serde(default)]
    pub data: JsonValue,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub last_event_id: String,
    #[serde(default)]
    pub source: String,
}

/// Interface-specific data carried by an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventPayload {
    #[default]
    None,
    Close(CloseEventInit),
    Message(MessageEventInit),
    Custom(JsonValue),
}

impl Event {
    pub fn close(event_type: impl Into<String>, init: CloseEventInit) -> Rc<Self> {
        Self::with_payload(event_type, EventInit::default(), EventPayload::Close(init))
    }

    pub fn message(event_type: impl Into<String>, init: MessageEventInit) -> Rc<Self> {
        Self::with_payload(event_type, EventInit::default(), EventPayload::Message(init))
    }

    pub fn custom(event_type: impl Into<String>, init: EventInit, detail: JsonValue) -> Rc<Self> {
        Self::with_payload(event_type, init, EventPayload::Custom(detail))
    }

    pub fn as_close_event(&self) -> Option<&CloseEventInit> {
        match self.payload() {
            EventPayload::Close(init) => Some(init),
            _ => None,
        }
    }

    pub fn as_message_event(&self) -> Option<&MessageEventInit> {
        match self.payload() {
            EventPayload::Message(init) => Some(init),
            _ => None,
        }
    }

    pub fn detail(&self) -> Option<&JsonValue> {
        match self.payload() {
            EventPayload::Custom(detail) => Some(detail),
            _ => None,
        }
    }
}
