use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::builtin::{CloseEventInit, EventPayload, MessageEventInit};
use super::{Event, EventInit};
use crate::binding::TargetId;

/// Host-side description of an event crossing into script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub target: TargetId,
    #[serde(default)]
    pub bubbles: bool,
    #[serde(default)]
    pub cancelable: bool,
    #[serde(default)]
    pub composed: bool,
    #[serde(default)]
    pub default_prevented: bool,
    #[serde(default)]
    pub detail: RawEventDetail,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawEventDetail {
    #[default]
    Plain,
    Close(CloseEventInit),
    Message(MessageEventInit),
    Custom {
        #[serde(default)]
        detail: JsonValue,
    },
}

pub struct EventFactory;

impl EventFactory {
    pub fn create(event_type: &str, raw: &RawEvent) -> Rc<Event> {
        let init = EventInit {
            bubbles: raw.bubbles,
            cancelable: raw.cancelable,
            composed: raw.composed,
        };
        let payload = match &raw.detail {
            RawEventDetail::Plain => EventPayload::None,
            RawEventDetail::Close(init) => EventPayload::Close(init.clone()),
            RawEventDetail::Message(init) => EventPayload::Message(init.clone()),
            RawEventDetail::Custom { detail } => EventPayload::Custom(detail.clone()),
        };

        let event = Event::with_payload(event_type, init, payload);
        event.set_target(Some(raw.target));
        event.set_current_target(Some(raw.target));
        if raw.default_prevented && raw.cancelable {
            event.set_default_prevented(true);
        }
        event
    }
}
