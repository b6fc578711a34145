use crate::event::RawEvent;
use crate::wire::WireHandle;

/// Outcome of a host-originated dispatch, handed back to the host.
///
/// `event` keeps the dispatched event alive on the script side until the host
/// drops the handle.
#[derive(Debug)]
pub struct EventDispatchResult {
    pub canceled: bool,
    pub propagation_stopped: bool,
    pub event: WireHandle,
}

/// Values exchanged on host-to-script calls.
#[derive(Debug, Default)]
pub enum NativeValue {
    #[default]
    Null,
    Bool(bool),
    Int64(i64),
    String(String),
    List(Vec<NativeValue>),
    RawEvent(Box<RawEvent>),
    DispatchResult(Box<EventDispatchResult>),
}

impl NativeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NativeValue::Int64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[NativeValue]> {
        match self {
            NativeValue::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_raw_event(&self) -> Option<&RawEvent> {
        match self {
            NativeValue::RawEvent(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn as_dispatch_result(&self) -> Option<&EventDispatchResult> {
        match self {
            NativeValue::DispatchResult(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_dispatch_result(self) -> Option<EventDispatchResult> {
        match self {
            NativeValue::DispatchResult(result) => Some(*result),
            _ => None,
        }
    }

    // Host calls with the wrong argument types are programming errors on the
    // host side, so the `expect_*` helpers panic.

    pub(crate) fn expect_bool(&self, what: &str) -> bool {
        match self.as_bool() {
            Some(value) => value,
            None => panic!("{what}: expected bool, got {self:?}"),
        }
    }

    pub(crate) fn expect_str(&self, what: &str) -> &str {
        match self.as_str() {
            Some(value) => value,
            None => panic!("{what}: expected string, got {self:?}"),
        }
    }

    pub(crate) fn expect_raw_event(&self, what: &str) -> &RawEvent {
        match self.as_raw_event() {
            Some(raw) => raw,
            None => panic!("{what}: expected raw event, got {self:?}"),
        }
    }

    pub(crate) fn expect_string_list(&self, what: &str) -> Vec<String> {
        let Some(values) = self.as_list() else {
            panic!("{what}: expected list, got {self:?}");
        };
        values
            .iter()
            .map(|value| value.expect_str(what).to_string())
            .collect()
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        NativeValue::Int64(value)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::String(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::String(value)
    }
}

impl From<RawEvent> for NativeValue {
    fn from(raw: RawEvent) -> Self {
        NativeValue::RawEvent(Box::new(raw))
    }
}

impl<T: Into<NativeValue>> From<Vec<T>> for NativeValue {
    fn from(values: Vec<T>) -> Self {
        NativeValue::List(values.into_iter().map(Into::into).collect())
    }
}
