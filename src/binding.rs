use std::fmt;

use serde::{Deserialize, Serialize};

/// Host-visible identity of a native-backed object.
///
/// The host keys its shadow state by this value; it is stable for the lifetime
/// of the owning target and never reused within a context.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TargetId(pub u64);

impl TargetId {
    /// The context's global object. Module and timer calls are addressed here.
    pub const GLOBAL: TargetId = TargetId(0);
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// Method names the host uses when calling into a target.
pub mod call_methods {
    pub const DISPATCH_EVENT: &str = "dispatchEvent";
    pub const SYNC_PROPERTIES_AND_METHODS: &str = "syncPropertiesAndMethods";
}

/// Method names carried by `CallMethod` commands addressed to the host.
pub mod host_methods {
    pub const INVOKE_MODULE: &str = "invokeModule";
    pub const SET_TIMEOUT: &str = "setTimeout";
    pub const SET_INTERVAL: &str = "setInterval";
    pub const CLEAR_TIMEOUT: &str = "clearTimeout";
}
