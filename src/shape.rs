use std::collections::HashSet;

use serde_json::Value as JsonValue;

/// Well-known key resolved to the target's class name.
pub const TO_STRING_TAG: &str = "Symbol.toStringTag";

/// Built-in members of one host class, as reported by
/// `syncPropertiesAndMethods`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetShape {
    properties: HashSet<String>,
    methods: HashSet<String>,
    async_methods: HashSet<String>,
}

impl TargetShape {
    pub fn new(
        properties: impl IntoIterator<Item = String>,
        methods: impl IntoIterator<Item = String>,
        async_methods: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            properties: properties.into_iter().collect(),
            methods: methods.into_iter().collect(),
            async_methods: async_methods.into_iter().collect(),
        }
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains(key)
    }

    pub fn has_method(&self, key: &str) -> bool {
        self.methods.contains(key)
    }

    pub fn has_async_method(&self, key: &str) -> bool {
        self.async_methods.contains(key)
    }

    /// Properties win over methods when a host reports a name twice.
    pub fn classify(&self, key: &str) -> PropertyLookup {
        if self.has_property(key) {
            PropertyLookup::BuiltInProperty
        } else if self.has_method(key) {
            PropertyLookup::SyncMethod
        } else if self.has_async_method(key) {
            PropertyLookup::AsyncMethod
        } else {
            PropertyLookup::Undefined
        }
    }
}

/// How a named member of a target resolves.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyLookup {
    /// A script-assigned value the host does not know about.
    Unimplemented(JsonValue),
    /// Read through to the host.
    BuiltInProperty,
    SyncMethod,
    AsyncMethod,
    ToStringTag(String),
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetItemOutcome {
    /// Queued as a `SetProperty` command.
    Forwarded,
    Stored,
    /// The owning context is gone.
    Detached,
}
