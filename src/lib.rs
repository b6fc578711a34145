// Library exports

pub mod binding;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod module;
pub mod native;
pub mod shape;
pub mod telemetry;
pub mod timer;
pub mod wire;

// Re-export commonly used types
pub use binding::TargetId;
pub use command::{ChannelTransport, Command, CommandBuffer, CommandKind, CommandPayload, HostTransport};
pub use config::BridgeConfig;
pub use context::ExecutingContext;
pub use error::{BridgeError, ScriptError};
pub use event::{
    AddEventListenerOptions, DispatchEventResult, Event, EventInit, EventTarget, ListenerRef,
    RawEvent,
};
pub use native::{EventDispatchResult, NativeValue};
pub use wire::{WireHandle, WireTable};
