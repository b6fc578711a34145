use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::binding::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    CreateEventTarget,
    AddEvent,
    RemoveEvent,
    CallMethod,
    SetProperty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerFlags {
    pub capture: bool,
    pub passive: bool,
    pub once: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandPayload {
    #[default]
    None,
    Listener(ListenerFlags),
    Capture {
        capture: bool,
    },
    Arguments {
        args: Vec<JsonValue>,
    },
    Value {
        value: JsonValue,
    },
}

/// One intent addressed to the host.
///
/// `key` is the event type for listener commands, the class name for
/// `CreateEventTarget`, and the method or property name otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub key: String,
    pub target: TargetId,
    #[serde(default)]
    pub payload: CommandPayload,
}

/// Append-only log of host commands, drained at flush points.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    pub fn add_command(
        &mut self,
        kind: CommandKind,
        key: impl Into<String>,
        target: TargetId,
        payload: CommandPayload,
    ) {
        let command = Command {
            kind,
            key: key.into(),
            target,
            payload,
        };
        tracing::trace!(target: "command", kind = ?command.kind, key = %command.key, target_id = %target, "command appended");
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn pending(&self) -> &[Command] {
        &self.commands
    }

    /// Take every pending command in append order, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<Command> {
        let capacity = self.commands.capacity();
        std::mem::replace(&mut self.commands, Vec::with_capacity(capacity))
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

/// Receiving end of flushed batches on the host side.
pub trait HostTransport {
    fn flush(&mut self, batch: Vec<Command>) -> anyhow::Result<()>;
}

/// Transport that forwards each flushed batch over an unbounded channel.
pub struct ChannelTransport {
    sender: UnboundedSender<Vec<Command>>,
}

impl ChannelTransport {
    pub fn new() -> (Self, UnboundedReceiver<Vec<Command>>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl HostTransport for ChannelTransport {
    fn flush(&mut self, batch: Vec<Command>) -> anyhow::Result<()> {
        self.sender
            .send(batch)
            .map_err(|_| anyhow::anyhow!("host command channel closed"))
    }
}

/// Transport that drops every batch. Used when no host is attached.
#[derive(Debug, Default)]
pub struct DetachedTransport;

impl HostTransport for DetachedTransport {
    fn flush(&mut self, batch: Vec<Command>) -> anyhow::Result<()> {
        tracing::debug!(target: "command", dropped = batch.len(), "no host attached");
        Ok(())
    }
}
