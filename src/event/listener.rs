use std::fmt;
use std::rc::Rc;

use super::{Event, EventPhase, PassiveMode};
use crate::command::ListenerFlags;
use crate::context::ExecutingContext;
use crate::error::ScriptError;

/// A script-side callable that can receive events.
///
/// Engines implement this for their function values and for objects exposing
/// a `handleEvent` method.
pub trait EventListener {
    fn invoke(&self, context: &ExecutingContext, event: &Rc<Event>) -> Result<(), ScriptError>;

    /// `true` for handlers installed through an `on<type>` attribute.
    fn is_event_handler(&self) -> bool {
        false
    }
}

struct CallbackListener<F> {
    callback: F,
    event_handler: bool,
}

impl<F> EventListener for CallbackListener<F>
where
    F: Fn(&ExecutingContext, &Rc<Event>) -> Result<(), ScriptError>,
{
    fn invoke(&self, context: &ExecutingContext, event: &Rc<Event>) -> Result<(), ScriptError> {
        (self.callback)(context, event)
    }

    fn is_event_handler(&self) -> bool {
        self.event_handler
    }
}

/// Shared reference to a listener. Equality is callback identity.
#[derive(Clone)]
pub struct ListenerRef(Rc<dyn EventListener>);

impl ListenerRef {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&ExecutingContext, &Rc<Event>) -> Result<(), ScriptError> + 'static,
    {
        Self(Rc::new(CallbackListener {
            callback,
            event_handler: false,
        }))
    }

    pub fn event_handler<F>(callback: F) -> Self
    where
        F: Fn(&ExecutingContext, &Rc<Event>) -> Result<(), ScriptError> + 'static,
    {
        Self(Rc::new(CallbackListener {
            callback,
            event_handler: true,
        }))
    }

    pub fn from_listener(listener: Rc<dyn EventListener>) -> Self {
        Self(listener)
    }

    pub fn invoke(&self, context: &ExecutingContext, event: &Rc<Event>) -> Result<(), ScriptError> {
        self.0.invoke(context, event)
    }

    pub fn is_event_handler(&self) -> bool {
        self.0.is_event_handler()
    }
}

impl PartialEq for ListenerRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ListenerRef {}

impl fmt::Debug for ListenerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListenerRef")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventListenerOptions {
    pub capture: bool,
}

impl From<bool> for EventListenerOptions {
    fn from(capture: bool) -> Self {
        Self { capture }
    }
}

impl From<AddEventListenerOptions> for EventListenerOptions {
    fn from(options: AddEventListenerOptions) -> Self {
        Self {
            capture: options.capture,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddEventListenerOptions {
    pub capture: bool,
    pub passive: bool,
    pub once: bool,
}

impl AddEventListenerOptions {
    pub fn once() -> Self {
        Self {
            once: true,
            ..Self::default()
        }
    }

    pub fn passive() -> Self {
        Self {
            passive: true,
            ..Self::default()
        }
    }
}

impl From<bool> for AddEventListenerOptions {
    fn from(capture: bool) -> Self {
        Self {
            capture,
            ..Self::default()
        }
    }
}

impl From<AddEventListenerOptions> for ListenerFlags {
    fn from(options: AddEventListenerOptions) -> Self {
        Self {
            capture: options.capture,
            passive: options.passive,
            once: options.once,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisteredListener {
    callback: ListenerRef,
    capture: bool,
    passive: bool,
    once: bool,
}

impl RegisteredListener {
    pub fn new(callback: ListenerRef, options: &AddEventListenerOptions) -> Self {
        Self {
            callback,
            capture: options.capture,
            passive: options.passive,
            once: options.once,
        }
    }

    pub fn callback(&self) -> &ListenerRef {
        &self.callback
    }

    pub(crate) fn set_callback(&mut self, callback: ListenerRef) {
        self.callback = callback;
    }

    pub fn capture(&self) -> bool {
        self.capture
    }

    pub fn passive(&self) -> bool {
        self.passive
    }

    pub fn once(&self) -> bool {
        self.once
    }

    pub fn matches(&self, callback: &ListenerRef, capture: bool) -> bool {
        self.capture == capture && &self.callback == callback
    }

    /// Phase filter: capture listeners skip the bubbling pass and vice versa;
    /// both fire at target.
    pub fn should_fire(&self, event: &Event) -> bool {
        match event.event_phase() {
            EventPhase::Capturing => self.capture,
            EventPhase::Bubbling => !self.capture,
            EventPhase::AtTarget | EventPhase::None => true,
        }
    }

    pub fn passive_mode(&self) -> PassiveMode {
        if self.passive {
            PassiveMode::PassiveDefault
        } else {
            PassiveMode::NotPassiveDefault
        }
    }
}
