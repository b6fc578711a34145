use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::binding::TargetId;

pub mod builtin;
pub mod factory;
pub mod listener;
pub mod registry;
pub mod target;

pub use builtin::{CloseEventInit, EventPayload, MessageEventInit};
pub use factory::{EventFactory, RawEvent, RawEventDetail};
pub use listener::{
    AddEventListenerOptions, EventListener, EventListenerOptions, ListenerRef, RegisteredListener,
};
pub use registry::{AddOutcome, ListenerRegistry, RemoveOutcome};
pub use target::{DispatchEventResult, EventTarget, EventTargetData, FiringIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    None = 0,
    Capturing = 1,
    AtTarget = 2,
    Bubbling = 3,
}

/// Lifecycle of a single event object. Dispatch is allowed from
/// `Initialized` only, which makes every event single-use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Uninitialized,
    Initialized,
    Dispatching,
    Dispatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassiveMode {
    NotPassive,
    NotPassiveDefault,
    Passive,
    PassiveDefault,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
    pub composed: bool,
}

impl EventInit {
    pub fn cancelable() -> Self {
        Self {
            cancelable: true,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct Event {
    event_type: RefCell<String>,
    bubbles: Cell<bool>,
    cancelable: Cell<bool>,
    composed: Cell<bool>,
    target: Cell<Option<TargetId>>,
    current_target: Cell<Option<TargetId>>,
    phase: Cell<EventPhase>,
    state: Cell<DispatchState>,
    default_prevented: Cell<bool>,
    default_handled: Cell<bool>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
    is_trusted: Cell<bool>,
    handling_passive: Cell<PassiveMode>,
    payload: EventPayload,
}

impl Event {
    pub fn new(event_type: impl Into<String>, init: EventInit) -> Rc<Self> {
        Self::with_payload(event_type, init, EventPayload::None)
    }

    pub fn with_payload(
        event_type: impl Into<String>,
        init: EventInit,
        payload: EventPayload,
    ) -> Rc<Self> {
        let event = Self::blank(payload);
        event.event_type.replace(event_type.into());
        event.apply_init(init);
        event.state.set(DispatchState::Initialized);
        Rc::new(event)
    }

    /// An event that must go through [`Event::init_event`] before dispatch.
    pub fn uninitialized() -> Rc<Self> {
        Rc::new(Self::blank(EventPayload::None))
    }

    fn blank(payload: EventPayload) -> Self {
        Self {
            event_type: RefCell::new(String::new()),
            bubbles: Cell::new(false),
            cancelable: Cell::new(false),
            composed: Cell::new(false),
            target: Cell::new(None),
            current_target: Cell::new(None),
            phase: Cell::new(EventPhase::None),
            state: Cell::new(DispatchState::Uninitialized),
            default_prevented: Cell::new(false),
            default_handled: Cell::new(false),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
            is_trusted: Cell::new(false),
            handling_passive: Cell::new(PassiveMode::NotPassive),
            payload,
        }
    }

    fn apply_init(&self, init: EventInit) {
        self.bubbles.set(init.bubbles);
        self.cancelable.set(init.cancelable);
        self.composed.set(init.composed);
    }

    /// Ignored while the event is being dispatched. Re-initialising a
    /// dispatched event does not make it dispatchable again.
    pub fn init_event(&self, event_type: impl Into<String>, bubbles: bool, cancelable: bool) {
        if self.is_being_dispatched() {
            return;
        }
        self.event_type.replace(event_type.into());
        self.apply_init(EventInit {
            bubbles,
            cancelable,
            composed: self.composed.get(),
        });
        self.default_prevented.set(false);
        self.propagation_stopped.set(false);
        self.immediate_propagation_stopped.set(false);
        if self.state.get() == DispatchState::Uninitialized {
            self.state.set(DispatchState::Initialized);
        }
    }

    pub fn event_type(&self) -> String {
        self.event_type.borrow().clone()
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles.get()
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable.get()
    }

    pub fn composed(&self) -> bool {
        self.composed.get()
    }

    pub fn target(&self) -> Option<TargetId> {
        self.target.get()
    }

    pub fn current_target(&self) -> Option<TargetId> {
        self.current_target.get()
    }

    pub fn event_phase(&self) -> EventPhase {
        self.phase.get()
    }

    pub fn dispatch_state(&self) -> DispatchState {
        self.state.get()
    }

    pub fn was_initialized(&self) -> bool {
        self.state.get() != DispatchState::Uninitialized
    }

    pub fn is_being_dispatched(&self) -> bool {
        self.state.get() == DispatchState::Dispatching
    }

    pub fn is_trusted(&self) -> bool {
        self.is_trusted.get()
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn default_handled(&self) -> bool {
        self.default_handled.get()
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped.get()
    }

    pub fn handling_passive(&self) -> PassiveMode {
        self.handling_passive.get()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn prevent_default(&self) {
        if matches!(
            self.handling_passive.get(),
            PassiveMode::Passive | PassiveMode::PassiveDefault
        ) {
            tracing::warn!(
                target: "event",
                event_type = %self.event_type.borrow(),
                "Unable to preventDefault inside passive event listener invocation."
            );
            return;
        }
        if self.cancelable.get() {
            self.default_prevented.set(true);
        }
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.set(true);
        self.immediate_propagation_stopped.set(true);
    }

    /// Mark the event as consumed by native default handling.
    pub fn set_default_handled(&self) {
        self.default_handled.set(true);
    }

    pub(crate) fn set_default_prevented(&self, prevented: bool) {
        self.default_prevented.set(prevented);
    }

    pub(crate) fn set_target(&self, target: Option<TargetId>) {
        self.target.set(target);
    }

    pub(crate) fn set_current_target(&self, target: Option<TargetId>) {
        self.current_target.set(target);
    }

    pub(crate) fn set_event_phase(&self, phase: EventPhase) {
        self.phase.set(phase);
    }

    pub(crate) fn set_trusted(&self, trusted: bool) {
        self.is_trusted.set(trusted);
    }

    pub(crate) fn set_handling_passive(&self, mode: PassiveMode) {
        self.handling_passive.set(mode);
    }

    /// Enter `Dispatching`; the returned scope moves the event to
    /// `Dispatched` when it goes out of scope.
    pub(crate) fn begin_dispatch(&self) -> DispatchScope<'_> {
        self.state.set(DispatchState::Dispatching);
        DispatchScope { event: self }
    }
}

pub(crate) struct DispatchScope<'a> {
    event: &'a Event,
}

impl Drop for DispatchScope<'_> {
    fn drop(&mut self) {
        self.event.state.set(DispatchState::Dispatched);
        self.event.phase.set(EventPhase::None);
    }
}
