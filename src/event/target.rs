use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde_json::Value as JsonValue;

use super::factory::EventFactory;
use super::listener::{AddEventListenerOptions, EventListenerOptions, ListenerRef, RegisteredListener};
use super::registry::ListenerRegistry;
use super::{Event, EventPhase, PassiveMode};
use crate::binding::{call_methods, TargetId};
use crate::command::{CommandKind, CommandPayload};
use crate::context::ExecutingContext;
use crate::error::BridgeError;
use crate::native::{EventDispatchResult, NativeValue};
use crate::shape::{PropertyLookup, SetItemOutcome, TargetShape, TO_STRING_TAG};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEventResult {
    NotCanceled,
    CanceledByEventHandler,
    CanceledByDefaultEventHandler,
}

impl DispatchEventResult {
    pub fn from_event(event: &Event) -> Self {
        if event.default_prevented() {
            DispatchEventResult::CanceledByEventHandler
        } else if event.default_handled() {
            DispatchEventResult::CanceledByDefaultEventHandler
        } else {
            DispatchEventResult::NotCanceled
        }
    }
}

/// Bookkeeping for one in-progress walk over a listener sequence.
///
/// `cursor` is the next index to fire, not the one currently firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiringIterator {
    pub event_type: String,
    pub capture: bool,
    pub cursor: usize,
    pub end: usize,
}

#[derive(Debug, Default)]
pub struct EventTargetData {
    listeners: ListenerRegistry,
    capture_listeners: ListenerRegistry,
    firing_iterators: Vec<FiringIterator>,
}

impl EventTargetData {
    pub fn registry(&self, capture: bool) -> &ListenerRegistry {
        if capture {
            &self.capture_listeners
        } else {
            &self.listeners
        }
    }

    fn registry_mut(&mut self, capture: bool) -> &mut ListenerRegistry {
        if capture {
            &mut self.capture_listeners
        } else {
            &mut self.listeners
        }
    }

    pub fn firing_iterators(&self) -> &[FiringIterator] {
        &self.firing_iterators
    }
}

/// Pops the firing iterator pushed at `depth` on every exit path.
struct FiringScope<'a> {
    target: &'a EventTarget,
    depth: usize,
}

impl Drop for FiringScope<'_> {
    fn drop(&mut self) {
        if let Ok(mut data) = self.target.data.try_borrow_mut() {
            if let Some(data) = data.as_mut() {
                data.firing_iterators.truncate(self.depth);
            }
        }
    }
}

pub struct EventTarget {
    id: TargetId,
    class_name: String,
    context: Weak<ExecutingContext>,
    data: RefCell<Option<EventTargetData>>,
    shape: RefCell<Option<Rc<TargetShape>>>,
    unimplemented_properties: RefCell<HashMap<String, JsonValue>>,
}

impl EventTarget {
    /// Create a script-constructed target and announce it to the host.
    pub fn create(context: &Rc<ExecutingContext>, class_name: impl Into<String>) -> Rc<Self> {
        context.assert_thread();
        let class_name = class_name.into();
        let id = context.allocate_target_id();
        context.add_command(
            CommandKind::CreateEventTarget,
            class_name.clone(),
            id,
            CommandPayload::None,
        );
        Self::register(context, id, class_name)
    }

    /// Wrap an object the host already knows about. No command is emitted.
    pub fn from_host_object(
        context: &Rc<ExecutingContext>,
        id: TargetId,
        class_name: impl Into<String>,
    ) -> Rc<Self> {
        context.assert_thread();
        Self::register(context, id, class_name.into())
    }

    fn register(context: &Rc<ExecutingContext>, id: TargetId, class_name: String) -> Rc<Self> {
        let target = Rc::new(Self {
            id,
            class_name,
            context: Rc::downgrade(context),
            data: RefCell::new(None),
            shape: RefCell::new(None),
            unimplemented_properties: RefCell::new(HashMap::new()),
        });
        context.register_target(&target);
        target
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn context(&self) -> Option<Rc<ExecutingContext>> {
        self.context.upgrade()
    }

    // Detached targets have no owner left to check against.
    fn assert_owner_thread(&self) {
        if let Some(context) = self.context() {
            context.assert_thread();
        }
    }

    pub fn has_event_target_data(&self) -> bool {
        self.data.borrow().is_some()
    }

    /// Run `f` against the target data, if any listener was ever registered.
    pub fn with_event_target_data<T>(&self, f: impl FnOnce(&EventTargetData) -> T) -> Option<T> {
        self.data.borrow().as_ref().map(f)
    }

    pub fn add_event_listener(
        &self,
        event_type: &str,
        listener: &ListenerRef,
        options: impl Into<AddEventListenerOptions>,
    ) -> bool {
        self.add_event_listener_internal(event_type, listener, options.into())
    }

    pub fn remove_event_listener(
        &self,
        event_type: &str,
        listener: &ListenerRef,
        options: impl Into<EventListenerOptions>,
    ) -> bool {
        self.assert_owner_thread();
        self.remove_event_listener_internal(event_type, listener, options.into().capture)
    }

    /// Script-facing `dispatchEvent`. Returns `false` only when a listener
    /// canceled the event.
    pub fn dispatch_event(&self, event: &Rc<Event>) -> Result<bool, BridgeError> {
        if !event.was_initialized() {
            return Err(BridgeError::InvalidState("The event provided is uninitialized."));
        }
        if event.is_being_dispatched() {
            return Err(BridgeError::InvalidState("The event is already being dispatched."));
        }
        if event.dispatch_state() == super::DispatchState::Dispatched {
            return Err(BridgeError::InvalidState("The event has already been dispatched."));
        }

        let Some(context) = self.context() else {
            return Ok(false);
        };
        context.assert_thread();

        event.set_trusted(false);
        Ok(self.dispatch_event_internal(event) != DispatchEventResult::CanceledByEventHandler)
    }

    fn dispatch_event_internal(&self, event: &Rc<Event>) -> DispatchEventResult {
        let _dispatch = event.begin_dispatch();
        event.set_target(Some(self.id));
        event.set_current_target(Some(self.id));
        event.set_event_phase(EventPhase::AtTarget);
        let result = self.fire_event_listeners(event, false);
        event.set_event_phase(EventPhase::None);
        result
    }

    /// Fire the listeners of one phase registry for `event` on this target.
    pub fn fire_event_listeners(&self, event: &Rc<Event>, capture: bool) -> DispatchEventResult {
        debug_assert!(event.was_initialized());

        if !self.has_event_target_data() {
            return DispatchEventResult::NotCanceled;
        }
        let fired = self.fire_listeners(event, capture);
        tracing::trace!(target: "event", event_type = %event.event_type(), capture, fired, "listeners fired");

        DispatchEventResult::from_event(event)
    }

    /// Run the `capture` phase registry for `event` and report whether any
    /// listener was invoked.
    ///
    /// Listeners removed during the walk never fire; listeners added during the
    /// walk land at or after `end` and are left for the next dispatch.
    pub fn fire_listeners(&self, event: &Rc<Event>, capture: bool) -> bool {
        let Some(context) = self.context() else {
            return false;
        };
        context.assert_thread();
        let event_type = event.event_type();
        let has_listeners = self
            .with_event_target_data(|data| data.registry(capture).contains(&event_type))
            .unwrap_or(false);
        if !has_listeners {
            return false;
        }

        let depth = {
            let mut data = self.data.borrow_mut();
            let Some(data) = data.as_mut() else {
                return false;
            };
            let end = data.registry(capture).listener_count(&event_type);
            data.firing_iterators.push(FiringIterator {
                event_type: event_type.clone(),
                capture,
                cursor: 0,
                end,
            });
            data.firing_iterators.len() - 1
        };
        let _scope = FiringScope {
            target: self,
            depth,
        };

        let mut fired_listener = false;
        loop {
            if event.immediate_propagation_stopped() {
                break;
            }

            let registered = {
                let mut data = self.data.borrow_mut();
                let Some(data) = data.as_mut() else {
                    break;
                };
                let EventTargetData {
                    listeners,
                    capture_listeners,
                    firing_iterators,
                } = data;
                let registry = if capture { capture_listeners } else { listeners };
                let Some(iterator) = firing_iterators.get_mut(depth) else {
                    break;
                };
                if iterator.cursor >= iterator.end {
                    break;
                }
                let index = iterator.cursor;
                // Must advance before invoking; see remove_event_listener_internal.
                iterator.cursor += 1;
                registry
                    .find(&event_type)
                    .and_then(|listeners| listeners.get(index))
                    .cloned()
            };
            let Some(registered) = registered else {
                break;
            };

            if !registered.should_fire(event) {
                continue;
            }

            let callback = registered.callback().clone();
            if registered.once() {
                self.remove_event_listener_internal(&event_type, &callback, registered.capture());
            }

            event.set_handling_passive(registered.passive_mode());
            if let Err(err) = callback.invoke(&context, event) {
                context.report_error(err);
            }
            fired_listener = true;
            event.set_handling_passive(PassiveMode::NotPassive);
        }

        fired_listener
    }

    fn add_event_listener_internal(
        &self,
        event_type: &str,
        listener: &ListenerRef,
        options: AddEventListenerOptions,
    ) -> bool {
        let Some(context) = self.context() else {
            return false;
        };
        context.assert_thread();

        let outcome = {
            let mut data = self.data.borrow_mut();
            data.get_or_insert_with(EventTargetData::default)
                .registry_mut(options.capture)
                .add(event_type, listener.clone(), &options)
        };

        if outcome.added && outcome.listener_count == 1 {
            context.add_command(
                CommandKind::AddEvent,
                event_type,
                self.id,
                CommandPayload::Listener(options.into()),
            );
        }

        outcome.added
    }

    fn remove_event_listener_internal(
        &self,
        event_type: &str,
        listener: &ListenerRef,
        capture: bool,
    ) -> bool {
        let outcome = {
            let mut data = self.data.borrow_mut();
            let Some(data) = data.as_mut() else {
                return false;
            };
            let Some(outcome) = data.registry_mut(capture).remove(event_type, listener, capture)
            else {
                return false;
            };

            // Walks planning to reach the removed slot have one less listener to
            // visit; walks already past it must step back to stay on the same
            // next listener.
            for iterator in data.firing_iterators.iter_mut() {
                if iterator.capture != capture || iterator.event_type != event_type {
                    continue;
                }
                if outcome.index >= iterator.end {
                    continue;
                }
                iterator.end -= 1;
                if outcome.index < iterator.cursor {
                    iterator.cursor -= 1;
                }
            }
            outcome
        };

        if outcome.listener_count == 0 {
            if let Some(context) = self.context() {
                context.add_command(
                    CommandKind::RemoveEvent,
                    event_type,
                    self.id,
                    CommandPayload::Capture { capture },
                );
            }
        }

        true
    }

    /// Snapshot of the non-capturing listeners for `event_type`.
    pub fn event_listeners(&self, event_type: &str) -> Vec<RegisteredListener> {
        self.with_event_target_data(|data| {
            data.registry(false)
                .find(event_type)
                .map(<[_]>::to_vec)
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    pub fn has_event_listeners(&self, event_type: &str) -> bool {
        self.with_event_target_data(|data| {
            data.registry(false).contains(event_type) || data.registry(true).contains(event_type)
        })
        .unwrap_or(false)
    }

    /// Install, replace or clear the `on<type>` handler for `event_type`.
    pub fn set_attribute_event_listener(
        &self,
        event_type: &str,
        listener: Option<ListenerRef>,
    ) -> bool {
        self.assert_owner_thread();
        let existing = self.attribute_event_listener(event_type);
        match (listener, existing) {
            (None, Some(existing)) => {
                self.remove_event_listener_internal(event_type, &existing, false);
                false
            }
            (None, None) => false,
            (Some(listener), Some(existing)) => {
                let already_registered = self
                    .with_event_target_data(|data| {
                        data.registry(false).find(event_type).is_some_and(|listeners| {
                            listeners
                                .iter()
                                .any(|registered| registered.matches(&listener, false))
                        })
                    })
                    .unwrap_or(false);
                if already_registered && listener != existing {
                    // The callback keeps its own slot; a second one would fire it twice.
                    self.remove_event_listener_internal(event_type, &existing, false);
                    return true;
                }
                let mut data = self.data.borrow_mut();
                let slot = data
                    .as_mut()
                    .and_then(|data| data.listeners.find_mut(event_type))
                    .and_then(|listeners| {
                        listeners
                            .iter_mut()
                            .find(|registered| registered.callback().is_event_handler())
                    });
                match slot {
                    Some(registered) => {
                        registered.set_callback(listener);
                        true
                    }
                    None => false,
                }
            }
            (Some(listener), None) => {
                self.add_event_listener_internal(event_type, &listener, AddEventListenerOptions::default())
            }
        }
    }

    pub fn attribute_event_listener(&self, event_type: &str) -> Option<ListenerRef> {
        self.context()?;
        self.with_event_target_data(|data| {
            data.registry(false).find(event_type).and_then(|listeners| {
                listeners
                    .iter()
                    .find(|registered| registered.callback().is_event_handler())
                    .map(|registered| registered.callback().clone())
            })
        })
        .flatten()
    }

    /// Entry point for calls the host makes on this target.
    pub fn handle_call_from_host(&self, method: &str, args: &[NativeValue]) -> NativeValue {
        let Some(context) = self.context() else {
            return NativeValue::Null;
        };
        if !context.is_valid() {
            return NativeValue::Null;
        }
        context.assert_thread();

        match method {
            call_methods::DISPATCH_EVENT => self.handle_dispatch_event_from_host(&context, args),
            call_methods::SYNC_PROPERTIES_AND_METHODS => {
                self.handle_sync_properties_and_methods(&context, args)
            }
            _ => {
                tracing::debug!(target: "bridge", method, target_id = %self.id, "unhandled host call");
                NativeValue::Null
            }
        }
    }

    fn handle_dispatch_event_from_host(
        &self,
        context: &ExecutingContext,
        args: &[NativeValue],
    ) -> NativeValue {
        assert!(
            args.len() >= 3,
            "dispatchEvent expects [type, event, capture], got {} arguments",
            args.len()
        );
        let event_type = args[0].expect_str("event type");
        let raw_event = args[1].expect_raw_event("raw event");
        let capture = args[2].expect_bool("capture flag");

        let event = EventFactory::create(event_type, raw_event);
        event.set_current_target(Some(self.id));
        assert!(event.target().is_some(), "host event without a target");

        event.set_trusted(false);
        let result = {
            let _dispatch = event.begin_dispatch();
            event.set_event_phase(EventPhase::AtTarget);
            let result = self.fire_event_listeners(&event, capture);
            event.set_event_phase(EventPhase::None);
            result
        };

        let propagation_stopped = event.propagation_stopped();
        let wire = context.wire_event(event);
        NativeValue::DispatchResult(Box::new(EventDispatchResult {
            canceled: result == DispatchEventResult::CanceledByEventHandler,
            propagation_stopped,
            event: wire,
        }))
    }

    fn handle_sync_properties_and_methods(
        &self,
        context: &ExecutingContext,
        args: &[NativeValue],
    ) -> NativeValue {
        assert_eq!(
            args.len(),
            3,
            "syncPropertiesAndMethods expects [properties, methods, async methods]"
        );
        assert!(
            context.target_shape(&self.class_name).is_none(),
            "shape for {} was already synced",
            self.class_name
        );

        let shape = TargetShape::new(
            args[0].expect_string_list("properties"),
            args[1].expect_string_list("methods"),
            args[2].expect_string_list("async methods"),
        );
        context.set_target_shape(&self.class_name, shape);
        NativeValue::Bool(true)
    }

    fn shape(&self, context: &ExecutingContext) -> Option<Rc<TargetShape>> {
        if let Some(shape) = self.shape.borrow().as_ref() {
            return Some(Rc::clone(shape));
        }
        let shape = context.target_shape(&self.class_name)?;
        self.shape.replace(Some(Rc::clone(&shape)));
        Some(shape)
    }

    /// Resolve a named property against the host-provided class shape.
    pub fn item(&self, key: &str) -> PropertyLookup {
        self.assert_owner_thread();
        if let Some(value) = self.unimplemented_properties.borrow().get(key) {
            return PropertyLookup::Unimplemented(value.clone());
        }
        let Some(context) = self.context() else {
            return PropertyLookup::Undefined;
        };

        // The host can only sync a shape for targets it has been told about.
        if context.target_shape(&self.class_name).is_none() {
            context.flush_commands();
        }

        if key == TO_STRING_TAG {
            return PropertyLookup::ToStringTag(self.class_name.clone());
        }

        match self.shape(&context) {
            Some(shape) => shape.classify(key),
            None => PropertyLookup::Undefined,
        }
    }

    pub fn set_item(&self, key: &str, value: JsonValue) -> SetItemOutcome {
        let Some(context) = self.context() else {
            return SetItemOutcome::Detached;
        };
        context.assert_thread();
        if context.target_shape(&self.class_name).is_none() {
            context.flush_commands();
        }

        let is_built_in = self
            .shape(&context)
            .is_some_and(|shape| shape.has_property(key));
        if is_built_in {
            context.add_command(
                CommandKind::SetProperty,
                key,
                self.id,
                CommandPayload::Value { value },
            );
            return SetItemOutcome::Forwarded;
        }

        self.unimplemented_properties
            .borrow_mut()
            .insert(key.to_string(), value);
        SetItemOutcome::Stored
    }

    pub fn delete_item(&self, key: &str) -> bool {
        self.assert_owner_thread();
        self.unimplemented_properties.borrow_mut().remove(key);
        true
    }

    /// Queue a call of a host-side method on this target.
    pub fn call_method(&self, method: &str, args: Vec<JsonValue>) -> bool {
        let Some(context) = self.context() else {
            return false;
        };
        context.assert_thread();
        context.add_command(
            CommandKind::CallMethod,
            method,
            self.id,
            CommandPayload::Arguments { args },
        );
        true
    }

    /// Drop every listener, used on context teardown.
    pub(crate) fn clear_listeners(&self) {
        if let Ok(mut data) = self.data.try_borrow_mut() {
            if let Some(data) = data.as_mut() {
                data.listeners.clear();
                data.capture_listeners.clear();
            }
        }
    }
}

impl Drop for EventTarget {
    fn drop(&mut self) {
        if let Some(context) = self.context.upgrade() {
            context.unregister_target(self.id);
        }
    }
}

impl std::fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTarget")
            .field("id", &self.id)
            .field("class_name", &self.class_name)
            .finish_non_exhaustive()
    }
}
