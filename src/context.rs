use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use serde_json::{json, Value as JsonValue};

use crate::binding::{host_methods, TargetId};
use crate::command::{
    Command, CommandBuffer, CommandKind, CommandPayload, DetachedTransport, HostTransport,
};
use crate::config::BridgeConfig;
use crate::error::ScriptError;
use crate::event::{Event, EventTarget};
use crate::module::{ModuleCallback, ModuleCallbackCoordinator, ModuleResult};
use crate::native::NativeValue;
use crate::shape::TargetShape;
use crate::timer::{ScriptCallback, Timer, TimerCoordinator, TimerKind};
use crate::wire::{WireHandle, WireId, WireTable};

/// One script execution context: the owner of every target, timer, pending
/// command and wired value created on its thread.
pub struct ExecutingContext {
    owner_thread: ThreadId,
    config: BridgeConfig,
    valid: Cell<bool>,
    command_buffer: RefCell<CommandBuffer>,
    transport: RefCell<Box<dyn HostTransport>>,
    wires: Arc<WireTable>,
    wired_events: RefCell<HashMap<WireId, Rc<Event>>>,
    timers: RefCell<TimerCoordinator>,
    module_callbacks: RefCell<ModuleCallbackCoordinator>,
    errors: RefCell<VecDeque<ScriptError>>,
    shapes: RefCell<HashMap<String, Rc<TargetShape>>>,
    targets: RefCell<HashMap<TargetId, Weak<EventTarget>>>,
    next_target_id: Cell<u64>,
    next_timer_id: Cell<i32>,
}

impl ExecutingContext {
    pub fn new(config: BridgeConfig, transport: impl HostTransport + 'static) -> Rc<Self> {
        let command_buffer = CommandBuffer::with_capacity(config.command_buffer_capacity);
        let transport: Box<dyn HostTransport> = Box::new(transport);
        Rc::new(Self {
            owner_thread: thread::current().id(),
            config,
            valid: Cell::new(true),
            command_buffer: RefCell::new(command_buffer),
            transport: RefCell::new(transport),
            wires: WireTable::new(),
            wired_events: RefCell::new(HashMap::new()),
            timers: RefCell::new(TimerCoordinator::new()),
            module_callbacks: RefCell::new(ModuleCallbackCoordinator::new()),
            errors: RefCell::new(VecDeque::new()),
            shapes: RefCell::new(HashMap::new()),
            targets: RefCell::new(HashMap::new()),
            next_target_id: Cell::new(TargetId::GLOBAL.0 + 1),
            next_timer_id: Cell::new(1),
        })
    }

    /// A context whose flushed batches go nowhere.
    pub fn detached(config: BridgeConfig) -> Rc<Self> {
        Self::new(config, DetachedTransport)
    }

    pub fn assert_thread(&self) {
        assert_eq!(
            thread::current().id(),
            self.owner_thread,
            "executing context used off its owner thread"
        );
    }

    pub fn is_valid(&self) -> bool {
        self.valid.get()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    // Commands

    pub fn add_command(
        &self,
        kind: CommandKind,
        key: impl Into<String>,
        target: TargetId,
        payload: CommandPayload,
    ) {
        if !self.is_valid() {
            tracing::warn!(target: "command", ?kind, target_id = %target, "command on disposed context dropped");
            return;
        }
        self.command_buffer
            .borrow_mut()
            .add_command(kind, key, target, payload);
    }

    pub fn pending_command_count(&self) -> usize {
        self.command_buffer.borrow().len()
    }

    pub fn pending_commands(&self) -> Vec<Command> {
        self.command_buffer.borrow().pending().to_vec()
    }

    /// Hand every pending command to the host in append order, then drop
    /// wired values the host has released. Returns the batch size.
    pub fn flush_commands(&self) -> usize {
        self.assert_thread();
        let batch = self.command_buffer.borrow_mut().take();
        let count = batch.len();
        if count > 0 {
            match self.transport.borrow_mut().flush(batch) {
                Ok(()) => tracing::debug!(target: "command", count, "command batch flushed"),
                Err(err) => {
                    tracing::error!(target: "command", count, error = %err, "failed to flush command batch")
                }
            }
        }
        self.reclaim_wires();
        count
    }

    // Errors

    /// Record a failure raised by a script callback. The oldest entries are
    /// dropped beyond `max_reported_errors`.
    pub fn report_error(&self, err: ScriptError) {
        tracing::error!(
            target: "bridge",
            error = %err,
            stack = err.stack.as_deref().unwrap_or(""),
            "uncaught script error"
        );
        let limit = self.config.max_reported_errors;
        if limit == 0 {
            return;
        }
        let mut errors = self.errors.borrow_mut();
        while errors.len() >= limit {
            errors.pop_front();
        }
        errors.push_back(err);
    }

    pub fn take_errors(&self) -> Vec<ScriptError> {
        self.errors.borrow_mut().drain(..).collect()
    }

    // Wires

    pub fn wire_table(&self) -> Arc<WireTable> {
        Arc::clone(&self.wires)
    }

    /// Lend `event` to the host. The event stays alive until the returned
    /// handle is dropped and the next reclaim runs.
    pub fn wire_event(&self, event: Rc<Event>) -> WireHandle {
        let handle = WireHandle::new(Arc::clone(&self.wires));
        self.wired_events.borrow_mut().insert(handle.id(), event);
        handle
    }

    pub fn wired_event(&self, id: WireId) -> Option<Rc<Event>> {
        if !self.wires.is_alive(id) {
            return None;
        }
        self.wired_events.borrow().get(&id).cloned()
    }

    pub fn reclaim_wires(&self) -> usize {
        let mut wired = self.wired_events.borrow_mut();
        let before = wired.len();
        wired.retain(|id, _| self.wires.is_alive(*id));
        let reclaimed = before - wired.len();
        if reclaimed > 0 {
            tracing::debug!(target: "wire", reclaimed, "wired events reclaimed");
        }
        reclaimed
    }

    pub fn wired_event_count(&self) -> usize {
        self.wired_events.borrow().len()
    }

    // Timers

    // Ids wrap back to 1 and skip any that are still installed.
    fn allocate_timer_id(&self) -> i32 {
        let timers = self.timers.borrow();
        loop {
            let id = self.next_timer_id.get();
            self.next_timer_id.set(id.wrapping_add(1).max(1));
            if timers.get_timer_by_id(id).is_none() {
                return id;
            }
        }
    }

    pub fn set_timeout(
        self: &Rc<Self>,
        callback: Rc<dyn ScriptCallback>,
        delay_ms: i64,
    ) -> i32 {
        self.install_timer(callback, delay_ms, TimerKind::Once)
    }

    pub fn set_interval(
        self: &Rc<Self>,
        callback: Rc<dyn ScriptCallback>,
        delay_ms: i64,
    ) -> i32 {
        self.install_timer(callback, delay_ms, TimerKind::Multiple)
    }

    fn install_timer(
        self: &Rc<Self>,
        callback: Rc<dyn ScriptCallback>,
        delay_ms: i64,
        kind: TimerKind,
    ) -> i32 {
        self.assert_thread();
        let timer_id = self.allocate_timer_id();
        let timer = Timer::new(self, callback, kind);
        self.timers.borrow_mut().install_new_timer(timer_id, timer);

        let method = match kind {
            TimerKind::Once => host_methods::SET_TIMEOUT,
            TimerKind::Multiple => host_methods::SET_INTERVAL,
        };
        self.add_command(
            CommandKind::CallMethod,
            method,
            TargetId::GLOBAL,
            CommandPayload::Arguments {
                args: vec![json!(timer_id), json!(delay_ms.max(0))],
            },
        );
        timer_id
    }

    /// `clearTimeout` / `clearInterval`. Unknown ids are ignored.
    pub fn clear_timer(&self, timer_id: i32) -> bool {
        self.assert_thread();
        if !self.timers.borrow_mut().force_stop_timeout_by_id(timer_id) {
            return false;
        }
        self.add_command(
            CommandKind::CallMethod,
            host_methods::CLEAR_TIMEOUT,
            TargetId::GLOBAL,
            CommandPayload::Arguments {
                args: vec![json!(timer_id)],
            },
        );
        true
    }

    /// Called by the host when timer `timer_id` is due.
    pub fn fire_timer(&self, timer_id: i32) -> bool {
        self.assert_thread();
        if !self.is_valid() {
            return false;
        }
        let Some(timer) = self.timers.borrow().get_timer_by_id(timer_id) else {
            return false;
        };
        let fired = timer.fire();
        if timer.kind() == TimerKind::Once {
            let mut timers = self.timers.borrow_mut();
            // The callback may have replaced the id with a fresh timer.
            if timers
                .get_timer_by_id(timer_id)
                .is_some_and(|current| Rc::ptr_eq(&current, &timer))
            {
                timers.remove_timeout_by_id(timer_id);
            }
        }
        fired
    }

    pub fn active_timer_count(&self) -> usize {
        self.timers.borrow().len()
    }

    // Modules

    /// Ask the host to run `module.method(params)`. `callback` receives the
    /// answer passed to [`handle_module_response`](Self::handle_module_response).
    pub fn invoke_module(
        &self,
        module: &str,
        method: &str,
        params: JsonValue,
        callback: Rc<dyn ModuleCallback>,
    ) -> i64 {
        self.assert_thread();
        let callback_id = self.module_callbacks.borrow_mut().park(callback);
        self.add_command(
            CommandKind::CallMethod,
            host_methods::INVOKE_MODULE,
            TargetId::GLOBAL,
            CommandPayload::Arguments {
                args: vec![json!(callback_id), json!(module), json!(method), params],
            },
        );
        callback_id
    }

    pub fn handle_module_response(&self, callback_id: i64, result: ModuleResult) -> bool {
        self.assert_thread();
        let Some(callback) = self.module_callbacks.borrow_mut().take(callback_id) else {
            tracing::debug!(target: "bridge", callback_id, "no module callback parked");
            return false;
        };
        if let Err(err) = callback.handle(self, result) {
            self.report_error(err);
        }
        true
    }

    pub fn pending_module_callbacks(&self) -> usize {
        self.module_callbacks.borrow().len()
    }

    // Shapes

    pub fn target_shape(&self, class_name: &str) -> Option<Rc<TargetShape>> {
        self.shapes.borrow().get(class_name).cloned()
    }

    pub fn set_target_shape(&self, class_name: &str, shape: TargetShape) {
        self.shapes
            .borrow_mut()
            .insert(class_name.to_string(), Rc::new(shape));
    }

    // Targets

    pub(crate) fn allocate_target_id(&self) -> TargetId {
        let id = self.next_target_id.get();
        self.next_target_id.set(id + 1);
        TargetId(id)
    }

    pub(crate) fn register_target(&self, target: &Rc<EventTarget>) {
        self.targets
            .borrow_mut()
            .insert(target.id(), Rc::downgrade(target));
    }

    pub(crate) fn unregister_target(&self, id: TargetId) {
        if let Ok(mut targets) = self.targets.try_borrow_mut() {
            targets.remove(&id);
        }
    }

    pub fn target(&self, id: TargetId) -> Option<Rc<EventTarget>> {
        self.targets.borrow().get(&id).and_then(Weak::upgrade)
    }

    /// Route a host call to the target it addresses. Returns `Null` when the
    /// context is disposed or the target is gone.
    pub fn handle_call_from_host(
        &self,
        target_id: TargetId,
        method: &str,
        args: &[NativeValue],
    ) -> NativeValue {
        if !self.is_valid() {
            tracing::warn!(target: "bridge", method, target_id = %target_id, "host call on disposed context");
            return NativeValue::Null;
        }
        match self.target(target_id) {
            Some(target) => target.handle_call_from_host(method, args),
            None => {
                tracing::debug!(target: "bridge", method, target_id = %target_id, "host call on unknown target");
                NativeValue::Null
            }
        }
    }

    /// Tear the context down. Further host calls return `Null` and further
    /// commands are dropped.
    pub fn dispose(&self) {
        self.assert_thread();
        if !self.valid.replace(false) {
            return;
        }

        self.timers.borrow_mut().force_stop_all();
        self.module_callbacks.borrow_mut().clear();

        let wired: Vec<_> = self.wired_events.borrow_mut().drain().collect();
        for (id, _) in &wired {
            self.wires.delete(*id);
        }
        drop(wired);

        let targets: Vec<_> = self
            .targets
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        for target in &targets {
            target.clear_listeners();
        }
        drop(targets);

        self.command_buffer.borrow_mut().clear();
        tracing::debug!(target: "bridge", "executing context disposed");
    }
}

impl std::fmt::Debug for ExecutingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutingContext")
            .field("valid", &self.valid.get())
            .field("pending_commands", &self.command_buffer.borrow().len())
            .field("wired_events", &self.wired_events.borrow().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ChannelTransport;
    use crate::event::EventInit;

    #[test]
    fn error_channel_is_bounded() {
        let config = BridgeConfig {
            max_reported_errors: 2,
            ..BridgeConfig::default()
        };
        let context = ExecutingContext::detached(config);
        for message in ["a", "b", "c"] {
            context.report_error(ScriptError::new(message));
        }
        let messages: Vec<_> = context
            .take_errors()
            .into_iter()
            .map(|err| err.message)
            .collect();
        assert_eq!(messages, vec!["b", "c"]);
        assert!(context.take_errors().is_empty());
    }

    #[test]
    fn flush_reclaims_released_wires() {
        let context = ExecutingContext::detached(BridgeConfig::default());
        let handle = context.wire_event(Event::new("x", EventInit::default()));
        let id = handle.id();
        assert!(context.wired_event(id).is_some());

        drop(handle);
        assert!(context.wired_event(id).is_none());
        assert_eq!(context.wired_event_count(), 1);
        context.flush_commands();
        assert_eq!(context.wired_event_count(), 0);
    }

    #[test]
    fn dispose_marks_wires_dead_and_drops_commands() {
        let (transport, mut receiver) = ChannelTransport::new();
        let context = ExecutingContext::new(BridgeConfig::default(), transport);
        let target = EventTarget::create(&context, "div");
        let handle = context.wire_event(Event::new("x", EventInit::default()));

        context.dispose();
        assert!(!context.is_valid());
        assert!(!handle.is_alive());
        assert_eq!(context.pending_command_count(), 0);

        assert!(target.call_method("focus", Vec::new()));
        assert_eq!(context.pending_command_count(), 0);
        assert_eq!(context.flush_commands(), 0);
        assert!(receiver.try_recv().is_err());

        let result = context.handle_call_from_host(target.id(), "dispatchEvent", &[]);
        assert!(result.is_null());
    }

    #[test]
    fn wrapped_timer_ids_skip_live_timers() {
        let context = ExecutingContext::detached(BridgeConfig::default());
        let fired = Rc::new(Cell::new(0));
        let fired_in = Rc::clone(&fired);
        let first = context.set_interval(
            Rc::new(move |_: &ExecutingContext| -> Result<(), ScriptError> {
                fired_in.set(fired_in.get() + 1);
                Ok(())
            }),
            5,
        );
        assert_eq!(first, 1);

        context.next_timer_id.set(i32::MAX);
        let noop: Rc<dyn ScriptCallback> =
            Rc::new(|_: &ExecutingContext| -> Result<(), ScriptError> { Ok(()) });
        let last = context.set_timeout(Rc::clone(&noop), 0);
        assert_eq!(last, i32::MAX);
        let wrapped = context.set_timeout(noop, 0);
        assert_eq!(wrapped, 2);

        assert!(context.fire_timer(first));
        assert_eq!(fired.get(), 1);
        assert_eq!(context.active_timer_count(), 3);
    }

    #[test]
    fn dropped_target_is_unregistered() {
        let context = ExecutingContext::detached(BridgeConfig::default());
        let target = EventTarget::create(&context, "div");
        let id = target.id();
        assert!(context.target(id).is_some());
        drop(target);
        assert!(context.target(id).is_none());
    }
}
