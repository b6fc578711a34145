use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::context::ExecutingContext;
use crate::error::ScriptError;

/// A script callable run by a timer.
pub trait ScriptCallback {
    fn call(&self, context: &ExecutingContext) -> Result<(), ScriptError>;
}

impl<F> ScriptCallback for F
where
    F: Fn(&ExecutingContext) -> Result<(), ScriptError>,
{
    fn call(&self, context: &ExecutingContext) -> Result<(), ScriptError> {
        self(context)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Once,
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Pending,
    Executing,
    Finished,
    Canceled,
    Terminated,
}

pub struct Timer {
    kind: TimerKind,
    timer_id: Cell<i32>,
    status: Cell<TimerStatus>,
    callback: RefCell<Option<Rc<dyn ScriptCallback>>>,
    context: Weak<ExecutingContext>,
}

impl Timer {
    pub fn new(
        context: &Rc<ExecutingContext>,
        callback: Rc<dyn ScriptCallback>,
        kind: TimerKind,
    ) -> Rc<Self> {
        Rc::new(Self {
            kind,
            timer_id: Cell::new(-1),
            status: Cell::new(TimerStatus::Pending),
            callback: RefCell::new(Some(callback)),
            context: Rc::downgrade(context),
        })
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn timer_id(&self) -> i32 {
        self.timer_id.get()
    }

    pub fn status(&self) -> TimerStatus {
        self.status.get()
    }

    /// Run the callback once. Returns `false` when the timer is no longer
    /// runnable or its context is gone.
    pub fn fire(&self) -> bool {
        if matches!(
            self.status.get(),
            TimerStatus::Finished | TimerStatus::Canceled | TimerStatus::Terminated
        ) {
            return false;
        }
        let Some(callback) = self.callback.borrow().clone() else {
            return false;
        };
        let Some(context) = self.context.upgrade() else {
            return false;
        };

        self.status.set(TimerStatus::Executing);
        if let Err(err) = callback.call(&context) {
            context.report_error(err);
        }

        // The callback may have cleared or terminated its own timer.
        if self.status.get() == TimerStatus::Executing {
            self.status.set(match self.kind {
                TimerKind::Once => TimerStatus::Finished,
                TimerKind::Multiple => TimerStatus::Pending,
            });
        }
        true
    }

    pub fn terminate(&self) {
        self.status.set(TimerStatus::Terminated);
        self.callback.replace(None);
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("timer_id", &self.timer_id.get())
            .field("kind", &self.kind)
            .field("status", &self.status.get())
            .finish()
    }
}

/// Timers of one context, keyed by the id handed to script.
#[derive(Debug, Default)]
pub struct TimerCoordinator {
    active: HashMap<i32, Rc<Timer>>,
}

impl TimerCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install_new_timer(&mut self, timer_id: i32, timer: Rc<Timer>) {
        timer.timer_id.set(timer_id);
        tracing::debug!(target: "timer", timer_id, kind = ?timer.kind, "timer installed");
        if let Some(previous) = self.active.insert(timer_id, timer) {
            previous.terminate();
        }
    }

    /// Normal retirement. A timer that has not finished is marked canceled.
    pub fn remove_timeout_by_id(&mut self, timer_id: i32) -> Option<Rc<Timer>> {
        let timer = self.active.remove(&timer_id)?;
        if matches!(timer.status(), TimerStatus::Pending | TimerStatus::Executing) {
            timer.status.set(TimerStatus::Canceled);
        }
        Some(timer)
    }

    /// Terminate the timer even if its callback is on the stack.
    pub fn force_stop_timeout_by_id(&mut self, timer_id: i32) -> bool {
        match self.active.remove(&timer_id) {
            Some(timer) => {
                timer.terminate();
                tracing::debug!(target: "timer", timer_id, "timer force stopped");
                true
            }
            None => false,
        }
    }

    pub fn get_timer_by_id(&self, timer_id: i32) -> Option<Rc<Timer>> {
        self.active.get(&timer_id).cloned()
    }

    pub fn force_stop_all(&mut self) {
        for (_, timer) in self.active.drain() {
            timer.terminate();
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;

    fn counting(count: &Rc<Cell<u32>>) -> Rc<dyn ScriptCallback> {
        let count = Rc::clone(count);
        Rc::new(move |_: &ExecutingContext| -> Result<(), ScriptError> {
            count.set(count.get() + 1);
            Ok(())
        })
    }

    #[test]
    fn once_timer_finishes_after_fire() {
        let context = ExecutingContext::detached(BridgeConfig::default());
        let count = Rc::new(Cell::new(0));
        let timer = Timer::new(&context, counting(&count), TimerKind::Once);

        assert!(timer.fire());
        assert_eq!(timer.status(), TimerStatus::Finished);
        assert!(!timer.fire());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn interval_timer_returns_to_pending() {
        let context = ExecutingContext::detached(BridgeConfig::default());
        let count = Rc::new(Cell::new(0));
        let timer = Timer::new(&context, counting(&count), TimerKind::Multiple);

        assert!(timer.fire());
        assert!(timer.fire());
        assert_eq!(timer.status(), TimerStatus::Pending);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn terminate_is_idempotent_and_blocks_fire() {
        let context = ExecutingContext::detached(BridgeConfig::default());
        let count = Rc::new(Cell::new(0));
        let timer = Timer::new(&context, counting(&count), TimerKind::Multiple);

        timer.terminate();
        timer.terminate();
        assert_eq!(timer.status(), TimerStatus::Terminated);
        assert!(!timer.fire());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn coordinator_lookup_and_removal() {
        let context = ExecutingContext::detached(BridgeConfig::default());
        let count = Rc::new(Cell::new(0));
        let mut coordinator = TimerCoordinator::new();
        coordinator.install_new_timer(1, Timer::new(&context, counting(&count), TimerKind::Once));
        coordinator.install_new_timer(2, Timer::new(&context, counting(&count), TimerKind::Once));

        assert_eq!(coordinator.get_timer_by_id(1).unwrap().timer_id(), 1);
        let removed = coordinator.remove_timeout_by_id(1).unwrap();
        assert_eq!(removed.status(), TimerStatus::Canceled);
        assert!(coordinator.get_timer_by_id(1).is_none());

        let second = coordinator.get_timer_by_id(2).unwrap();
        assert!(coordinator.force_stop_timeout_by_id(2));
        assert!(!coordinator.force_stop_timeout_by_id(2));
        assert!(!second.fire());
        assert!(coordinator.is_empty());
    }

    #[test]
    fn callback_error_is_reported() {
        let context = ExecutingContext::detached(BridgeConfig::default());
        let timer = Timer::new(
            &context,
            Rc::new(|_: &ExecutingContext| -> Result<(), ScriptError> {
                Err(ScriptError::new("tick failed"))
            }),
            TimerKind::Once,
        );
        assert!(timer.fire());
        let errors = context.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "tick failed");
    }
}
