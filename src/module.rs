use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value as JsonValue;

use crate::context::ExecutingContext;
use crate::error::ScriptError;

/// Result of a host module call: the JSON response or the host's error text.
pub type ModuleResult = Result<JsonValue, String>;

pub trait ModuleCallback {
    fn handle(&self, context: &ExecutingContext, result: ModuleResult) -> Result<(), ScriptError>;
}

impl<F> ModuleCallback for F
where
    F: Fn(&ExecutingContext, ModuleResult) -> Result<(), ScriptError>,
{
    fn handle(&self, context: &ExecutingContext, result: ModuleResult) -> Result<(), ScriptError> {
        self(context, result)
    }
}

/// Callbacks parked until the host answers an `invokeModule` call.
#[derive(Default)]
pub struct ModuleCallbackCoordinator {
    next_id: i64,
    pending: HashMap<i64, Rc<dyn ModuleCallback>>,
}

impl ModuleCallbackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn park(&mut self, callback: Rc<dyn ModuleCallback>) -> i64 {
        self.next_id += 1;
        self.pending.insert(self.next_id, callback);
        self.next_id
    }

    /// Remove the callback for `id`. Each callback is handed out once.
    pub fn take(&mut self, id: i64) -> Option<Rc<dyn ModuleCallback>> {
        self.pending.remove(&id)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl std::fmt::Debug for ModuleCallbackCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCallbackCoordinator")
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_taken_once() {
        let mut coordinator = ModuleCallbackCoordinator::new();
        let noop: Rc<dyn ModuleCallback> =
            Rc::new(|_: &ExecutingContext, _: ModuleResult| -> Result<(), ScriptError> { Ok(()) });
        let first = coordinator.park(Rc::clone(&noop));
        let second = coordinator.park(noop);
        assert_ne!(first, second);
        assert!(coordinator.take(first).is_some());
        assert!(coordinator.take(first).is_none());
        assert_eq!(coordinator.len(), 1);
    }
}
