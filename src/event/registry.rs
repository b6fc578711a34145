use super::listener::{AddEventListenerOptions, ListenerRef, RegisteredListener};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: bool,
    /// Listeners registered for the event type after the call.
    pub listener_count: usize,
}

#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    /// Position the listener occupied before removal.
    pub index: usize,
    pub listener_count: usize,
    pub removed: RegisteredListener,
}

/// Listeners of one phase, grouped by event type in insertion order.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    entries: Vec<(String, Vec<RegisteredListener>)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.entries.iter().any(|(ty, _)| ty == event_type)
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(ty, _)| ty.as_str())
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.find(event_type).map_or(0, <[_]>::len)
    }

    pub fn add(
        &mut self,
        event_type: &str,
        callback: ListenerRef,
        options: &AddEventListenerOptions,
    ) -> AddOutcome {
        let listeners = match self.entries.iter().position(|(ty, _)| ty == event_type) {
            Some(index) => &mut self.entries[index].1,
            None => {
                self.entries.push((event_type.to_string(), Vec::new()));
                let last = self.entries.len() - 1;
                &mut self.entries[last].1
            }
        };

        if listeners
            .iter()
            .any(|registered| registered.matches(&callback, options.capture))
        {
            return AddOutcome {
                added: false,
                listener_count: listeners.len(),
            };
        }

        listeners.push(RegisteredListener::new(callback, options));
        AddOutcome {
            added: true,
            listener_count: listeners.len(),
        }
    }

    pub fn remove(
        &mut self,
        event_type: &str,
        callback: &ListenerRef,
        capture: bool,
    ) -> Option<RemoveOutcome> {
        let entry_index = self.entries.iter().position(|(ty, _)| ty == event_type)?;
        let listeners = &mut self.entries[entry_index].1;
        let index = listeners
            .iter()
            .position(|registered| registered.matches(callback, capture))?;

        let removed = listeners.remove(index);
        let listener_count = listeners.len();
        if listener_count == 0 {
            self.entries.remove(entry_index);
        }

        Some(RemoveOutcome {
            index,
            listener_count,
            removed,
        })
    }

    pub fn find(&self, event_type: &str) -> Option<&[RegisteredListener]> {
        self.entries
            .iter()
            .find(|(ty, _)| ty == event_type)
            .map(|(_, listeners)| listeners.as_slice())
    }

    pub(crate) fn find_mut(&mut self, event_type: &str) -> Option<&mut [RegisteredListener]> {
        self.entries
            .iter_mut()
            .find(|(ty, _)| ty == event_type)
            .map(|(_, listeners)| listeners.as_mut_slice())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
