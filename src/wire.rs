use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opaque identity of a value lent to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireId(u64);

impl WireId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire#{}", self.0)
    }
}

/// Liveness table shared between the script thread and the host finalizer.
///
/// Only liveness lives here. The script-side value behind an id stays owned by
/// the script thread, which drops it once [`WireTable::is_alive`] turns false.
/// Dead ids are remembered so an entry goes from live to dead exactly once.
#[derive(Debug)]
pub struct WireTable {
    next_id: AtomicU64,
    entries: Mutex<HashMap<WireId, bool>>,
}

impl WireTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        })
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<WireId, bool>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh id and mark it live.
    pub fn allocate(&self) -> WireId {
        let id = WireId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.watch(id);
        id
    }

    /// Mark `id` live. No-op for an id that is already watched or was deleted.
    pub fn watch(&self, id: WireId) {
        self.entries().entry(id).or_insert(true);
    }

    pub fn is_alive(&self, id: WireId) -> bool {
        self.entries().get(&id).copied().unwrap_or(false)
    }

    /// Mark `id` dead. Returns `true` only for the call that performed the
    /// transition; later calls from either side are no-ops.
    pub fn delete(&self, id: WireId) -> bool {
        let released = match self.entries().get_mut(&id) {
            Some(alive) if *alive => {
                *alive = false;
                true
            }
            _ => false,
        };
        if released {
            tracing::debug!(target: "wire", wire = %id, "wire released");
        }
        released
    }

    pub fn live_count(&self) -> usize {
        self.entries().values().filter(|alive| **alive).count()
    }
}

/// Host-held reference to a wired value. Dropping it is the host finalizer.
#[derive(Debug)]
pub struct WireHandle {
    id: WireId,
    table: Arc<WireTable>,
}

impl WireHandle {
    pub fn new(table: Arc<WireTable>) -> Self {
        let id = table.allocate();
        Self { id, table }
    }

    pub fn id(&self) -> WireId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.table.is_alive(self.id)
    }
}

impl Drop for WireHandle {
    fn drop(&mut self) {
        self.table.delete(self.id);
    }
}
