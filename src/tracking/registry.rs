//! Process-wide registry of last-known resource states.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;

use crate::tracking::resource::{ResourceId, ResourceStateRecord, UsageState};

/// Ground truth for resource states across all command contexts.
///
/// Resource lifecycle hooks record creation and destruction. Submission
/// takes the lock once via [`GlobalStateRegistry::lock`] and holds it
/// across resolve and commit, so concurrent submissions serialize and each
/// one sees the states the previous one left behind.
///
/// The registry is owned by the session that owns the device and passed by
/// shared reference; trackers never reach for ambient global state.
#[derive(Debug, Default)]
pub struct GlobalStateRegistry {
    states: Mutex<FxHashMap<ResourceId, ResourceStateRecord>>,
}

impl GlobalStateRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> GlobalStateRegistry {
        GlobalStateRegistry {
            states: Mutex::new(FxHashMap::default()),
        }
    }

    /// Record a freshly created resource with every subresource in
    /// `state`. Re-registering an id replaces its record.
    pub fn register_initial_state(
        &self,
        resource: ResourceId,
        state: UsageState,
    ) {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _ = states.insert(resource, ResourceStateRecord::new(state));
    }

    /// Drop a destroyed resource from the registry. Unknown ids are
    /// ignored.
    pub fn forget(&self, resource: ResourceId) {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _ = states.remove(&resource);
    }

    /// Take the registry lock for a resolve/commit sequence.
    ///
    /// The returned guard is the capability for reading and writing global
    /// states; tracker resolve and commit take it as a parameter, so a
    /// caller cannot run them without holding the lock.
    #[must_use]
    pub fn lock(&self) -> RegistryLock<'_> {
        RegistryLock {
            states: self
                .states
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Exclusive access to the global state table.
pub struct RegistryLock<'a> {
    states: MutexGuard<'a, FxHashMap<ResourceId, ResourceStateRecord>>,
}

impl RegistryLock<'_> {
    /// Last-known record for `resource`, if registered.
    #[must_use]
    pub fn get(&self, resource: ResourceId) -> Option<&ResourceStateRecord> {
        self.states.get(&resource)
    }

    pub(crate) fn set(
        &mut self,
        resource: ResourceId,
        record: ResourceStateRecord,
    ) {
        let _ = self.states.insert(resource, record);
    }

    /// Number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no resources are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
