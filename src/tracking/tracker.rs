//! Per-context resource state tracking.
//!
//! Each command context owns one tracker. A transition against a resource
//! the context has already touched compares with the context's own
//! last-known state and resolves immediately; the first touch of a
//! resource cannot know the prior state and is deferred as a pending
//! barrier, resolved against the global registry at submission.

use rustc_hash::FxHashMap;

use crate::tracking::barrier::{Barrier, BarrierSink, PendingTransition};
use crate::tracking::registry::RegistryLock;
use crate::tracking::resource::{
    ResourceId, ResourceStateRecord, Subresource, UsageState,
};

/// Records and resolves barriers for one command context.
#[derive(Debug, Default)]
pub struct ResourceStateTracker {
    pending: Vec<PendingTransition>,
    resolved: Vec<Barrier>,
    final_states: FxHashMap<ResourceId, ResourceStateRecord>,
}

impl ResourceStateTracker {
    /// Tracker with no recorded history.
    #[must_use]
    pub fn new() -> ResourceStateTracker {
        ResourceStateTracker::default()
    }

    /// Record that `resource` must be in `after` for upcoming commands.
    ///
    /// When this context already knows the resource, the barrier resolves
    /// immediately and is dropped if the state is unchanged. A blanket
    /// request against a record with per-subresource overrides expands to
    /// one barrier per recorded override; subresources without an override
    /// are not compared.
    pub fn transition_resource(
        &mut self,
        resource: ResourceId,
        scope: Subresource,
        after: UsageState,
    ) {
        if let Some(record) = self.final_states.get_mut(&resource) {
            if scope == Subresource::All && record.has_overrides() {
                for (index, before) in record.overrides() {
                    if before != after {
                        self.resolved.push(Barrier::Transition {
                            resource,
                            subresource: Subresource::Index(index),
                            before,
                            after,
                        });
                    }
                }
            } else {
                let before = match scope {
                    Subresource::All => record.uniform(),
                    Subresource::Index(index) => record.get(index),
                };
                if before != after {
                    self.resolved.push(Barrier::Transition {
                        resource,
                        subresource: scope,
                        before,
                        after,
                    });
                }
            }
            record.set(scope, after);
        } else {
            // first touch: the prior state is known only to the registry
            self.pending.push(PendingTransition {
                resource,
                subresource: scope,
                after,
            });
            let mut record = ResourceStateRecord::new(UsageState::Common);
            record.set(scope, after);
            let _ = self.final_states.insert(resource, record);
        }
    }

    /// Record a flush of unordered-access writes to `resource`, or to
    /// every resource when `None`.
    ///
    /// UAV barriers carry no state and skip tracking entirely.
    pub fn uav_barrier(&mut self, resource: Option<ResourceId>) {
        self.resolved.push(Barrier::Uav { resource });
    }

    /// Record an aliased-placement handoff from `before` to `after`.
    ///
    /// Aliasing barriers carry no state and skip tracking entirely.
    pub fn aliasing_barrier(
        &mut self,
        before: Option<ResourceId>,
        after: Option<ResourceId>,
    ) {
        self.resolved.push(Barrier::Aliasing { before, after });
    }

    /// Resolve every pending barrier against the global registry,
    /// appending the survivors to the resolved list. Returns the number of
    /// barriers emitted.
    ///
    /// Call once recording is finished and the inline barriers have been
    /// flushed; the emitted barriers belong in a batch that executes ahead
    /// of this context's commands. A blanket pending against a global
    /// record with overrides expands per recorded override, the same rule
    /// as inline resolution. Pendings for resources the registry no longer
    /// knows are dropped.
    pub fn resolve_pending_barriers(
        &mut self,
        registry: &RegistryLock<'_>,
    ) -> usize {
        let mut emitted = 0;
        for pending in self.pending.drain(..) {
            let Some(global) = registry.get(pending.resource) else {
                log::warn!(
                    "dropping pending barrier for unregistered resource {:?}",
                    pending.resource
                );
                continue;
            };
            if pending.subresource == Subresource::All && global.has_overrides()
            {
                for (index, before) in global.overrides() {
                    if before != pending.after {
                        self.resolved.push(Barrier::Transition {
                            resource: pending.resource,
                            subresource: Subresource::Index(index),
                            before,
                            after: pending.after,
                        });
                        emitted += 1;
                    }
                }
            } else {
                let before = match pending.subresource {
                    Subresource::All => global.uniform(),
                    Subresource::Index(index) => global.get(index),
                };
                if before != pending.after {
                    self.resolved.push(Barrier::Transition {
                        resource: pending.resource,
                        subresource: pending.subresource,
                        before,
                        after: pending.after,
                    });
                    emitted += 1;
                }
            }
        }
        emitted
    }

    /// Hand every resolved barrier to `sink` as one batch and clear the
    /// list. Does nothing when there is nothing to flush.
    pub fn flush_barriers<S: BarrierSink>(&mut self, sink: &mut S) {
        if self.resolved.is_empty() {
            return;
        }
        sink.record_barriers(&self.resolved);
        self.resolved.clear();
    }

    /// Publish this context's final states to the global registry and
    /// clear them. Call right after a successful resolve, under the same
    /// lock.
    ///
    /// Each touched resource's global record is replaced wholesale by this
    /// context's record.
    pub fn commit_final_states(&mut self, registry: &mut RegistryLock<'_>) {
        for (resource, record) in self.final_states.drain() {
            registry.set(resource, record);
        }
    }

    /// Forget all recorded history. Used when a context is reset for
    /// reuse without being submitted.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.resolved.clear();
        self.final_states.clear();
    }

    /// Number of barriers waiting on global resolution.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of resolved barriers not yet flushed.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// This context's last-known record for `resource`.
    #[must_use]
    pub fn final_state(
        &self,
        resource: ResourceId,
    ) -> Option<&ResourceStateRecord> {
        self.final_states.get(&resource)
    }
}
