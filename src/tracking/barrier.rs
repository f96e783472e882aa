//! Barrier descriptions handed to command streams.

use crate::tracking::resource::{ResourceId, Subresource, UsageState};

/// A synchronization barrier ready to be recorded into a command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Barrier {
    /// State change of a resource, or of one of its subresources.
    Transition {
        /// Resource whose state changes.
        resource: ResourceId,
        /// Scope of the change.
        subresource: Subresource,
        /// State being left.
        before: UsageState,
        /// State being entered.
        after: UsageState,
    },
    /// Aliased-placement handoff between resources sharing memory.
    /// `None` stands for "any resource".
    Aliasing {
        /// Resource going inactive.
        before: Option<ResourceId>,
        /// Resource becoming active.
        after: Option<ResourceId>,
    },
    /// Flush of unordered-access writes. `None` covers every resource.
    Uav {
        /// Resource whose pending writes must drain.
        resource: Option<ResourceId>,
    },
}

/// A transition whose prior state is unknown to the recording context.
///
/// The before state is filled in from the global registry at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingTransition {
    pub(crate) resource: ResourceId,
    pub(crate) subresource: Subresource,
    pub(crate) after: UsageState,
}

/// Destination for resolved barriers.
///
/// Command streams implement this to receive batches;
/// `Vec<Barrier>` implements it for buffering and inspection.
pub trait BarrierSink {
    /// Record a batch of barriers, preserving order.
    fn record_barriers(&mut self, barriers: &[Barrier]);
}

impl BarrierSink for Vec<Barrier> {
    fn record_barriers(&mut self, barriers: &[Barrier]) {
        self.extend_from_slice(barriers);
    }
}
