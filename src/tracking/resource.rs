//! Resource identities and usage-state records.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a tracked GPU resource.
///
/// The tracking layer never touches resource memory; it keys everything by
/// id. Backends mint one id per native resource at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub u64);

impl ResourceId {
    /// Mint a fresh process-unique id.
    #[must_use]
    pub fn next() -> ResourceId {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ResourceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// How a resource is being used by the pipeline.
///
/// A transition barrier declares the change from one usage to the next so
/// the device can resolve hazards between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UsageState {
    /// No specific usage; the state of freshly created resources.
    #[default]
    Common,
    /// Written as a render target.
    RenderTarget,
    /// Written as a depth buffer.
    DepthWrite,
    /// Read as a depth buffer.
    DepthRead,
    /// Read by shaders.
    ShaderResource,
    /// Read and written through unordered access.
    UnorderedAccess,
    /// Source of a copy.
    CopySource,
    /// Destination of a copy.
    CopyDest,
    /// Presented to the display.
    Present,
}

/// Scope of a state transition within a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subresource {
    /// Every subresource at once.
    All,
    /// One subresource by index.
    Index(u32),
}

/// Last-known state of one resource, with optional per-subresource
/// overrides.
///
/// While no override is recorded the uniform state applies to every
/// subresource. A blanket set makes the state uniform again and forgets
/// the overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStateRecord {
    uniform: UsageState,
    overrides: BTreeMap<u32, UsageState>,
}

impl ResourceStateRecord {
    /// Record with every subresource in `state`.
    #[must_use]
    pub fn new(state: UsageState) -> ResourceStateRecord {
        ResourceStateRecord {
            uniform: state,
            overrides: BTreeMap::new(),
        }
    }

    /// State of subresource `index`: its override if one is recorded, the
    /// uniform state otherwise.
    #[must_use]
    pub fn get(&self, index: u32) -> UsageState {
        self.overrides.get(&index).copied().unwrap_or(self.uniform)
    }

    /// Record a state change for `scope`.
    pub fn set(&mut self, scope: Subresource, state: UsageState) {
        match scope {
            Subresource::All => {
                self.uniform = state;
                self.overrides.clear();
            }
            Subresource::Index(index) => {
                let _ = self.overrides.insert(index, state);
            }
        }
    }

    /// The state applied where no override is recorded.
    #[must_use]
    pub fn uniform(&self) -> UsageState {
        self.uniform
    }

    /// Recorded per-subresource overrides, in index order.
    pub fn overrides(
        &self,
    ) -> impl Iterator<Item = (u32, UsageState)> + '_ {
        self.overrides.iter().map(|(&index, &state)| (index, state))
    }

    /// Whether any per-subresource override is recorded.
    #[must_use]
    pub fn has_overrides(&self) -> bool {
        !self.overrides.is_empty()
    }
}
