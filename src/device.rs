//! Device-side surface the descriptor subsystem builds on.
//!
//! The crate never talks to a graphics API directly. A backend implements
//! [`DescriptorDevice`] and hands out [`DescriptorHeap`]s; everything above
//! works in terms of heap base addresses and per-kind descriptor strides
//! queried at runtime.

use std::fmt;

/// Raw CPU-side address of a descriptor slot inside a device heap.
///
/// Address `0` is reserved as the null sentinel; backends must never place
/// a heap there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorPtr(pub usize);

impl DescriptorPtr {
    /// The null descriptor address.
    pub const NULL: DescriptorPtr = DescriptorPtr(0);

    /// Whether this address is the null sentinel.
    #[must_use]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The address `slots` descriptor slots past this one, in a heap with
    /// the given stride.
    #[must_use]
    pub fn offset_by(self, slots: u32, stride: u32) -> DescriptorPtr {
        DescriptorPtr(self.0 + slots as usize * stride as usize)
    }
}

/// Descriptor heap categories.
///
/// Each category has its own stride and heap size limit, reported by the
/// device. Allocations never cross categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapKind {
    /// Render-target views.
    RenderTarget,
    /// Depth-stencil views.
    DepthStencil,
    /// Constant-buffer, shader-resource, and unordered-access views.
    ShaderResource,
    /// Samplers.
    Sampler,
}

impl HeapKind {
    /// Every heap kind, in stable index order.
    pub const ALL: [HeapKind; 4] = [
        HeapKind::RenderTarget,
        HeapKind::DepthStencil,
        HeapKind::ShaderResource,
        HeapKind::Sampler,
    ];

    /// Stable index for per-kind lookup tables.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            HeapKind::RenderTarget => 0,
            HeapKind::DepthStencil => 1,
            HeapKind::ShaderResource => 2,
            HeapKind::Sampler => 3,
        }
    }
}

/// Errors reported by a [`DescriptorDevice`] backend.
#[derive(Debug)]
pub enum DeviceError {
    /// Native heap creation failed.
    HeapCreation {
        /// Heap category requested.
        kind: HeapKind,
        /// Requested slot capacity.
        capacity: u32,
        /// Backend-reported failure description.
        reason: String,
    },
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeapCreation {
                kind,
                capacity,
                reason,
            } => {
                write!(
                    f,
                    "failed to create {kind:?} heap of {capacity} descriptors: {reason}"
                )
            }
        }
    }
}

impl std::error::Error for DeviceError {}

/// One fixed-capacity native descriptor heap.
///
/// The heap stays alive as long as the handle does; dropping it releases
/// the native allocation.
pub trait DescriptorHeap: Send + Sync {
    /// Base address of slot 0. Never null.
    fn base(&self) -> DescriptorPtr;

    /// Number of descriptor slots in this heap.
    fn capacity(&self) -> u32;
}

/// Backend surface for descriptor heap management.
///
/// Strides and capacity limits are runtime properties of the device and are
/// queried per category, never hard-coded by callers.
pub trait DescriptorDevice: Send + Sync {
    /// Create a native heap of the given category and capacity.
    fn create_heap(
        &self,
        kind: HeapKind,
        capacity: u32,
    ) -> Result<Box<dyn DescriptorHeap>, DeviceError>;

    /// Bytes between adjacent descriptor slots of this category.
    fn descriptor_stride(&self, kind: HeapKind) -> u32;

    /// Largest heap capacity the device supports for this category.
    fn max_heap_capacity(&self, kind: HeapKind) -> u32;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sentinel() {
        assert!(DescriptorPtr::NULL.is_null());
        assert!(!DescriptorPtr(0x1000).is_null());
    }

    #[test]
    fn test_offset_by_walks_stride() {
        let base = DescriptorPtr(0x1000);
        assert_eq!(base.offset_by(0, 32), base);
        assert_eq!(base.offset_by(3, 32), DescriptorPtr(0x1000 + 96));
    }

    #[test]
    fn test_heap_kind_index_round_trips() {
        for kind in HeapKind::ALL {
            assert_eq!(HeapKind::ALL[kind.index()], kind);
        }
    }

    #[test]
    fn test_stub_device_reports_failures() {
        use super::testing::StubDevice;

        let device = StubDevice::failing();
        let result = device.create_heap(HeapKind::RenderTarget, 64);
        assert!(result.is_err());
    }
}
