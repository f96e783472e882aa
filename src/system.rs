//! Top-level aggregate wiring the device, frame clock, and allocators.

use std::sync::Arc;

use crate::descriptor::allocation::DescriptorAllocation;
use crate::descriptor::allocator::DescriptorAllocator;
use crate::device::{DescriptorDevice, HeapKind};
use crate::error::KilnError;
use crate::frame::{FrameCounter, RetireFence};
use crate::options::CoreOptions;
use crate::tracking::registry::GlobalStateRegistry;
use crate::tracking::resource::{ResourceId, UsageState};

/// Owns the per-process resource machinery for one device.
///
/// One descriptor allocator per heap category, the shared frame clock,
/// the retire fence the render loop signals, and the global state
/// registry. Everything hangs off the same clock so deferred frees across
/// categories retire together.
pub struct GraphicsSystem {
    device: Arc<dyn DescriptorDevice>,
    frame: Arc<FrameCounter>,
    retire_fence: Arc<RetireFence>,
    registry: Arc<GlobalStateRegistry>,
    allocators: [DescriptorAllocator; 4],
}

impl GraphicsSystem {
    /// Build a system around a device backend.
    #[must_use]
    pub fn new(
        device: Arc<dyn DescriptorDevice>,
        options: &CoreOptions,
    ) -> GraphicsSystem {
        let frame = Arc::new(FrameCounter::new());
        let allocators = HeapKind::ALL.map(|kind| {
            DescriptorAllocator::new(
                Arc::clone(&device),
                kind,
                Arc::clone(&frame),
                options.descriptor.descriptors_per_page,
            )
        });
        GraphicsSystem {
            device,
            frame,
            retire_fence: Arc::new(RetireFence::new()),
            registry: Arc::new(GlobalStateRegistry::new()),
            allocators,
        }
    }

    /// Allocate `count` contiguous descriptors of the given category.
    pub fn allocate_descriptors(
        &self,
        kind: HeapKind,
        count: u32,
    ) -> Result<DescriptorAllocation, KilnError> {
        Ok(self.allocator(kind).allocate(count)?)
    }

    /// The allocator serving `kind`.
    #[must_use]
    pub fn allocator(&self, kind: HeapKind) -> &DescriptorAllocator {
        &self.allocators[kind.index()]
    }

    /// Reclaim stale descriptors across every category.
    ///
    /// `retired_frame` is the highest frame the retire fence reports
    /// complete.
    pub fn release_stale_descriptors(&self, retired_frame: u64) {
        for allocator in &self.allocators {
            allocator.release_stale_descriptors(retired_frame);
        }
    }

    /// Record a freshly created resource in the global registry.
    pub fn register_resource(&self, resource: ResourceId, state: UsageState) {
        self.registry.register_initial_state(resource, state);
    }

    /// Drop a destroyed resource from the global registry.
    pub fn forget_resource(&self, resource: ResourceId) {
        self.registry.forget(resource);
    }

    /// Advance the frame clock, returning the new frame.
    pub fn advance_frame(&self) -> u64 {
        self.frame.advance()
    }

    /// The device backend this system was built around.
    #[must_use]
    pub fn device(&self) -> &Arc<dyn DescriptorDevice> {
        &self.device
    }

    /// The shared frame clock.
    #[must_use]
    pub fn frame_counter(&self) -> &Arc<FrameCounter> {
        &self.frame
    }

    /// The fence the render loop signals as frames retire.
    #[must_use]
    pub fn retire_fence(&self) -> &Arc<RetireFence> {
        &self.retire_fence
    }

    /// The global resource state registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<GlobalStateRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::StubDevice;

    fn make_system() -> (GraphicsSystem, Arc<StubDevice>) {
        let device = Arc::new(StubDevice::new(1024));
        let backend: Arc<dyn DescriptorDevice> = device.clone();
        let system = GraphicsSystem::new(backend, &CoreOptions::default());
        (system, device)
    }

    #[test]
    fn test_categories_use_separate_heaps() {
        let (system, device) = make_system();
        let _rtv = system
            .allocate_descriptors(HeapKind::RenderTarget, 4)
            .unwrap();
        let _srv = system
            .allocate_descriptors(HeapKind::ShaderResource, 4)
            .unwrap();

        assert_eq!(device.heaps_created(), 2);
        assert_eq!(system.allocator(HeapKind::RenderTarget).page_count(), 1);
        assert_eq!(system.allocator(HeapKind::Sampler).page_count(), 0);
    }

    #[test]
    fn test_frame_loop_reclaims_after_fence() {
        let (system, _) = make_system();
        let allocation = system
            .allocate_descriptors(HeapKind::ShaderResource, 16)
            .unwrap();
        let allocator = system.allocator(HeapKind::ShaderResource);
        let capacity = 256;
        assert_eq!(allocator.free_handles(), capacity - 16);

        let frame = system.advance_frame();
        drop(allocation);
        assert_eq!(allocator.free_handles(), capacity - 16);

        // the fence says the frame retired; its frees become reusable
        system.retire_fence().signal(frame);
        system.release_stale_descriptors(system.retire_fence().completed());
        assert_eq!(allocator.free_handles(), capacity);
    }

    #[test]
    fn test_resource_lifecycle_updates_registry() {
        let (system, _) = make_system();
        let resource = ResourceId::next();

        system.register_resource(resource, UsageState::Present);
        assert_eq!(
            system.registry().lock().get(resource).unwrap().uniform(),
            UsageState::Present
        );

        system.forget_resource(resource);
        assert!(system.registry().lock().get(resource).is_none());
    }
}
