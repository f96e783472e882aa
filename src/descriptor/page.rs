//! Descriptor pages: fixed-capacity heaps with free-list bookkeeping.
//!
//! A page tracks its free space in two sorted indices over the same set of
//! blocks: one keyed by offset (for merging on free) and one keyed by
//! `(size, offset)` (for best-fit on allocate). Frees pass through a stale
//! queue tagged with the frame in flight;
//! [`DescriptorPage::release_stale_descriptors`] moves entries whose frame
//! has retired back onto the free list, merging offset-adjacent neighbors.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::descriptor::allocation::DescriptorAllocation;
use crate::device::{
    DescriptorDevice, DescriptorHeap, DescriptorPtr, DeviceError, HeapKind,
};
use crate::frame::FrameCounter;

/// A freed block waiting for its frame to retire.
struct StaleBlock {
    offset: u32,
    size: u32,
    frame: u64,
}

/// Free-space bookkeeping, guarded by the page mutex.
struct FreeLists {
    /// Free blocks keyed by offset; value is the block size.
    by_offset: BTreeMap<u32, u32>,
    /// The same blocks keyed by `(size, offset)`.
    by_size: BTreeSet<(u32, u32)>,
    /// Freed blocks not yet eligible for reuse, oldest first.
    stale: VecDeque<StaleBlock>,
    /// Slots on the free list. Stale blocks do not count until reclaimed.
    free_handles: u32,
}

impl FreeLists {
    /// Insert a free block into both indices.
    fn add_block(&mut self, offset: u32, size: u32) {
        let previous = self.by_offset.insert(offset, size);
        debug_assert!(
            previous.is_none(),
            "free block at offset {offset} inserted twice"
        );
        let inserted = self.by_size.insert((size, offset));
        debug_assert!(inserted);
    }

    /// Remove a block from both indices.
    fn remove_block(&mut self, offset: u32, size: u32) {
        let removed = self.by_offset.remove(&offset).is_some();
        debug_assert!(removed);
        let removed = self.by_size.remove(&(size, offset));
        debug_assert!(removed);
    }

    /// Return a block to the free list, merging it with offset-adjacent
    /// neighbors into a single block.
    fn free_block(&mut self, mut offset: u32, mut size: u32) {
        self.free_handles += size;

        let prev = self
            .by_offset
            .range(..offset)
            .next_back()
            .map(|(&prev_offset, &prev_size)| (prev_offset, prev_size));
        if let Some((prev_offset, prev_size)) = prev {
            if prev_offset + prev_size == offset {
                self.remove_block(prev_offset, prev_size);
                offset = prev_offset;
                size += prev_size;
            }
        }

        let next = self
            .by_offset
            .range(offset..)
            .next()
            .map(|(&next_offset, &next_size)| (next_offset, next_size));
        if let Some((next_offset, next_size)) = next {
            if offset + size == next_offset {
                self.remove_block(next_offset, next_size);
                size += next_size;
            }
        }

        self.add_block(offset, size);
    }
}

/// One fixed-capacity descriptor heap with its own free list.
///
/// Pages are shared behind [`Arc`]: every live [`DescriptorAllocation`]
/// holds a reference to the page it came from so the page outlives its
/// allocations.
pub struct DescriptorPage {
    kind: HeapKind,
    heap: Box<dyn DescriptorHeap>,
    stride: u32,
    frame: Arc<FrameCounter>,
    lists: Mutex<FreeLists>,
}

impl DescriptorPage {
    /// Create a page backed by a fresh device heap of `capacity` slots.
    pub fn new(
        device: &dyn DescriptorDevice,
        kind: HeapKind,
        capacity: u32,
        frame: Arc<FrameCounter>,
    ) -> Result<Arc<DescriptorPage>, DeviceError> {
        assert!(capacity > 0, "descriptor page capacity must be nonzero");
        let heap = device.create_heap(kind, capacity)?;
        debug_assert!(!heap.base().is_null(), "device heap at the null address");
        let stride = device.descriptor_stride(kind);

        let mut lists = FreeLists {
            by_offset: BTreeMap::new(),
            by_size: BTreeSet::new(),
            stale: VecDeque::new(),
            free_handles: capacity,
        };
        lists.add_block(0, capacity);

        log::debug!(
            "created {kind:?} descriptor page: {capacity} slots, stride {stride}"
        );
        Ok(Arc::new(DescriptorPage {
            kind,
            heap,
            stride,
            frame,
            lists: Mutex::new(lists),
        }))
    }

    /// Carve a block of `count` slots out of the page.
    ///
    /// Best-fit: the smallest free block that holds `count` is chosen and
    /// split, with the remainder staying on the free list. Returns `None`
    /// when no single free block is large enough.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    pub fn allocate(
        self: &Arc<DescriptorPage>,
        count: u32,
    ) -> Option<DescriptorAllocation> {
        assert!(count > 0, "descriptor allocation count must be nonzero");
        let mut lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        if count > lists.free_handles {
            return None;
        }
        let (block_size, block_offset) =
            lists.by_size.range((count, 0)..).next().copied()?;
        lists.remove_block(block_offset, block_size);

        let leftover = block_size - count;
        if leftover > 0 {
            lists.add_block(block_offset + count, leftover);
        }
        lists.free_handles -= count;

        Some(DescriptorAllocation::new(
            self.heap.base().offset_by(block_offset, self.stride),
            count,
            self.stride,
            Arc::clone(self),
        ))
    }

    /// Queue `count` slots starting at `base` for reclamation.
    ///
    /// The slots stay unavailable until the tagged frame retires.
    pub(crate) fn free(&self, base: DescriptorPtr, count: u32) {
        let offset = self.offset_of(base);
        debug_assert!(offset + count <= self.capacity());
        let mut lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        // reading the clock under the lock keeps queued tags nondecreasing
        let frame = self.frame.current();
        lists.stale.push_back(StaleBlock {
            offset,
            size: count,
            frame,
        });
    }

    /// Move stale blocks tagged at or below `retired_frame` back onto the
    /// free list. Returns the number of slots reclaimed.
    ///
    /// Queue tags are nondecreasing, so the scan stops at the first entry
    /// still in flight.
    pub fn release_stale_descriptors(&self, retired_frame: u64) -> u32 {
        let mut lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        let mut reclaimed = 0;
        while lists
            .stale
            .front()
            .is_some_and(|block| block.frame <= retired_frame)
        {
            let Some(block) = lists.stale.pop_front() else {
                break;
            };
            lists.free_block(block.offset, block.size);
            reclaimed += block.size;
        }
        if reclaimed > 0 {
            log::trace!(
                "{:?} page reclaimed {reclaimed} stale descriptors at retired frame {retired_frame}",
                self.kind
            );
        }
        reclaimed
    }

    /// Heap category this page serves.
    #[must_use]
    pub fn kind(&self) -> HeapKind {
        self.kind
    }

    /// Total slots in the page.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.heap.capacity()
    }

    /// Slots currently available for allocation.
    #[must_use]
    pub fn free_handles(&self) -> u32 {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .free_handles
    }

    /// Whether a single free block can hold `count` slots.
    #[must_use]
    pub fn has_space(&self, count: u32) -> bool {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_size
            .range((count, 0)..)
            .next()
            .is_some()
    }

    fn offset_of(&self, ptr: DescriptorPtr) -> u32 {
        ((ptr.0 - self.heap.base().0) / self.stride as usize) as u32
    }
}

impl fmt::Debug for DescriptorPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorPage")
            .field("kind", &self.kind)
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::device::testing::StubDevice;

    fn make_page(capacity: u32) -> (Arc<DescriptorPage>, Arc<FrameCounter>) {
        let frame = Arc::new(FrameCounter::new());
        let device = StubDevice::new(4096);
        let page = DescriptorPage::new(
            &device,
            HeapKind::RenderTarget,
            capacity,
            Arc::clone(&frame),
        )
        .unwrap();
        (page, frame)
    }

    fn advance_to(frame: &FrameCounter, target: u64) {
        while frame.current() < target {
            let _ = frame.advance();
        }
    }

    fn offset_in_page(allocation: &DescriptorAllocation) -> u32 {
        ((allocation.handle_at(0).0 - StubDevice::FIRST_BASE)
            / StubDevice::STRIDE as usize) as u32
    }

    #[test]
    fn test_fresh_page_is_one_free_block() {
        let (page, _) = make_page(256);
        assert_eq!(page.capacity(), 256);
        assert_eq!(page.free_handles(), 256);
        assert!(page.has_space(256));

        let allocation = page.allocate(256).unwrap();
        assert_eq!(allocation.count(), 256);
        assert_eq!(page.free_handles(), 0);
        assert!(!page.has_space(1));
    }

    #[test]
    fn test_best_fit_prefers_smallest_block() {
        let (page, frame) = make_page(256);
        let mut small = page.allocate(64).unwrap();
        let _held = page.allocate(64).unwrap();
        let mut large = page.allocate(128).unwrap();

        small.release();
        large.release();
        let retired = frame.advance();
        assert_eq!(page.release_stale_descriptors(retired), 192);

        // free blocks are [0, 64) and [128, 256); a 64-slot request must
        // take the smaller one
        let refill = page.allocate(64).unwrap();
        assert_eq!(offset_in_page(&refill), 0);
    }

    #[test]
    fn test_split_leaves_usable_remainder() {
        let (page, _) = make_page(256);
        let _head = page.allocate(100).unwrap();
        assert_eq!(page.free_handles(), 156);
        assert!(page.has_space(156));

        let rest = page.allocate(156).unwrap();
        assert_eq!(offset_in_page(&rest), 100);
        assert_eq!(page.free_handles(), 0);
    }

    #[test]
    fn test_exhausted_page_returns_none() {
        let (page, _) = make_page(64);
        let _all = page.allocate(64).unwrap();
        assert!(page.allocate(1).is_none());
    }

    #[test]
    fn test_request_larger_than_free_space_returns_none() {
        let (page, _) = make_page(64);
        assert!(page.allocate(65).is_none());
    }

    #[test]
    fn test_fragmented_page_rejects_spanning_request() {
        let (page, frame) = make_page(192);
        let mut a = page.allocate(64).unwrap();
        let _b = page.allocate(64).unwrap();
        let mut c = page.allocate(64).unwrap();

        a.release();
        c.release();
        let retired = frame.advance();
        assert_eq!(page.release_stale_descriptors(retired), 128);

        // 128 slots are free but split across [0, 64) and [128, 192)
        assert_eq!(page.free_handles(), 128);
        assert!(!page.has_space(128));
        assert!(page.allocate(128).is_none());
        assert!(page.allocate(64).is_some());
    }

    #[test]
    fn test_coalesce_with_previous_block() {
        let (page, frame) = make_page(128);
        let mut a = page.allocate(64).unwrap();
        let mut b = page.allocate(64).unwrap();

        a.release();
        b.release();
        let retired = frame.advance();
        assert_eq!(page.release_stale_descriptors(retired), 128);

        assert!(page.has_space(128));
        assert!(page.allocate(128).is_some());
    }

    #[test]
    fn test_coalesce_with_next_block() {
        let (page, frame) = make_page(128);
        let mut a = page.allocate(64).unwrap();
        let mut b = page.allocate(64).unwrap();

        b.release();
        a.release();
        let retired = frame.advance();
        assert_eq!(page.release_stale_descriptors(retired), 128);

        assert!(page.has_space(128));
        assert!(page.allocate(128).is_some());
    }

    #[test]
    fn test_coalesce_bridges_both_neighbors() {
        let (page, frame) = make_page(192);
        let mut a = page.allocate(64).unwrap();
        let mut b = page.allocate(64).unwrap();
        let mut c = page.allocate(64).unwrap();

        a.release();
        c.release();
        let retired = frame.advance();
        assert_eq!(page.release_stale_descriptors(retired), 128);
        assert!(!page.has_space(192));

        b.release();
        let retired = frame.advance();
        assert_eq!(page.release_stale_descriptors(retired), 64);

        assert!(page.has_space(192));
        assert!(page.allocate(192).is_some());
    }

    #[test]
    fn test_stale_blocks_wait_for_frame_retirement() {
        let (page, frame) = make_page(256);
        let mut first = page.allocate(64).unwrap();
        let first_base = first.handle_at(0);
        let _second = page.allocate(64).unwrap();
        assert_eq!(page.free_handles(), 128);

        advance_to(&frame, 5);
        first.release();
        assert_eq!(page.free_handles(), 128);

        assert_eq!(page.release_stale_descriptors(4), 0);
        assert_eq!(page.free_handles(), 128);

        assert_eq!(page.release_stale_descriptors(5), 64);
        assert_eq!(page.free_handles(), 192);

        let reused = page.allocate(64).unwrap();
        assert_eq!(reused.handle_at(0), first_base);
    }

    #[test]
    fn test_release_stale_is_idempotent() {
        let (page, frame) = make_page(64);
        let mut allocation = page.allocate(32).unwrap();
        advance_to(&frame, 2);
        allocation.release();

        assert_eq!(page.release_stale_descriptors(2), 32);
        assert_eq!(page.release_stale_descriptors(2), 0);
        assert_eq!(page.free_handles(), 64);
    }

    #[test]
    fn test_partial_reclaim_preserves_queue_order() {
        let (page, frame) = make_page(192);
        let mut a = page.allocate(64).unwrap();
        let mut b = page.allocate(64).unwrap();

        advance_to(&frame, 1);
        a.release();
        advance_to(&frame, 3);
        b.release();

        // only the frame-1 entry is eligible
        assert_eq!(page.release_stale_descriptors(2), 64);
        assert_eq!(page.free_handles(), 128);
        assert_eq!(page.release_stale_descriptors(3), 64);
        assert_eq!(page.free_handles(), 192);
    }

    #[test]
    fn test_random_traffic_never_overlaps_and_conserves_slots() {
        const CAPACITY: u32 = 512;

        let (page, frame) = make_page(CAPACITY);
        let mut rng = StdRng::seed_from_u64(7);
        let mut live: Vec<(u32, DescriptorAllocation)> = Vec::new();
        let mut queued: u32 = 0;

        for step in 0..400 {
            let roll: u32 = rng.random_range(0..100);
            if roll < 55 {
                let count: u32 = rng.random_range(1..=32);
                if let Some(allocation) = page.allocate(count) {
                    let offset = offset_in_page(&allocation);
                    for (other_offset, other) in &live {
                        let disjoint = offset + count <= *other_offset
                            || *other_offset + other.count() <= offset;
                        assert!(
                            disjoint,
                            "step {step}: block {offset}+{count} overlaps \
                             {other_offset}+{}",
                            other.count()
                        );
                    }
                    live.push((offset, allocation));
                }
            } else if roll < 85 {
                if !live.is_empty() {
                    let index = rng.random_range(0..live.len());
                    let (_, allocation) = live.swap_remove(index);
                    queued += allocation.count();
                    drop(allocation);
                }
            } else {
                let retired = frame.advance();
                assert_eq!(page.release_stale_descriptors(retired), queued);
                queued = 0;
            }

            let live_total: u32 = live.iter().map(|(_, a)| a.count()).sum();
            assert_eq!(
                page.free_handles() + live_total + queued,
                CAPACITY,
                "step {step}: slots leaked or double-counted"
            );
        }
    }
}
