//! Pooling descriptor allocators, one per heap category.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::descriptor::allocation::DescriptorAllocation;
use crate::descriptor::page::DescriptorPage;
use crate::device::{DescriptorDevice, DeviceError, HeapKind};
use crate::frame::FrameCounter;

/// Errors from descriptor allocation.
#[derive(Debug)]
pub enum AllocationError {
    /// The request cannot fit in any single heap of this category.
    ExceedsHeapLimit {
        /// Descriptors requested.
        requested: u32,
        /// Device heap capacity limit for the category.
        limit: u32,
    },
    /// The device failed to create a backing heap.
    Device(DeviceError),
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExceedsHeapLimit { requested, limit } => {
                write!(
                    f,
                    "requested {requested} descriptors but the device heap \
                     limit is {limit}"
                )
            }
            Self::Device(e) => write!(f, "descriptor heap creation failed: {e}"),
        }
    }
}

impl std::error::Error for AllocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Device(e) => Some(e),
            Self::ExceedsHeapLimit { .. } => None,
        }
    }
}

impl From<DeviceError> for AllocationError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

/// Hands out descriptor blocks of one heap category from a pool of pages.
///
/// Pages are created on demand and never destroyed. A page that reports no
/// free handles leaves the available set and rejoins it when a reclaim
/// frees space.
pub struct DescriptorAllocator {
    device: Arc<dyn DescriptorDevice>,
    kind: HeapKind,
    frame: Arc<FrameCounter>,
    descriptors_per_page: u32,
    pool: Mutex<PagePool>,
}

/// Pool bookkeeping behind the allocator mutex.
struct PagePool {
    pages: Vec<Arc<DescriptorPage>>,
    /// Indices into `pages` with free handles remaining.
    available: BTreeSet<usize>,
}

impl DescriptorAllocator {
    /// Allocator for `kind` creating pages of `descriptors_per_page` slots.
    ///
    /// # Panics
    ///
    /// Panics if `descriptors_per_page` is zero.
    pub fn new(
        device: Arc<dyn DescriptorDevice>,
        kind: HeapKind,
        frame: Arc<FrameCounter>,
        descriptors_per_page: u32,
    ) -> DescriptorAllocator {
        assert!(
            descriptors_per_page > 0,
            "descriptors_per_page must be nonzero"
        );
        DescriptorAllocator {
            device,
            kind,
            frame,
            descriptors_per_page,
            pool: Mutex::new(PagePool {
                pages: Vec::new(),
                available: BTreeSet::new(),
            }),
        }
    }

    /// Allocate `count` contiguous descriptors.
    ///
    /// Existing pages with free space are tried first; on a miss a new page
    /// of `max(descriptors_per_page, count)` slots is created, so requests
    /// larger than the default page size still succeed. Requests above the
    /// device's heap limit for this category are rejected.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    pub fn allocate(
        &self,
        count: u32,
    ) -> Result<DescriptorAllocation, AllocationError> {
        assert!(count > 0, "descriptor allocation count must be nonzero");
        let limit = self.device.max_heap_capacity(self.kind);
        if count > limit {
            return Err(AllocationError::ExceedsHeapLimit {
                requested: count,
                limit,
            });
        }

        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);

        let candidates: Vec<usize> = pool.available.iter().copied().collect();
        for index in candidates {
            let page = Arc::clone(&pool.pages[index]);
            let allocation = page.allocate(count);
            if page.free_handles() == 0 {
                let _ = pool.available.remove(&index);
            }
            if let Some(allocation) = allocation {
                return Ok(allocation);
            }
        }

        let capacity = self.descriptors_per_page.max(count);
        let page = DescriptorPage::new(
            self.device.as_ref(),
            self.kind,
            capacity,
            Arc::clone(&self.frame),
        )?;
        let index = pool.pages.len();
        pool.pages.push(Arc::clone(&page));

        let allocation = page.allocate(count);
        if page.free_handles() > 0 {
            let _ = pool.available.insert(index);
        }
        match allocation {
            Some(allocation) => Ok(allocation),
            // a fresh page holds max(descriptors_per_page, count) slots
            None => unreachable!("fresh descriptor page refused a feasible request"),
        }
    }

    /// Reclaim stale blocks across every page, then mark pages with free
    /// space available again.
    pub fn release_stale_descriptors(&self, retired_frame: u64) {
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        let PagePool { pages, available } = &mut *pool;
        let mut reclaimed = 0;
        for (index, page) in pages.iter().enumerate() {
            reclaimed += page.release_stale_descriptors(retired_frame);
            if page.free_handles() > 0 {
                let _ = available.insert(index);
            }
        }
        if reclaimed > 0 {
            log::trace!(
                "{:?} allocator reclaimed {reclaimed} descriptors at retired frame {retired_frame}",
                self.kind
            );
        }
    }

    /// Heap category this allocator serves.
    #[must_use]
    pub fn kind(&self) -> HeapKind {
        self.kind
    }

    /// Number of pages created so far.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pages
            .len()
    }

    /// Total free handles across all pages.
    #[must_use]
    pub fn free_handles(&self) -> u32 {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pages
            .iter()
            .map(|page| page.free_handles())
            .sum()
    }
}

impl fmt::Debug for DescriptorAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorAllocator")
            .field("kind", &self.kind)
            .field("descriptors_per_page", &self.descriptors_per_page)
            .finish_non_exhaustive()
    }
}
