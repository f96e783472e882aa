//! Move-only descriptor block handles.

use std::sync::Arc;

use crate::descriptor::page::DescriptorPage;
use crate::device::DescriptorPtr;

/// An allocated block of contiguous descriptor slots.
///
/// The block returns itself to its page when dropped. The free is
/// deferred: the page queues the slots under the current frame tag and
/// hands them back out only once that frame has retired.
#[derive(Debug)]
pub struct DescriptorAllocation {
    base: DescriptorPtr,
    count: u32,
    stride: u32,
    page: Option<Arc<DescriptorPage>>,
}

impl DescriptorAllocation {
    pub(crate) fn new(
        base: DescriptorPtr,
        count: u32,
        stride: u32,
        page: Arc<DescriptorPage>,
    ) -> DescriptorAllocation {
        debug_assert!(!base.is_null());
        debug_assert!(count > 0);
        DescriptorAllocation {
            base,
            count,
            stride,
            page: Some(page),
        }
    }

    /// The null allocation. Holds no slots and no page reference.
    #[must_use]
    pub fn null() -> DescriptorAllocation {
        DescriptorAllocation {
            base: DescriptorPtr::NULL,
            count: 0,
            stride: 0,
            page: None,
        }
    }

    /// Whether this allocation holds no descriptors.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.base.is_null()
    }

    /// Address of the first slot; the null address for the null allocation.
    #[must_use]
    pub fn base(&self) -> DescriptorPtr {
        self.base
    }

    /// Number of descriptor slots in the block.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Address of the slot at `offset` within the block.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is outside the block. The null allocation has no
    /// valid offsets.
    #[must_use]
    pub fn handle_at(&self, offset: u32) -> DescriptorPtr {
        assert!(
            offset < self.count,
            "descriptor offset {offset} out of range for a block of {}",
            self.count
        );
        self.base.offset_by(offset, self.stride)
    }

    /// Return the block to its page and become null.
    ///
    /// Safe to call more than once; releasing a null allocation does
    /// nothing.
    pub fn release(&mut self) {
        if let Some(page) = self.page.take() {
            page.free(self.base, self.count);
        }
        self.base = DescriptorPtr::NULL;
        self.count = 0;
        self.stride = 0;
    }
}

impl Default for DescriptorAllocation {
    fn default() -> Self {
        Self::null()
    }
}

impl Drop for DescriptorAllocation {
    fn drop(&mut self) {
        self.release();
    }
}
