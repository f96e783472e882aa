//! CPU descriptor allocation.
//!
//! One allocator per heap category hands out blocks of contiguous
//! descriptor slots from a pool of fixed-size pages. Freed blocks are
//! reclaimed only after the frame that released them has retired on the
//! device.

/// Move-only handle to an allocated block of descriptor slots.
pub mod allocation;
/// Pooling allocator fronting the pages of one heap category.
pub mod allocator;
/// A fixed-capacity heap with free-list bookkeeping and a stale queue.
pub mod page;
