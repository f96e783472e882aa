//! Bump-allocated staging memory for per-frame uploads.
//!
//! An arena owns a pool of fixed-size pages and linearly sub-allocates
//! aligned slots out of the current one, spilling to a fresh page when
//! full. Pages are never destroyed; [`UploadArena::reset`] recycles the
//! whole pool once the work that read from it has retired.

use std::fmt;

/// Default upload page size: 2 MiB.
pub const DEFAULT_PAGE_SIZE: usize = 2 * 1024 * 1024;

/// Errors from staging writes.
#[derive(Debug)]
pub enum UploadError {
    /// A single write larger than one page can never be satisfied.
    ExceedsPageSize {
        /// Byte length of the rejected write.
        requested: usize,
        /// Page capacity in bytes.
        page_size: usize,
    },
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExceedsPageSize {
                requested,
                page_size,
            } => {
                write!(
                    f,
                    "upload of {requested} bytes exceeds the page size of \
                     {page_size} bytes"
                )
            }
        }
    }
}

impl std::error::Error for UploadError {}

/// Location of one staged write: page index plus byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSlot {
    page: usize,
    offset: usize,
    len: usize,
}

impl UploadSlot {
    /// Index of the arena page holding the bytes.
    #[must_use]
    pub fn page_index(self) -> usize {
        self.page
    }

    /// Byte offset of the write within its page.
    #[must_use]
    pub fn offset(self) -> usize {
        self.offset
    }

    /// Length of the written bytes, before alignment padding.
    #[must_use]
    pub fn len(self) -> usize {
        self.len
    }

    /// Whether the write was empty.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

struct UploadPage {
    data: Box<[u8]>,
    offset: usize,
}

/// Pool of staging pages with linear sub-allocation.
pub struct UploadArena {
    page_size: usize,
    pages: Vec<UploadPage>,
    /// Indices of recycled pages ready for reuse.
    available: Vec<usize>,
    current: Option<usize>,
}

impl UploadArena {
    /// Arena handing out slots from pages of `page_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    #[must_use]
    pub fn new(page_size: usize) -> UploadArena {
        assert!(page_size > 0, "upload page size must be nonzero");
        UploadArena {
            page_size,
            pages: Vec::new(),
            available: Vec::new(),
            current: None,
        }
    }

    /// Copy `data` into the arena at the requested alignment.
    ///
    /// The slot's span is padded up to the alignment, so consecutive writes
    /// at the same alignment stay aligned.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    pub fn write_bytes(
        &mut self,
        data: &[u8],
        align: usize,
    ) -> Result<UploadSlot, UploadError> {
        assert!(
            align.is_power_of_two(),
            "upload alignment must be a power of two"
        );
        let aligned_size = align_up(data.len(), align);
        if aligned_size > self.page_size {
            return Err(UploadError::ExceedsPageSize {
                requested: data.len(),
                page_size: self.page_size,
            });
        }

        let index = match self.current {
            Some(index) if self.page_has_space(index, aligned_size, align) => {
                index
            }
            _ => {
                let index = self.acquire_page();
                self.current = Some(index);
                index
            }
        };

        let page = &mut self.pages[index];
        let offset = align_up(page.offset, align);
        page.data[offset..offset + data.len()].copy_from_slice(data);
        page.offset = offset + aligned_size;
        Ok(UploadSlot {
            page: index,
            offset,
            len: data.len(),
        })
    }

    /// Write one plain-old-data value, aligned to its type.
    pub fn write_pod<T: bytemuck::Pod>(
        &mut self,
        value: &T,
    ) -> Result<UploadSlot, UploadError> {
        self.write_bytes(bytemuck::bytes_of(value), align_of::<T>())
    }

    /// Write a slice of plain-old-data values, aligned to the element type.
    pub fn write_slice<T: bytemuck::Pod>(
        &mut self,
        values: &[T],
    ) -> Result<UploadSlot, UploadError> {
        self.write_bytes(bytemuck::cast_slice(values), align_of::<T>())
    }

    /// Bytes previously written at `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` did not come from this arena.
    #[must_use]
    pub fn slice(&self, slot: UploadSlot) -> &[u8] {
        &self.pages[slot.page].data[slot.offset..slot.offset + slot.len]
    }

    /// Recycle every page for a new round of writes.
    ///
    /// Call only once the work reading from the arena has retired; slots
    /// handed out before the reset are invalidated.
    pub fn reset(&mut self) {
        self.current = None;
        self.available.clear();
        for (index, page) in self.pages.iter_mut().enumerate() {
            page.offset = 0;
            self.available.push(index);
        }
    }

    /// Page size in bytes.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages in the pool.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_has_space(
        &self,
        index: usize,
        aligned_size: usize,
        align: usize,
    ) -> bool {
        align_up(self.pages[index].offset, align) + aligned_size
            <= self.page_size
    }

    fn acquire_page(&mut self) -> usize {
        if let Some(index) = self.available.pop() {
            return index;
        }
        let index = self.pages.len();
        self.pages.push(UploadPage {
            data: vec![0u8; self.page_size].into_boxed_slice(),
            offset: 0,
        });
        log::debug!(
            "upload arena grew to {} pages of {} bytes",
            self.pages.len(),
            self.page_size
        );
        index
    }
}

impl Default for UploadArena {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl fmt::Debug for UploadArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadArena")
            .field("page_size", &self.page_size)
            .field("page_count", &self.pages.len())
            .finish_non_exhaustive()
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_round_trips_bytes() {
        let mut arena = UploadArena::new(256);
        let slot = arena.write_bytes(b"hello", 1).unwrap();
        assert_eq!(slot.len(), 5);
        assert_eq!(arena.slice(slot), b"hello");
    }

    #[test]
    fn test_writes_respect_alignment() {
        let mut arena = UploadArena::new(256);
        let first = arena.write_bytes(&[1, 2, 3], 1).unwrap();
        assert_eq!(first.offset(), 0);

        let second = arena.write_pod(&0x0a0b_0c0du32).unwrap();
        assert_eq!(second.offset() % 4, 0);
        assert_eq!(second.offset(), 4);
        assert_eq!(arena.slice(second), 0x0a0b_0c0du32.to_ne_bytes());
    }

    #[test]
    fn test_slot_span_is_padded_to_alignment() {
        let mut arena = UploadArena::new(256);
        let first = arena.write_bytes(&[0xff; 5], 4).unwrap();
        assert_eq!(first.offset(), 0);
        assert_eq!(first.len(), 5);

        // the 5-byte write occupies 8 bytes; a byte write lands after it
        let second = arena.write_bytes(&[1], 1).unwrap();
        assert_eq!(second.offset(), 8);
    }

    #[test]
    fn test_spills_to_new_page_when_full() {
        let mut arena = UploadArena::new(64);
        let first = arena.write_bytes(&[0xab; 40], 1).unwrap();
        let second = arena.write_bytes(&[0xcd; 40], 1).unwrap();

        assert_eq!(first.page_index(), 0);
        assert_eq!(second.page_index(), 1);
        assert_eq!(arena.page_count(), 2);
        assert_eq!(arena.slice(first), [0xab; 40]);
        assert_eq!(arena.slice(second), [0xcd; 40]);
    }

    #[test]
    fn test_oversize_write_is_rejected() {
        let mut arena = UploadArena::new(64);
        let err = arena.write_bytes(&[0; 65], 1).unwrap_err();
        assert!(matches!(
            err,
            UploadError::ExceedsPageSize {
                requested: 65,
                page_size: 64,
            }
        ));
        assert_eq!(arena.page_count(), 0);
    }

    #[test]
    fn test_alignment_padding_counts_against_page_size() {
        let mut arena = UploadArena::new(64);
        // 60 bytes at alignment 64 pads to a full page
        assert!(arena.write_bytes(&[0; 60], 64).is_ok());
        // 60 bytes at alignment 128 can never fit a 64-byte page
        let err = arena.write_bytes(&[0; 60], 128).unwrap_err();
        assert!(matches!(err, UploadError::ExceedsPageSize { .. }));
    }

    #[test]
    fn test_reset_recycles_pages() {
        let mut arena = UploadArena::new(64);
        let _ = arena.write_bytes(&[1; 40], 1).unwrap();
        let _ = arena.write_bytes(&[2; 40], 1).unwrap();
        assert_eq!(arena.page_count(), 2);

        arena.reset();
        let slot = arena.write_bytes(&[3; 40], 1).unwrap();
        assert_eq!(arena.page_count(), 2);
        assert_eq!(slot.offset(), 0);
        assert_eq!(arena.slice(slot), [3; 40]);
    }

    #[test]
    fn test_write_slice_of_pod_values() {
        let mut arena = UploadArena::new(256);
        let values: [u32; 3] = [7, 11, 13];
        let slot = arena.write_slice(&values).unwrap();
        assert_eq!(slot.len(), 12);
        assert_eq!(arena.slice(slot), bytemuck::cast_slice(&values));
    }

    #[test]
    fn test_empty_write_is_allowed() {
        let mut arena = UploadArena::new(64);
        let slot = arena.write_bytes(&[], 1).unwrap();
        assert!(slot.is_empty());
        let empty: &[u8] = &[];
        assert_eq!(arena.slice(slot), empty);
    }
}
