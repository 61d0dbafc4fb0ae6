use std::alloc::{self, Layout};
use std::collections::TryReserveError;
use std::ptr::{self, NonNull};
use thiserror::Error;

/// Allocation failures raised while growing storage.
#[derive(Debug, Error)]
pub enum ColumnError {
    #[error("capacity overflow: {elements} elements of {elem_size} bytes (align {elem_align})")]
    CapacityOverflow {
        elements: usize,
        elem_size: usize,
        elem_align: usize,
    },

    #[error("allocator could not provide {bytes} bytes")]
    AllocationFailed { bytes: usize },

    #[error(transparent)]
    Reserve(#[from] TryReserveError),
}

/// Type-erased, growable column for a single component type.
///
/// Elements are `elem_size` bytes each, packed back to back in one buffer
/// aligned to `elem_align`. Capacity starts at zero, jumps to the configured
/// initial capacity on first use, then doubles. Growth copies existing bytes
/// verbatim. Rows are only reachable through bounds-checked byte slices.
pub struct Column {
    data: NonNull<u8>,
    elem_size: usize,
    elem_align: usize,
    len: usize,
    capacity: usize,
    initial_capacity: usize,
}

// SAFETY: the column exclusively owns its buffer and stores plain bytes.
unsafe impl Send for Column {}
// SAFETY: shared access only hands out `&[u8]`.
unsafe impl Sync for Column {}

impl Column {
    /// Create an empty column. Nothing is allocated until the first push.
    ///
    /// `elem_align` must be a non-zero power of two and `initial_capacity`
    /// must be non-zero.
    pub fn new(elem_size: usize, elem_align: usize, initial_capacity: usize) -> Self {
        assert!(elem_align.is_power_of_two(), "column alignment must be a power of two");
        assert!(initial_capacity > 0, "column initial capacity must be non-zero");
        Self {
            data: NonNull::dangling(),
            elem_size,
            elem_align,
            len: 0,
            capacity: 0,
            initial_capacity,
        }
    }

    #[inline]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    #[inline]
    pub fn elem_align(&self) -> usize {
        self.elem_align
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of rows that fit without reallocating.
    ///
    /// Zero-sized columns never allocate and report `usize::MAX`.
    #[inline]
    pub fn capacity(&self) -> usize {
        if self.elem_size == 0 {
            usize::MAX
        } else {
            self.capacity
        }
    }

    fn layout_for(&self, elements: usize) -> Result<Layout, ColumnError> {
        let overflow = || ColumnError::CapacityOverflow {
            elements,
            elem_size: self.elem_size,
            elem_align: self.elem_align,
        };
        let bytes = elements.checked_mul(self.elem_size).ok_or_else(overflow)?;
        Layout::from_size_align(bytes, self.elem_align).map_err(|_| overflow())
    }

    /// Make room for at least `additional` more rows.
    ///
    /// On failure the column is left exactly as it was.
    pub fn reserve(&mut self, additional: usize) -> Result<(), ColumnError> {
        if self.elem_size == 0 {
            return Ok(());
        }
        let required = self
            .len
            .checked_add(additional)
            .ok_or(ColumnError::CapacityOverflow {
                elements: usize::MAX,
                elem_size: self.elem_size,
                elem_align: self.elem_align,
            })?;
        if required <= self.capacity {
            return Ok(());
        }

        let doubled = self.capacity.saturating_mul(2);
        let new_capacity = doubled.max(self.initial_capacity).max(required);
        let new_layout = self.layout_for(new_capacity)?;

        let raw = if self.capacity == 0 {
            // SAFETY: `new_layout` has a non-zero size because elem_size > 0
            // and new_capacity > 0.
            unsafe { alloc::alloc(new_layout) }
        } else {
            let old_layout = self.layout_for(self.capacity)?;
            // SAFETY: `data` was allocated with `old_layout`, and the new size
            // is non-zero and does not overflow `isize` (checked by Layout).
            unsafe { alloc::realloc(self.data.as_ptr(), old_layout, new_layout.size()) }
        };

        self.data = NonNull::new(raw).ok_or(ColumnError::AllocationFailed {
            bytes: new_layout.size(),
        })?;
        self.capacity = new_capacity;
        Ok(())
    }

    /// Append a copy of `src` as a new row and return its index.
    pub fn push(&mut self, src: &[u8]) -> Result<usize, ColumnError> {
        assert_eq!(
            src.len(),
            self.elem_size,
            "Component size mismatch: expected {}, got {}",
            self.elem_size,
            src.len()
        );
        self.reserve(1)?;
        let row = self.len;
        if self.elem_size > 0 {
            // SAFETY: `reserve` guarantees room for row `len`; `src` is a
            // separate allocation of exactly `elem_size` bytes.
            unsafe {
                ptr::copy_nonoverlapping(src.as_ptr(), self.row_ptr(row), self.elem_size);
            }
        }
        self.len += 1;
        Ok(row)
    }

    /// Append a zero-filled row and return its index.
    pub fn push_zeroed(&mut self) -> Result<usize, ColumnError> {
        self.reserve(1)?;
        let row = self.len;
        if self.elem_size > 0 {
            // SAFETY: `reserve` guarantees room for row `len`.
            unsafe {
                ptr::write_bytes(self.row_ptr(row), 0, self.elem_size);
            }
        }
        self.len += 1;
        Ok(row)
    }

    /// Remove `row` by moving the last row into its place.
    ///
    /// Returns the index the moved row came from, if any row moved.
    pub fn swap_remove(&mut self, row: usize) -> Option<usize> {
        assert!(row < self.len, "row {row} out of bounds (len {})", self.len);
        let last = self.len - 1;
        self.len = last;
        if row == last {
            return None;
        }
        if self.elem_size > 0 {
            // SAFETY: both rows are in bounds and distinct, so the ranges
            // cannot overlap.
            unsafe {
                ptr::copy_nonoverlapping(self.row_ptr(last), self.row_ptr(row), self.elem_size);
            }
        }
        Some(last)
    }

    /// Bytes of a single row.
    pub fn get(&self, row: usize) -> Option<&[u8]> {
        if row >= self.len {
            return None;
        }
        let start = row * self.elem_size;
        Some(&self.as_bytes()[start..start + self.elem_size])
    }

    /// Mutable bytes of a single row.
    pub fn get_mut(&mut self, row: usize) -> Option<&mut [u8]> {
        if row >= self.len {
            return None;
        }
        let start = row * self.elem_size;
        let size = self.elem_size;
        Some(&mut self.as_bytes_mut()[start..start + size])
    }

    /// All rows as one contiguous byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        if self.elem_size == 0 || self.len == 0 {
            return &[];
        }
        // SAFETY: the first `len * elem_size` bytes are initialized.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len * self.elem_size) }
    }

    /// All rows as one contiguous mutable byte slice.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        if self.elem_size == 0 || self.len == 0 {
            return &mut [];
        }
        // SAFETY: the first `len * elem_size` bytes are initialized and
        // uniquely borrowed through `&mut self`.
        unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), self.len * self.elem_size) }
    }

    /// # Safety
    /// `row` must be below `capacity` and `elem_size` must be non-zero.
    #[inline]
    unsafe fn row_ptr(&self, row: usize) -> *mut u8 {
        self.data.as_ptr().add(row * self.elem_size)
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if self.elem_size == 0 || self.capacity == 0 {
            return;
        }
        if let Ok(layout) = self.layout_for(self.capacity) {
            // SAFETY: `data` was allocated with exactly this layout.
            unsafe { alloc::dealloc(self.data.as_ptr(), layout) }
        }
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("elem_size", &self.elem_size)
            .field("elem_align", &self.elem_align)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: f32, b: f32) -> Vec<u8> {
        let mut v = Vec::with_capacity(8);
        v.extend_from_slice(&a.to_ne_bytes());
        v.extend_from_slice(&b.to_ne_bytes());
        v
    }

    #[test]
    fn capacity_starts_at_initial_then_doubles() {
        let mut col = Column::new(8, 4, 2);
        assert_eq!(col.capacity(), 0);
        col.push(&pair(0.0, 0.0)).unwrap();
        assert_eq!(col.capacity(), 2);
        col.push(&pair(1.0, 1.0)).unwrap();
        assert_eq!(col.capacity(), 2);
        col.push(&pair(2.0, 2.0)).unwrap();
        assert_eq!(col.capacity(), 4);
        col.push(&pair(3.0, 3.0)).unwrap();
        col.push(&pair(4.0, 4.0)).unwrap();
        assert_eq!(col.capacity(), 8);
        assert!(col.len() <= col.capacity());
    }

    #[test]
    fn growth_preserves_existing_rows() {
        let mut col = Column::new(8, 4, 2);
        for i in 0..100 {
            col.push(&pair(i as f32, -(i as f32))).unwrap();
        }
        for i in 0..100 {
            assert_eq!(col.get(i).unwrap(), pair(i as f32, -(i as f32)).as_slice());
        }
    }

    #[test]
    fn buffer_honors_alignment() {
        let mut col = Column::new(16, 16, 2);
        col.push_zeroed().unwrap();
        assert_eq!(col.as_bytes().as_ptr() as usize % 16, 0);
    }

    #[test]
    fn push_zeroed_fills_with_zero() {
        let mut col = Column::new(4, 4, 2);
        col.push(&[0xFF; 4]).unwrap();
        col.swap_remove(0);
        let row = col.push_zeroed().unwrap();
        assert_eq!(col.get(row).unwrap(), &[0, 0, 0, 0]);
    }

    #[test]
    fn swap_remove_moves_last_row_into_hole() {
        let mut col = Column::new(4, 4, 2);
        for i in 0u32..4 {
            col.push(&i.to_ne_bytes()).unwrap();
        }
        assert_eq!(col.swap_remove(1), Some(3));
        assert_eq!(col.len(), 3);
        assert_eq!(col.get(1).unwrap(), 3u32.to_ne_bytes().as_slice());
        assert_eq!(col.swap_remove(2), None);
        assert_eq!(col.len(), 2);
        assert!(col.get(2).is_none());
    }

    #[test]
    fn zero_sized_rows_never_allocate() {
        let mut col = Column::new(0, 1, 2);
        for _ in 0..10 {
            col.push(&[]).unwrap();
        }
        assert_eq!(col.len(), 10);
        assert_eq!(col.get(3).unwrap(), &[] as &[u8]);
        assert!(col.as_bytes().is_empty());
        assert_eq!(col.swap_remove(0), Some(9));
    }

    #[test]
    fn oversized_growth_reports_overflow() {
        let mut col = Column::new(usize::MAX / 2, 1, 2);
        assert!(matches!(
            col.reserve(4),
            Err(ColumnError::CapacityOverflow { .. })
        ));
        assert_eq!(col.capacity(), 0);
    }
}
