use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::fmt;
use std::num::NonZero;
use std::ptr::NonNull;

/// Alignment of every buffer handed out by a [`BytePool`][crate::BytePool].
///
/// Element types with a stricter alignment requirement cannot be rented.
pub const BUFFER_ALIGNMENT: usize = 64;

/// A fixed-capacity heap block of untyped bytes.
///
/// The block is allocated once and never moved or resized, so the address returned by
/// [`ptr()`][Self::ptr] is stable for as long as the `RawBuffer` exists, no matter how the
/// `RawBuffer` value itself is moved around (e.g. in and out of pool storage).
///
/// The contents are not initialized by the buffer itself. Whoever exposes the bytes is
/// responsible for writing them before reading them.
pub(crate) struct RawBuffer {
    ptr: NonNull<u8>,
    capacity: NonZero<usize>,
}

impl RawBuffer {
    /// # Panics
    ///
    /// Panics if `capacity` rounded up to the buffer alignment overflows `isize`.
    #[must_use]
    pub(crate) fn new(capacity: NonZero<usize>) -> Self {
        let layout = Self::layout(capacity);

        // SAFETY: The layout has a non-zero size, guaranteed by the NonZero capacity.
        let ptr = unsafe { alloc(layout) };

        let Some(ptr) = NonNull::new(ptr) else {
            handle_alloc_error(layout);
        };

        Self { ptr, capacity }
    }

    fn layout(capacity: NonZero<usize>) -> Layout {
        Layout::from_size_align(capacity.get(), BUFFER_ALIGNMENT)
            .expect("buffer capacity is bounded by the pool's maximum buffer size")
    }

    #[must_use]
    pub(crate) fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        // SAFETY: The pointer came from `alloc()` with the same layout and
        // has not been deallocated before because we own it exclusively.
        unsafe {
            dealloc(self.ptr.as_ptr(), Self::layout(self.capacity));
        }
    }
}

impl fmt::Debug for RawBuffer {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBuffer")
            .field("ptr", &self.ptr)
            .field("capacity", &self.capacity)
            .finish()
    }
}

// SAFETY: The buffer is a uniquely owned heap block with no thread affinity,
// equivalent to a `Box<[u8]>` for thread-safety purposes.
unsafe impl Send for RawBuffer {}

// SAFETY: Shared access only exposes the address and capacity, never the bytes.
unsafe impl Sync for RawBuffer {}
