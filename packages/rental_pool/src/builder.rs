use std::cell::Cell;
use std::marker::PhantomData;

use crate::{BytePool, MAX_BUFFER_SIZE, MAX_BUFFERS_PER_SIZE_CLASS, MAX_SUPPORTED_BUFFER_SIZE};

/// Builder for creating an instance of [`BytePool`].
///
/// You only need to use this builder if you want a pool separate from the
/// [shared pool][BytePool::shared], for example to give a subsystem its own buffer budget.
/// Unset options default to the configuration of the shared pool.
///
/// # Examples
///
/// ```
/// use rental_pool::BytePool;
///
/// let pool = BytePool::builder()
///     .max_buffer_size(1024 * 1024)
///     .max_buffers_per_class(16)
///     .build();
///
/// assert_eq!(pool.max_buffer_size(), 1024 * 1024);
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) but not thread-safe ([`Sync`]).
#[derive(Debug)]
#[must_use]
pub struct BytePoolBuilder {
    max_buffer_size: usize,
    max_buffers_per_class: usize,

    _not_sync: PhantomData<Cell<()>>,
}

impl BytePoolBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            max_buffer_size: MAX_BUFFER_SIZE,
            max_buffers_per_class: MAX_BUFFERS_PER_SIZE_CLASS,
            _not_sync: PhantomData,
        }
    }

    /// Sets the size in bytes of the largest buffer the pool will hand out.
    ///
    /// Requests for rentals with a larger byte footprint fail with
    /// [`Error::SizeExceeded`][crate::Error::SizeExceeded].
    ///
    /// # Examples
    ///
    /// ```
    /// use rental_pool::BytePool;
    ///
    /// let pool = BytePool::builder().max_buffer_size(4096).build();
    ///
    /// assert!(pool.rent::<u8>(4096).is_ok());
    /// assert!(pool.rent::<u8>(4097).is_err());
    /// ```
    #[inline]
    pub fn max_buffer_size(mut self, bytes: usize) -> Self {
        self.max_buffer_size = bytes;
        self
    }

    /// Sets how many idle buffers the pool retains per size class.
    ///
    /// Buffers released while their size class already holds this many idle buffers are
    /// deallocated instead of being retained. Zero disables retention altogether.
    #[inline]
    pub fn max_buffers_per_class(mut self, count: usize) -> Self {
        self.max_buffers_per_class = count;
        self
    }

    /// Builds the byte pool with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if the maximum buffer size is zero or greater than `1 << (usize::BITS - 2)`.
    #[must_use]
    #[inline]
    pub fn build(self) -> BytePool {
        assert!(
            self.max_buffer_size > 0,
            "BytePool must have a non-zero maximum buffer size"
        );
        assert!(
            self.max_buffer_size <= MAX_SUPPORTED_BUFFER_SIZE,
            "BytePool maximum buffer size {} is greater than the supported limit {MAX_SUPPORTED_BUFFER_SIZE}",
            self.max_buffer_size
        );

        BytePool::new_inner(self.max_buffer_size, self.max_buffers_per_class)
    }
}
