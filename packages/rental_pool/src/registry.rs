use std::sync::LazyLock;

use bytemuck::Pod;

use crate::{BytePool, Rental, Result};

/// Size in bytes of the largest buffer the [shared pool][BytePool::shared] hands out (1 GiB).
pub const MAX_BUFFER_SIZE: usize = 1 << 30;

/// Number of idle buffers the [shared pool][BytePool::shared] retains per size class.
pub const MAX_BUFFERS_PER_SIZE_CLASS: usize = 50;

static SHARED_POOL: LazyLock<BytePool> = LazyLock::new(|| {
    BytePool::builder()
        .max_buffer_size(MAX_BUFFER_SIZE)
        .max_buffers_per_class(MAX_BUFFERS_PER_SIZE_CLASS)
        .build()
});

impl BytePool {
    /// The process-wide pool used by [`rent_array()`].
    ///
    /// The shared pool is created on first use with [`MAX_BUFFER_SIZE`] and
    /// [`MAX_BUFFERS_PER_SIZE_CLASS`]. Its configuration cannot be changed.
    ///
    /// # Example
    ///
    /// ```
    /// use rental_pool::{BytePool, MAX_BUFFER_SIZE};
    ///
    /// assert_eq!(BytePool::shared().max_buffer_size(), MAX_BUFFER_SIZE);
    /// ```
    #[must_use]
    pub fn shared() -> &'static Self {
        &SHARED_POOL
    }
}

/// Rents a zero-initialized array of `length` elements of type `T` from the
/// [shared pool][BytePool::shared].
///
/// # Errors
///
/// Returns [`Error::SizeExceeded`][crate::Error::SizeExceeded] if the byte footprint of the
/// array is larger than [`MAX_BUFFER_SIZE`]. See [`BytePool::rent()`] for the other errors.
///
/// # Example
///
/// ```
/// use rental_pool::{Error, MAX_BUFFER_SIZE, rent_array};
///
/// let mut numbers = rent_array::<i32>(100_000)?;
/// assert_eq!(numbers.len(), 100_000);
///
/// numbers.fill(7)?;
/// assert_eq!(numbers.get(50_000)?, &7);
///
/// let too_big = rent_array::<u8>(MAX_BUFFER_SIZE + 1);
/// assert!(matches!(too_big, Err(Error::SizeExceeded { .. })));
/// # Ok::<(), Error>(())
/// ```
pub fn rent_array<T: Pod>(length: usize) -> Result<Rental<T>> {
    BytePool::shared().rent(length)
}
