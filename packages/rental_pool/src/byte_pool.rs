use std::any::type_name;
use std::fmt;
use std::iter;
use std::mem;
use std::num::NonZero;
use std::sync::Arc;

use bytemuck::Pod;
use nm::Event;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::metrics::{BUFFERS_ALLOCATED, BUFFERS_DISCARDED, BUFFERS_RETURNED, BUFFERS_REUSED};
use crate::{BytePoolBuilder, Error, RawBuffer, Rental, Result, class_capacity, class_index};

/// A bounded cache of reusable byte buffers, bucketed by power-of-two size class.
///
/// The pool hands out buffers of at least the requested size and takes them back when the
/// renter is done, keeping up to [`max_buffers_per_class()`][Self::max_buffers_per_class] idle
/// buffers per size class for reuse. Buffers returned to a full size class are deallocated.
/// When no idle buffer is available, a fresh one is allocated - the pool never blocks.
///
/// Most code does not use the pool directly but rents typed arrays from it via
/// [`rent()`][Self::rent] or the process-wide [`rent_array()`][crate::rent_array].
///
/// `BytePool` is a handle: cloning it is cheap and all clones refer to the same pool.
/// Every [`Rental`] holds such a handle and returns its buffer to the same pool it came from.
///
/// # Examples
///
/// ```
/// use rental_pool::BytePool;
///
/// let pool = BytePool::builder()
///     .max_buffer_size(64 * 1024)
///     .max_buffers_per_class(4)
///     .build();
///
/// let mut rental = pool.rent::<u32>(1000)?;
/// rental.fill(7)?;
/// assert_eq!(rental.get(999)?, &7);
///
/// rental.release();
/// assert_eq!(pool.available(4000), 1);
/// # Ok::<(), rental_pool::Error>(())
/// ```
///
/// # Thread safety
///
/// The pool is thread-safe ([`Send`] + [`Sync`]). Each size class is guarded by its own lock,
/// held only while a buffer is pushed to or popped from that class.
#[derive(Clone)]
pub struct BytePool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    max_buffer_size: usize,
    max_buffers_per_class: usize,

    /// Idle buffers, indexed by size class. The last class is clamped to `max_buffer_size`.
    classes: Box<[Mutex<Vec<RawBuffer>>]>,
}

impl BytePool {
    /// Creates a builder for configuring and constructing a [`BytePool`].
    ///
    /// All settings are optional and default to the same values as the
    /// [shared pool][Self::shared].
    ///
    /// # Example
    ///
    /// ```
    /// use rental_pool::BytePool;
    ///
    /// let pool = BytePool::builder().max_buffers_per_class(8).build();
    ///
    /// assert_eq!(pool.max_buffers_per_class(), 8);
    /// assert_eq!(pool.idle_buffers(), 0);
    /// ```
    #[inline]
    pub fn builder() -> BytePoolBuilder {
        BytePoolBuilder::new()
    }

    #[must_use]
    pub(crate) fn new_inner(max_buffer_size: usize, max_buffers_per_class: usize) -> Self {
        let class_count = class_index(max_buffer_size)
            .checked_add(1)
            .expect("size class count is bounded by the number of bits in usize");

        debug!(
            max_buffer_size,
            max_buffers_per_class, class_count, "creating byte pool"
        );

        Self {
            inner: Arc::new(PoolInner {
                max_buffer_size,
                max_buffers_per_class,
                classes: iter::repeat_with(|| Mutex::new(Vec::new()))
                    .take(class_count)
                    .collect(),
            }),
        }
    }

    /// The largest buffer, in bytes, that this pool hands out.
    #[must_use]
    #[inline]
    pub fn max_buffer_size(&self) -> usize {
        self.inner.max_buffer_size
    }

    /// The largest number of idle buffers this pool retains per size class.
    #[must_use]
    #[inline]
    pub fn max_buffers_per_class(&self) -> usize {
        self.inner.max_buffers_per_class
    }

    /// Rents a zero-initialized array of `length` elements of type `T` from this pool.
    ///
    /// The rental owns a buffer from this pool until it is released, either explicitly via
    /// [`Rental::release()`] or by dropping it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeOverflow`] if `size_of::<T>() * length` does not fit in `usize`,
    /// [`Error::SizeExceeded`] if it is larger than [`max_buffer_size()`][Self::max_buffer_size]
    /// and [`Error::UnsupportedAlignment`] if `T` needs a stricter alignment than
    /// [`BUFFER_ALIGNMENT`][crate::BUFFER_ALIGNMENT]. The pool is not touched in these cases.
    ///
    /// # Example
    ///
    /// ```
    /// use rental_pool::BytePool;
    ///
    /// let pool = BytePool::builder().build();
    ///
    /// let rental = pool.rent::<f64>(16)?;
    /// assert_eq!(rental.len(), 16);
    /// assert!(rental.iter().all(|value| value == 0.0));
    /// # Ok::<(), rental_pool::Error>(())
    /// ```
    pub fn rent<T: Pod>(&self, length: usize) -> Result<Rental<T>> {
        Rental::new(length, self.clone())
    }

    /// The number of idle buffers in the size class that serves requests of `byte_size` bytes.
    ///
    /// Returns zero if `byte_size` is larger than [`max_buffer_size()`][Self::max_buffer_size].
    ///
    /// # Example
    ///
    /// ```
    /// use rental_pool::BytePool;
    ///
    /// let pool = BytePool::builder().build();
    ///
    /// let rental = pool.rent::<u8>(100)?;
    /// assert_eq!(pool.available(100), 0);
    ///
    /// drop(rental);
    /// assert_eq!(pool.available(100), 1);
    ///
    /// // Sizes in the same size class are served by the same idle buffers.
    /// assert_eq!(pool.available(120), 1);
    /// # Ok::<(), rental_pool::Error>(())
    /// ```
    #[must_use]
    pub fn available(&self, byte_size: usize) -> usize {
        if byte_size > self.inner.max_buffer_size {
            return 0;
        }

        self.class(class_index(byte_size)).lock().len()
    }

    /// The number of idle buffers across all size classes.
    #[must_use]
    pub fn idle_buffers(&self) -> usize {
        self.inner
            .classes
            .iter()
            .map(|class| class.lock().len())
            .sum()
    }

    /// Deallocates all idle buffers, returning how many were released to the allocator.
    ///
    /// Buffers currently held by rentals are not affected and will still be returned to the
    /// pool when their rentals are released.
    pub fn trim(&self) -> usize {
        let trimmed = self
            .inner
            .classes
            .iter()
            .map(|class| {
                // Deallocate outside the lock.
                let idle = mem::take(&mut *class.lock());
                idle.len()
            })
            .sum();

        debug!(trimmed, "trimmed idle buffers from byte pool");

        trimmed
    }

    /// Whether two handles refer to the same pool.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Verifies that a buffer of `byte_len` bytes can be served by this pool.
    pub(crate) fn check_size(&self, byte_len: usize) -> Result<()> {
        if byte_len > self.inner.max_buffer_size {
            return Err(Error::SizeExceeded {
                requested: byte_len,
                max: self.inner.max_buffer_size,
            });
        }

        Ok(())
    }

    /// Takes a buffer of at least `byte_len` bytes out of the pool, allocating one if the
    /// matching size class has no idle buffers.
    ///
    /// The contents of the buffer are arbitrary.
    pub(crate) fn acquire(&self, byte_len: NonZero<usize>) -> Result<RawBuffer> {
        let byte_len = byte_len.get();
        self.check_size(byte_len)?;

        let index = class_index(byte_len);

        // Pop under the lock, allocate outside of it.
        let idle = self.class(index).lock().pop();

        if let Some(buffer) = idle {
            BUFFERS_REUSED.with(Event::observe_once);
            trace!(
                byte_len,
                capacity = buffer.capacity(),
                "reusing idle buffer"
            );

            return Ok(buffer);
        }

        let capacity = self.capacity_of_class(index);
        let buffer = RawBuffer::new(
            NonZero::new(capacity).expect("every size class has a capacity of at least 1 byte"),
        );

        BUFFERS_ALLOCATED.with(|event| event.observe(capacity));
        trace!(byte_len, capacity, "allocated new buffer");

        Ok(buffer)
    }

    /// Gives a buffer back to the pool. If its size class is full, the buffer is deallocated.
    ///
    /// # Panics
    ///
    /// Panics if the buffer was not acquired from a pool with the same configuration.
    pub(crate) fn release(&self, buffer: RawBuffer) {
        let capacity = buffer.capacity();
        let index = class_index(capacity);

        assert!(
            index < self.inner.classes.len() && self.capacity_of_class(index) == capacity,
            "buffer of {capacity} bytes was not acquired from this pool"
        );

        let mut idle = self.class(index).lock();

        if idle.len() < self.inner.max_buffers_per_class {
            idle.push(buffer);
            drop(idle);

            BUFFERS_RETURNED.with(Event::observe_once);
            trace!(capacity, "returned buffer to pool");
        } else {
            drop(idle);

            // Deallocated here, outside the lock.
            drop(buffer);

            BUFFERS_DISCARDED.with(Event::observe_once);
            debug!(
                capacity,
                max_buffers_per_class = self.inner.max_buffers_per_class,
                "size class is full, discarding returned buffer"
            );
        }
    }

    fn class(&self, index: usize) -> &Mutex<Vec<RawBuffer>> {
        self.inner
            .classes
            .get(index)
            .expect("size class index is bounded by max_buffer_size checks")
    }

    fn capacity_of_class(&self, index: usize) -> usize {
        class_capacity(index).min(self.inner.max_buffer_size)
    }
}

impl fmt::Debug for BytePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("max_buffer_size", &self.inner.max_buffer_size)
            .field("max_buffers_per_class", &self.inner.max_buffers_per_class)
            .field("size_classes", &self.inner.classes.len())
            .field("idle_buffers", &self.idle_buffers())
            .finish()
    }
}
