use std::any::type_name;
use std::cell::UnsafeCell;
use std::num::NonZero;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use bytemuck::Pod;
use nm::Event;
use tracing::trace;

use crate::metrics::{RENTAL_BYTES, RENTALS_RELEASED};
use crate::{BUFFER_ALIGNMENT, BytePool, Error, RawBuffer, Result};

/// The state shared by [`Rental`][crate::Rental] and [`SharedRental`][crate::SharedRental]:
/// one pooled buffer viewed as `length` elements of `T`, plus the machinery that returns the
/// buffer to its pool exactly once.
///
/// This is the only place where untyped pool bytes are turned into typed elements. The pool
/// itself knows nothing about `T`.
///
/// Release happens either through an explicit call or when the core is dropped. Both paths
/// call [`release()`][Self::release], which is safe to call any number of times from any
/// number of threads - a single compare-and-set on `released` elects the one call that
/// returns the buffer. Element access never takes a lock.
pub(crate) struct RentalCore<T: Pod> {
    /// Address of the first element. Null once the rental has been released.
    ///
    /// For empty rentals (zero length or zero-sized `T`) this is a dangling but well-aligned
    /// pointer, as no memory is needed to hold the elements.
    base: AtomicPtr<T>,

    length: usize,

    released: AtomicBool,

    /// The buffer that holds the elements. `None` for empty rentals.
    ///
    /// Only ever touched by the single `release()` call that wins the `released` transition.
    buffer: UnsafeCell<Option<RawBuffer>>,

    /// The pool the buffer came from and must go back to.
    pool: BytePool,
}

impl<T: Pod> RentalCore<T> {
    /// Acquires a buffer for `length` elements of `T` from `pool` and zero-fills it.
    ///
    /// All size validation happens before the pool is consulted, so a failed call
    /// leaves the pool untouched.
    pub(crate) fn new(length: usize, pool: BytePool) -> Result<Self> {
        let element_size = size_of::<T>();

        let byte_len = element_size
            .checked_mul(length)
            .ok_or(Error::SizeOverflow {
                length,
                element_size,
            })?;

        if align_of::<T>() > BUFFER_ALIGNMENT {
            return Err(Error::UnsupportedAlignment {
                alignment: align_of::<T>(),
                max: BUFFER_ALIGNMENT,
            });
        }

        pool.check_size(byte_len)?;

        RENTAL_BYTES.with(|event| event.observe(byte_len));

        let (buffer, base) = match NonZero::new(byte_len) {
            Some(non_zero_len) => {
                let buffer = pool.acquire(non_zero_len)?;

                // Pooled buffers contain whatever the previous tenant left behind.
                // SAFETY: The pool guarantees the buffer holds at least `byte_len` bytes.
                unsafe {
                    buffer.ptr().as_ptr().write_bytes(0, byte_len);
                }

                let base = buffer.ptr().cast::<T>();
                (Some(buffer), base)
            }
            None => (None, NonNull::dangling()),
        };

        trace!(
            element_type = type_name::<T>(),
            length, byte_len, "rented array"
        );

        Ok(Self {
            base: AtomicPtr::new(base.as_ptr()),
            length,
            released: AtomicBool::new(false),
            buffer: UnsafeCell::new(buffer),
            pool,
        })
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.length
    }

    #[must_use]
    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    #[must_use]
    pub(crate) fn pool(&self) -> &BytePool {
        &self.pool
    }

    /// Address of the first element, valid until the rental is released.
    pub(crate) fn base(&self) -> Result<NonNull<T>> {
        // Acquire pairs with the Release store in `release()`.
        NonNull::new(self.base.load(Ordering::Acquire)).ok_or(Error::Released)
    }

    /// Address of the first element without checking for release.
    ///
    /// # Safety
    ///
    /// The rental must not have been released.
    #[must_use]
    pub(crate) unsafe fn base_unchecked(&self) -> NonNull<T> {
        let base = self.base.load(Ordering::Relaxed);

        debug_assert!(!base.is_null(), "rental accessed after release");

        // SAFETY: Forwarding guarantee from the caller.
        unsafe { NonNull::new_unchecked(base) }
    }

    /// The elements as a raw slice.
    ///
    /// Turning this into a reference is sound as long as the rental is not released while the
    /// reference is alive and Rust aliasing rules are upheld: every element is initialized
    /// (zero-filled at construction, `T: Pod` accepts any bit pattern) and aligned.
    pub(crate) fn elements(&self) -> Result<NonNull<[T]>> {
        Ok(NonNull::slice_from_raw_parts(self.base()?, self.length))
    }

    /// Returns the buffer to the pool unless that has already happened.
    ///
    /// Returns `true` if this call performed the release, `false` if it was a no-op.
    pub(crate) fn release(&self) -> bool {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        // SAFETY: Only the single caller that won the transition above gets here,
        // so nothing else can be accessing the cell.
        let buffer = unsafe { (*self.buffer.get()).take() };

        if let Some(buffer) = buffer {
            self.pool.release(buffer);
        }

        // Invalidated after the pool return. Release pairs with the Acquire load in `base()`.
        self.base.store(ptr::null_mut(), Ordering::Release);

        RENTALS_RELEASED.with(Event::observe_once);
        trace!(
            element_type = type_name::<T>(),
            length = self.length,
            "released rental"
        );

        true
    }
}

impl<T: Pod> Drop for RentalCore<T> {
    fn drop(&mut self) {
        self.release();
    }
}

// SAFETY: The buffer is exclusively owned and has no thread affinity. Moving the core to
// another thread moves the elements with it, which is fine as long as `T` itself is `Send`.
unsafe impl<T: Pod + Send> Send for RentalCore<T> {}

// SAFETY: The buffer cell is only accessed by the single winner of the atomic `released`
// transition. Everything else reachable through `&self` is either atomic or yields `&T`,
// which is fine to share across threads as long as `T` is `Sync`.
unsafe impl<T: Pod + Sync> Sync for RentalCore<T> {}
