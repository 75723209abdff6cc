use std::any::type_name;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use bytemuck::Pod;

use crate::{BytePool, Error, Iter, RentalCore, Result};

/// A shared handle to a rented array, created via [`Rental::into_shared()`][1].
///
/// Clones of a `SharedRental` all refer to the same elements. The buffer returns to its pool
/// exactly once: either when any clone calls [`release()`][Self::release] (any number of times,
/// from any number of threads, concurrently) or when the last clone is dropped.
///
/// Shared handles only offer shared access to the elements. Writes have to go through the
/// raw pointer from [`as_ptr()`][Self::as_ptr], with the caller responsible for synchronizing
/// them with any other access.
///
/// # Examples
///
/// ```
/// use std::iter;
/// use std::thread;
///
/// use rental_pool::BytePool;
///
/// let pool = BytePool::builder().build();
///
/// let mut rental = pool.rent::<u64>(1024)?;
/// rental.fill(3)?;
/// let rental = rental.into_shared();
///
/// let sums = thread::scope(|s| {
///     let workers = iter::repeat_with(|| {
///         let rental = rental.clone();
///         s.spawn(move || rental.iter().sum::<u64>())
///     })
///     .take(4)
///     .collect::<Vec<_>>();
///
///     workers
///         .into_iter()
///         .map(|worker| worker.join().unwrap())
///         .collect::<Vec<_>>()
/// });
///
/// assert_eq!(sums, vec![3072; 4]);
///
/// // SAFETY: All other clones are gone and no references into the rental remain.
/// unsafe { rental.release() };
/// assert_eq!(pool.available(8192), 1);
/// # Ok::<(), rental_pool::Error>(())
/// ```
///
/// [1]: crate::Rental::into_shared
pub struct SharedRental<T: Pod> {
    core: Arc<RentalCore<T>>,
}

impl<T: Pod> SharedRental<T> {
    pub(crate) fn new(core: Arc<RentalCore<T>>) -> Self {
        Self { core }
    }

    /// The number of elements in the rental, fixed at creation.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Whether the rental has zero elements.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    /// Whether the buffer has already been returned to the pool, via any clone.
    #[must_use]
    #[inline]
    pub fn is_released(&self) -> bool {
        self.core.is_released()
    }

    /// The pool this rental's buffer came from and will be returned to.
    #[must_use]
    #[inline]
    pub fn pool(&self) -> &BytePool {
        self.core.pool()
    }

    /// Returns a reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Released`] if the rental has been released and
    /// [`Error::IndexOutOfRange`] if `index` is not less than [`len()`][Self::len].
    pub fn get(&self, index: usize) -> Result<&T> {
        let length = self.len();

        self.as_slice()?
            .get(index)
            .ok_or(Error::IndexOutOfRange { index, length })
    }

    /// Returns all elements as a slice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Released`] if the rental has been released.
    pub fn as_slice(&self) -> Result<&[T]> {
        let elements = self.core.elements()?;

        // SAFETY: Not released (checked above). Releasing while the reference is alive
        // violates the contract of the unsafe `release()`, so it stays valid. Shared handles
        // never create exclusive references.
        Ok(unsafe { elements.as_ref() })
    }

    /// Returns an iterator that yields every element by value, in index order.
    ///
    /// # Panics
    ///
    /// Panics if the rental has been released.
    #[must_use]
    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(
            self.as_slice()
                .expect("cannot iterate over a rental that has been released"),
        )
    }

    /// Returns the address of the first element.
    ///
    /// The address is stable and valid for [`len()`][Self::len] elements until the rental is
    /// released. Writing through it requires that no references to the written elements exist
    /// and that concurrent access from other threads is synchronized by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Released`] if the rental has been released.
    pub fn as_ptr(&self) -> Result<NonNull<T>> {
        self.core.base()
    }

    /// Returns the buffer to the pool it was rented from.
    ///
    /// This may be called any number of times from any clone on any thread, including
    /// concurrently. Exactly one call returns the buffer; the rest do nothing. If no clone ever
    /// calls this, the buffer is returned when the last clone is dropped.
    ///
    /// # Safety
    ///
    /// No reference obtained from any clone of this rental may be alive when this is called or
    /// used afterwards, and no other thread may be accessing the elements at the same time.
    #[inline]
    pub unsafe fn release(&self) {
        self.core.release();
    }
}

impl<T: Pod> Clone for SharedRental<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<'a, T: Pod> IntoIterator for &'a SharedRental<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Pod> fmt::Debug for SharedRental<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("length", &self.len())
            .field("released", &self.is_released())
            .field("handles", &Arc::strong_count(&self.core))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(SharedRental<u32>: Send, Sync, Clone, fmt::Debug);

    fn pool() -> BytePool {
        BytePool::builder()
            .max_buffer_size(1 << 20)
            .max_buffers_per_class(16)
            .build()
    }

    #[test]
    fn clones_see_same_elements() {
        let mut rental = pool().rent::<u32>(4).unwrap();
        *rental.get_mut(1).unwrap() = 42;

        let shared = rental.into_shared();
        let clone = shared.clone();

        assert_eq!(shared.get(1), Ok(&42));
        assert_eq!(clone.get(1), Ok(&42));
        assert_eq!(shared.as_ptr(), clone.as_ptr());
    }

    #[test]
    fn last_clone_drop_releases() {
        let pool = pool();
        let shared = pool.rent::<u8>(100).unwrap().into_shared();
        let clone = shared.clone();

        drop(shared);
        assert_eq!(pool.available(100), 0);
        assert!(!clone.is_released());

        drop(clone);
        assert_eq!(pool.available(100), 1);
    }

    #[test]
    fn release_via_one_clone_is_seen_by_all() {
        let pool = pool();
        let shared = pool.rent::<u8>(100).unwrap().into_shared();
        let clone = shared.clone();

        // SAFETY: No references into the rental exist.
        unsafe { shared.release() };

        assert!(clone.is_released());
        assert_eq!(clone.get(0), Err(Error::Released));
        assert_eq!(pool.available(100), 1);

        drop(shared);
        drop(clone);
        assert_eq!(pool.available(100), 1);
    }

    #[test]
    fn concurrent_release_returns_once() {
        let pool = pool();
        let shared = pool.rent::<u64>(512).unwrap().into_shared();

        thread::scope(|s| {
            for _ in 0..8 {
                let clone = shared.clone();
                s.spawn(move || {
                    for _ in 0..10 {
                        // SAFETY: No thread holds references into the rental.
                        unsafe { clone.release() };
                    }
                });
            }
        });

        assert!(shared.is_released());
        assert_eq!(pool.available(4096), 1);
    }

    #[test]
    fn writes_through_pointer_are_visible() {
        let shared = pool().rent::<i32>(8).unwrap().into_shared();
        let base = shared.as_ptr().unwrap();

        // SAFETY: Index 5 is in bounds.
        let element = unsafe { base.add(5) };

        // SAFETY: Not released, no references to the element exist, single-threaded.
        unsafe { element.write(-9) };

        assert_eq!(shared.get(5), Ok(&-9));
        assert_eq!(shared.iter().sum::<i32>(), -9);
    }

    #[test]
    fn debug_output_counts_handles() {
        let shared = pool().rent::<u8>(1).unwrap().into_shared();
        let _clone = shared.clone();

        let output = format!("{shared:?}");
        assert!(output.contains("SharedRental"));
        assert!(output.contains("handles: 2"));
    }
}
