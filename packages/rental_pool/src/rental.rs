use std::any::type_name;
use std::fmt;
use std::ptr::NonNull;
use std::slice;
use std::sync::Arc;

use bytemuck::Pod;

use crate::{BytePool, Error, Iter, RentalCore, Result, SharedRental};

/// A fixed-length array of `T` backed by a buffer rented from a [`BytePool`].
///
/// The rental exclusively owns its buffer from creation until release. All elements start out
/// as zero, regardless of what the buffer held before it was rented. The elements never move,
/// so the address from [`as_ptr()`][Self::as_ptr] stays valid until the rental is released.
///
/// The buffer goes back to the pool exactly once:
///
/// * explicitly via [`release()`][Self::release], which can be called any number of times, or
/// * automatically when the rental is dropped, if it was not released before.
///
/// After release, the checked accessors return [`Error::Released`].
///
/// # Examples
///
/// ```
/// use rental_pool::rent_array;
///
/// let mut samples = rent_array::<f32>(4)?;
///
/// *samples.get_mut(1)? = 0.5;
/// *samples.get_mut(3)? = 1.5;
///
/// let sum: f32 = samples.iter().sum();
/// assert_eq!(sum, 2.0);
///
/// // Returns the buffer to the pool now instead of at the end of the scope.
/// samples.release();
/// assert!(samples.get(0).is_err());
/// # Ok::<(), rental_pool::Error>(())
/// ```
///
/// # Thread safety
///
/// A rental is [`Send`] and [`Sync`] if `T` is. It imposes no synchronization on element
/// access. To release a rental from whichever of several threads finishes last, convert it
/// into a [`SharedRental`] via [`into_shared()`][Self::into_shared].
pub struct Rental<T: Pod> {
    core: RentalCore<T>,
}

impl<T: Pod> Rental<T> {
    pub(crate) fn new(length: usize, pool: BytePool) -> Result<Self> {
        Ok(Self {
            core: RentalCore::new(length, pool)?,
        })
    }

    /// The number of elements in the rental, fixed at creation.
    ///
    /// This does not change when the rental is released.
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

    /// Whether the buffer has already been returned to the pool.
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
    ///
    /// # Example
    ///
    /// ```
    /// use rental_pool::{Error, rent_array};
    ///
    /// let rental = rent_array::<u64>(3)?;
    ///
    /// assert_eq!(rental.get(2)?, &0);
    /// assert_eq!(
    ///     rental.get(3),
    ///     Err(Error::IndexOutOfRange {
    ///         index: 3,
    ///         length: 3
    ///     })
    /// );
    /// # Ok::<(), Error>(())
    /// ```
    pub fn get(&self, index: usize) -> Result<&T> {
        let length = self.len();

        self.as_slice()?
            .get(index)
            .ok_or(Error::IndexOutOfRange { index, length })
    }

    /// Returns an exclusive reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Released`] if the rental has been released and
    /// [`Error::IndexOutOfRange`] if `index` is not less than [`len()`][Self::len].
    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        let length = self.len();

        self.as_mut_slice()?
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, length })
    }

    /// Returns a reference to the element at `index` without any checks.
    ///
    /// # Safety
    ///
    /// The rental must not have been released and `index` must be less than
    /// [`len()`][Self::len].
    #[must_use]
    #[inline]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(index < self.len(), "index {index} out of bounds");

        // SAFETY: Forwarding the not-released guarantee from the caller.
        let base = unsafe { self.core.base_unchecked() };

        // SAFETY: The caller guarantees the index is in bounds.
        let element = unsafe { base.add(index) };

        // SAFETY: The element is part of the rental, initialized and aligned.
        // `&self` prevents exclusive references from existing.
        unsafe { element.as_ref() }
    }

    /// Returns an exclusive reference to the element at `index` without any checks.
    ///
    /// # Safety
    ///
    /// The rental must not have been released and `index` must be less than
    /// [`len()`][Self::len].
    #[must_use]
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.len(), "index {index} out of bounds");

        // SAFETY: Forwarding the not-released guarantee from the caller.
        let base = unsafe { self.core.base_unchecked() };

        // SAFETY: The caller guarantees the index is in bounds.
        let mut element = unsafe { base.add(index) };

        // SAFETY: The element is part of the rental, initialized and aligned.
        // `&mut self` guarantees no other references exist.
        unsafe { element.as_mut() }
    }

    /// Returns all elements as a slice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Released`] if the rental has been released.
    pub fn as_slice(&self) -> Result<&[T]> {
        let elements = self.core.elements()?;

        // SAFETY: Not released (checked above) and `&self` keeps it that way for the lifetime
        // of the returned reference. `&self` also prevents exclusive references from existing.
        Ok(unsafe { elements.as_ref() })
    }

    /// Returns all elements as an exclusive slice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Released`] if the rental has been released.
    pub fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        let mut elements = self.core.elements()?;

        // SAFETY: Not released (checked above) and `&mut self` keeps it that way for the
        // lifetime of the returned reference while also guaranteeing no other references exist.
        Ok(unsafe { elements.as_mut() })
    }

    /// Returns a view over `length` elements starting at `start`, without any checks.
    ///
    /// # Safety
    ///
    /// The rental must not have been released and `start + length` must not exceed
    /// [`len()`][Self::len].
    #[must_use]
    #[inline]
    pub unsafe fn slice_unchecked(&self, start: usize, length: usize) -> &[T] {
        debug_assert!(
            start.checked_add(length).is_some_and(|end| end <= self.len()),
            "range {start}+{length} out of bounds"
        );

        // SAFETY: Forwarding the not-released guarantee from the caller.
        let base = unsafe { self.core.base_unchecked() };

        // SAFETY: The caller guarantees `start` is in bounds.
        let first = unsafe { base.add(start) };

        // SAFETY: The caller guarantees the whole range is in bounds, so every element is
        // part of the rental, initialized and aligned.
        unsafe { slice::from_raw_parts(first.as_ptr(), length) }
    }

    /// Returns an exclusive view over `length` elements starting at `start`, without any checks.
    ///
    /// # Safety
    ///
    /// The rental must not have been released and `start + length` must not exceed
    /// [`len()`][Self::len].
    #[must_use]
    #[inline]
    pub unsafe fn slice_unchecked_mut(&mut self, start: usize, length: usize) -> &mut [T] {
        debug_assert!(
            start.checked_add(length).is_some_and(|end| end <= self.len()),
            "range {start}+{length} out of bounds"
        );

        // SAFETY: Forwarding the not-released guarantee from the caller.
        let base = unsafe { self.core.base_unchecked() };

        // SAFETY: The caller guarantees `start` is in bounds.
        let first = unsafe { base.add(start) };

        // SAFETY: The caller guarantees the whole range is in bounds, so every element is
        // part of the rental, initialized and aligned. `&mut self` guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(first.as_ptr(), length) }
    }

    /// Overwrites every element with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Released`] if the rental has been released.
    pub fn fill(&mut self, value: T) -> Result<()> {
        self.as_mut_slice()?.fill(value);
        Ok(())
    }

    /// Returns an iterator that yields every element by value, in index order.
    ///
    /// # Panics
    ///
    /// Panics if the rental has been released.
    ///
    /// # Example
    ///
    /// ```
    /// use rental_pool::rent_array;
    ///
    /// let mut rental = rent_array::<u8>(3)?;
    /// rental.fill(2)?;
    ///
    /// assert_eq!(rental.iter().collect::<Vec<_>>(), vec![2, 2, 2]);
    ///
    /// // Each call starts a new traversal.
    /// assert_eq!(rental.iter().count(), 3);
    /// # Ok::<(), rental_pool::Error>(())
    /// ```
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
    /// The address is stable and valid for reads and writes of [`len()`][Self::len] elements
    /// until the rental is released. Dereferencing it is subject to the usual aliasing rules
    /// with respect to references obtained from the rental.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Released`] if the rental has been released.
    pub fn as_ptr(&self) -> Result<NonNull<T>> {
        self.core.base()
    }

    /// Returns the buffer to the pool it was rented from.
    ///
    /// Only the first call has an effect; later calls, as well as the drop of the rental,
    /// do nothing. The length is unaffected but all element access fails afterwards.
    ///
    /// # Example
    ///
    /// ```
    /// use rental_pool::BytePool;
    ///
    /// let pool = BytePool::builder().build();
    /// let mut rental = pool.rent::<u32>(100)?;
    ///
    /// rental.release();
    /// rental.release();
    ///
    /// assert!(rental.is_released());
    /// assert_eq!(pool.available(400), 1);
    /// # Ok::<(), rental_pool::Error>(())
    /// ```
    #[inline]
    pub fn release(&mut self) {
        self.core.release();
    }

    /// Converts this exclusive rental into a shared rental that can be cloned and released
    /// from any of its clones.
    #[must_use]
    #[inline]
    pub fn into_shared(self) -> SharedRental<T> {
        SharedRental::new(Arc::new(self.core))
    }
}

impl<'a, T: Pod> IntoIterator for &'a Rental<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Pod> fmt::Debug for Rental<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("length", &self.len())
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
