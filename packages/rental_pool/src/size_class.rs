//! Mapping of byte sizes to the power-of-two size classes used to bucket pool buffers.

/// Capacity of the smallest size class. Requests for fewer bytes are rounded up to this.
pub(crate) const MIN_CLASS_SIZE: usize = 16;

/// Upper bound for the maximum buffer size of any pool.
///
/// Keeping two bits of headroom guarantees that rounding any permitted size up to the next
/// power of two cannot overflow and that the result is still a valid allocation size.
pub(crate) const MAX_SUPPORTED_BUFFER_SIZE: usize = 1 << (usize::BITS - 2);

const MIN_CLASS_SHIFT: u32 = MIN_CLASS_SIZE.trailing_zeros();

#[allow(
    clippy::cast_possible_truncation,
    reason = "a bit index always fits in usize"
)]
const MAX_CLASS_INDEX: usize =
    (MAX_SUPPORTED_BUFFER_SIZE.trailing_zeros() - MIN_CLASS_SHIFT) as usize;

/// Returns the index of the size class that serves a request for `byte_len` bytes.
///
/// # Panics
///
/// Panics if `byte_len` is greater than [`MAX_SUPPORTED_BUFFER_SIZE`].
#[must_use]
pub(crate) fn class_index(byte_len: usize) -> usize {
    assert!(
        byte_len <= MAX_SUPPORTED_BUFFER_SIZE,
        "size {byte_len} is beyond the largest supported size class"
    );

    let rounded = byte_len
        .max(MIN_CLASS_SIZE)
        .checked_next_power_of_two()
        .expect("guarded by MAX_SUPPORTED_BUFFER_SIZE check above");

    let shift = rounded
        .trailing_zeros()
        .checked_sub(MIN_CLASS_SHIFT)
        .expect("rounded size is never below MIN_CLASS_SIZE");

    usize::try_from(shift).expect("a bit index always fits in usize")
}

/// Returns the nominal capacity of the size class with the given index.
///
/// Pools clamp the largest class to their configured maximum buffer size, so the
/// actual capacity of a buffer may be smaller than this for that one class.
///
/// # Panics
///
/// Panics if the index does not correspond to a supported size class.
#[must_use]
pub(crate) fn class_capacity(index: usize) -> usize {
    assert!(
        index <= MAX_CLASS_INDEX,
        "size class {index} is beyond the largest supported size class"
    );

    let shift = u32::try_from(index).expect("guarded by MAX_CLASS_INDEX check above");

    MIN_CLASS_SIZE
        .checked_shl(shift)
        .expect("guarded by MAX_CLASS_INDEX check above")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn tiny_sizes_share_smallest_class() {
        assert_eq!(class_index(0), 0);
        assert_eq!(class_index(1), 0);
        assert_eq!(class_index(16), 0);
        assert_eq!(class_capacity(0), 16);
    }

    #[test]
    fn sizes_round_up_to_power_of_two() {
        assert_eq!(class_index(17), 1);
        assert_eq!(class_index(32), 1);
        assert_eq!(class_index(33), 2);
        assert_eq!(class_capacity(2), 64);

        // 400_000 bytes round up to 512 KiB.
        let index = class_index(400_000);
        assert_eq!(class_capacity(index), 512 * 1024);
    }

    #[test]
    fn class_capacity_always_fits_request() {
        for byte_len in [0, 1, 15, 16, 17, 100, 4095, 4096, 4097, 1 << 20, (1 << 20) + 1] {
            assert!(class_capacity(class_index(byte_len)) >= byte_len);
        }
    }

    #[test]
    fn largest_supported_size_has_class() {
        let index = class_index(MAX_SUPPORTED_BUFFER_SIZE);
        assert_eq!(class_capacity(index), MAX_SUPPORTED_BUFFER_SIZE);
    }

    #[test]
    #[should_panic]
    fn beyond_largest_supported_size_panics() {
        _ = class_index(MAX_SUPPORTED_BUFFER_SIZE + 1);
    }

    #[test]
    #[should_panic]
    fn beyond_largest_class_index_panics() {
        _ = class_capacity(usize::BITS as usize);
    }
}
