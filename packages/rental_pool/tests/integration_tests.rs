//! Integration tests for the `rental_pool` package.
//!
//! These tests exercise the public API end to end: renting, typed element access, release
//! through every path and buffer reuse across rentals of the same and different types.

use std::iter;
use std::thread;

use rental_pool::{BytePool, Error, MAX_BUFFER_SIZE, Rental, rent_array};

fn private_pool() -> BytePool {
    BytePool::builder()
        .max_buffer_size(16 * 1024 * 1024)
        .max_buffers_per_class(4)
        .build()
}

#[test]
fn length_matches_request() {
    let pool = private_pool();

    for length in [0, 1, 2, 15, 16, 17, 1000, 123_457] {
        let rental = pool.rent::<u16>(length).unwrap();
        assert_eq!(rental.len(), length);
    }
}

#[test]
fn int32_scenario() {
    let pool = private_pool();

    let mut rental = pool.rent::<i32>(100_000).unwrap();
    assert_eq!(rental.len(), 100_000);
    assert!(rental.iter().all(|value| value == 0));

    rental.fill(7).unwrap();
    assert_eq!(rental.get(50_000), Ok(&7));

    rental.release();
    rental.release();
    assert_eq!(pool.available(400_000), 1);

    let next = pool.rent::<i32>(100_000).unwrap();
    assert_eq!(pool.available(400_000), 0);
    assert!(next.iter().all(|value| value == 0));
}

#[test]
fn int32_scenario_on_shared_pool() {
    let mut rental = rent_array::<i32>(100_000).unwrap();
    assert!(rental.iter().all(|value| value == 0));

    rental.fill(7).unwrap();
    assert_eq!(rental.get(50_000), Ok(&7));

    rental.release();
    rental.release();

    let next = rent_array::<i32>(100_000).unwrap();
    assert_eq!(next.len(), 100_000);
    assert!(next.iter().all(|value| value == 0));
}

#[test]
fn oversized_request_fails_before_pool() {
    let result = rent_array::<u8>(MAX_BUFFER_SIZE + 1);

    assert!(matches!(result, Err(Error::SizeExceeded { .. })));

    let pool = private_pool();
    let max = pool.max_buffer_size();

    // Leave one idle buffer in the largest size class.
    drop(pool.rent::<u8>(max).unwrap());
    assert_eq!(pool.available(max), 1);

    let result = pool.rent::<u8>(max + 1);
    assert!(matches!(result, Err(Error::SizeExceeded { .. })));

    let result = pool.rent::<u64>(max);
    assert!(matches!(result, Err(Error::SizeExceeded { .. })));

    // The idle buffer was neither taken nor replaced.
    assert_eq!(pool.available(max), 1);
    assert_eq!(pool.idle_buffers(), 1);
}

#[test]
fn overflowing_request_is_size_overflow() {
    let result = rent_array::<u32>(usize::MAX / 2);

    assert_eq!(
        result.unwrap_err(),
        Error::SizeOverflow {
            length: usize::MAX / 2,
            element_size: 4
        }
    );
}

#[test]
fn read_after_write_at_every_index() {
    let pool = private_pool();
    let mut rental = pool.rent::<u32>(257).unwrap();

    for index in 0..257_u32 {
        *rental.get_mut(index as usize).unwrap() = index * 3 + 1;
    }

    for index in 0..257_u32 {
        assert_eq!(rental.get(index as usize), Ok(&(index * 3 + 1)));
    }
}

#[test]
fn out_of_range_never_touches_memory() {
    let pool = private_pool();
    let mut rental = pool.rent::<u8>(10).unwrap();
    rental.fill(1).unwrap();

    for index in [10, 11, 1000, usize::MAX] {
        assert_eq!(
            rental.get(index),
            Err(Error::IndexOutOfRange { index, length: 10 })
        );
    }

    assert!(rental.iter().all(|value| value == 1));
}

#[test]
fn fill_then_read_every_index() {
    let pool = private_pool();
    let mut rental = pool.rent::<f64>(999).unwrap();

    rental.fill(2.5).unwrap();

    for index in 0..rental.len() {
        assert_eq!(rental.get(index).unwrap().to_bits(), 2.5_f64.to_bits());
    }
}

#[test]
fn repeated_release_returns_once() {
    let pool = private_pool();
    let mut rental = pool.rent::<u8>(4096).unwrap();

    for _ in 0..5 {
        rental.release();
    }
    drop(rental);

    assert_eq!(pool.available(4096), 1);
    assert_eq!(pool.idle_buffers(), 1);
}

#[test]
fn previous_tenant_data_is_never_visible() {
    let pool = private_pool();

    let mut first = pool.rent::<u64>(64).unwrap();
    first.fill(u64::MAX).unwrap();
    let first_address = first.as_ptr().unwrap().cast::<u8>();
    first.release();

    let second = pool.rent::<u64>(64).unwrap();
    assert_eq!(second.as_ptr().unwrap().cast::<u8>(), first_address);
    assert!(second.iter().all(|value| value == 0));
}

#[test]
fn buffer_reused_across_element_types() {
    let pool = private_pool();

    let mut floats = pool.rent::<f64>(128).unwrap();
    floats.fill(1.5).unwrap();
    let address = floats.as_ptr().unwrap().cast::<u8>();
    drop(floats);

    let words = pool.rent::<u32>(256).unwrap();
    assert_eq!(words.as_ptr().unwrap().cast::<u8>(), address);
    assert!(words.iter().all(|value| value == 0));
    drop(words);

    let bytes = pool.rent::<[u8; 4]>(256).unwrap();
    assert_eq!(bytes.as_ptr().unwrap().cast::<u8>(), address);
    assert!(bytes.iter().all(|value| value == [0_u8; 4]));
}

#[test]
fn buffer_returns_to_originating_pool() {
    let first_pool = private_pool();
    let second_pool = private_pool();

    let rental = first_pool.rent::<u8>(100).unwrap();
    assert!(rental.pool().ptr_eq(&first_pool));
    drop(rental);

    assert_eq!(first_pool.available(100), 1);
    assert_eq!(second_pool.available(100), 0);
}

#[test]
fn retention_is_bounded() {
    let pool = BytePool::builder()
        .max_buffer_size(1024)
        .max_buffers_per_class(2)
        .build();

    let rentals = iter::repeat_with(|| pool.rent::<u8>(100).unwrap())
        .take(5)
        .collect::<Vec<_>>();
    drop(rentals);

    assert_eq!(pool.available(100), 2);
}

#[test]
fn traversal_restarts_each_time() {
    let pool = private_pool();
    let mut rental = pool.rent::<u16>(5).unwrap();

    for (index, value) in rental.as_mut_slice().unwrap().iter_mut().enumerate() {
        *value = u16::try_from(index).unwrap();
    }

    let first = rental.iter().collect::<Vec<_>>();
    let second = (&rental).into_iter().collect::<Vec<_>>();

    assert_eq!(first, vec![0_u16, 1, 2, 3, 4]);
    assert_eq!(first, second);
}

#[test]
fn use_after_release_is_reported() {
    let pool = private_pool();
    let mut rental = pool.rent::<i64>(3).unwrap();

    rental.release();

    assert_eq!(rental.get(0), Err(Error::Released));
    assert_eq!(rental.fill(1), Err(Error::Released));
    assert_eq!(rental.len(), 3);
}

#[test]
fn shared_rental_released_concurrently_returns_once() {
    let pool = BytePool::builder()
        .max_buffer_size(1 << 20)
        .max_buffers_per_class(32)
        .build();

    for _ in 0..50 {
        let shared = pool.rent::<u32>(1000).unwrap().into_shared();

        thread::scope(|s| {
            for _ in 0..4 {
                let clone = shared.clone();
                s.spawn(move || {
                    // SAFETY: No thread holds references into the rental.
                    unsafe { clone.release() };
                });
            }

            // The last handle races the explicit releases on the spawned threads.
            s.spawn(move || drop(shared));
        });

        assert_eq!(pool.available(4000), 1);
    }
}

#[test]
fn rentals_can_move_between_threads() {
    let pool = private_pool();
    let mut rental: Rental<u64> = pool.rent(10).unwrap();
    rental.fill(5).unwrap();

    let total = thread::spawn(move || rental.iter().sum::<u64>())
        .join()
        .unwrap();

    assert_eq!(total, 50);
    assert_eq!(pool.available(80), 1);
}
