#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Fixed-length typed arrays backed by pooled byte buffers.
//!
//! This crate provides [`Rental<T>`], an array of `T` whose storage is rented from a
//! [`BytePool`] of reusable byte buffers. One pool serves arrays of any element type: it only
//! deals in bytes, and each rental reinterprets its buffer as elements of its own type.
//!
//! # Key Features
//!
//! - **Zero-initialized**: Every rental starts out all zeros, never exposing what a previous
//!   tenant of the buffer left behind
//! - **Stable addresses**: Buffers are never moved while rented, so raw pointers stay valid
//! - **Exactly-once return**: The buffer goes back to the pool on the first explicit
//!   [`release()`][Rental::release] or on drop, whichever comes first; repeated releases are
//!   no-ops
//! - **Concurrent release**: [`SharedRental<T>`] can be released from several threads at once
//!   and still returns its buffer exactly once
//! - **Bounded retention**: The pool keeps a limited number of idle buffers per size class and
//!   allocates fresh memory instead of blocking when none are idle
//!
//! # Element types
//!
//! Elements must implement [`bytemuck::Pod`]: plain data without pointers or padding, for which
//! every bit pattern (including all zeros) is a valid value. This is what makes it sound to
//! view recycled bytes as a different type than the previous tenant used.
//!
//! # Examples
//!
//! ```
//! use rental_pool::{BytePool, rent_array};
//!
//! // Rent from the process-wide shared pool.
//! let mut numbers = rent_array::<i32>(100_000)?;
//! assert!(numbers.iter().all(|value| value == 0));
//!
//! numbers.fill(7)?;
//! assert_eq!(numbers.get(50_000)?, &7);
//!
//! // Release early instead of waiting for the end of the scope.
//! numbers.release();
//!
//! // A pool of your own, with its own limits.
//! let pool = BytePool::builder()
//!     .max_buffer_size(1024 * 1024)
//!     .max_buffers_per_class(8)
//!     .build();
//!
//! let floats = pool.rent::<f64>(128)?;
//! drop(floats);
//!
//! // The same buffer can now serve an array of a different type with the same footprint.
//! let words = pool.rent::<u32>(256)?;
//! assert!(words.iter().all(|value| value == 0));
//! # Ok::<(), rental_pool::Error>(())
//! ```
//!
//! # Observability
//!
//! Pool and rental activity is logged via [`tracing`] at `trace` and `debug` levels and
//! recorded as [`nm`] events with the `rental_pool_` prefix.

mod builder;
mod byte_pool;
mod error;
mod iter;
mod metrics;
mod raw_buffer;
mod registry;
mod rental;
mod rental_core;
mod shared_rental;
mod size_class;

pub use builder::*;
pub use byte_pool::*;
pub use error::*;
pub use iter::*;
pub(crate) use raw_buffer::RawBuffer;
pub use raw_buffer::BUFFER_ALIGNMENT;
pub use registry::*;
pub use rental::*;
pub(crate) use rental_core::*;
pub use shared_rental::*;
pub(crate) use size_class::*;
