//! Metrics for buffer pools and the rentals served from them.
//!
//! The events are thread-local to keep observation cheap on hot rent/release paths.

use nm::{Event, Magnitude};

/// Histogram buckets for the byte footprint of requested rentals.
///
/// Spans small scratch arrays up to the default maximum buffer size.
const RENTAL_BYTES_BUCKETS: &[Magnitude] = &[
    0,
    64,
    1024,
    16 * 1024,
    256 * 1024,
    1024 * 1024,
    16 * 1024 * 1024,
    256 * 1024 * 1024,
    1024 * 1024 * 1024,
];

thread_local! {
    /// A buffer was allocated because no idle buffer of the right size class was available.
    ///
    /// The magnitude is the capacity of the new buffer in bytes.
    pub(crate) static BUFFERS_ALLOCATED: Event = Event::builder()
        .name("rental_pool_buffers_allocated")
        .build();

    /// An idle buffer was handed out again.
    pub(crate) static BUFFERS_REUSED: Event = Event::builder()
        .name("rental_pool_buffers_reused")
        .build();

    /// A buffer was returned and kept idle for reuse.
    pub(crate) static BUFFERS_RETURNED: Event = Event::builder()
        .name("rental_pool_buffers_returned")
        .build();

    /// A buffer was returned but its size class was already full, so it was deallocated.
    pub(crate) static BUFFERS_DISCARDED: Event = Event::builder()
        .name("rental_pool_buffers_discarded")
        .build();

    /// Byte footprint of each rental created, including empty ones.
    pub(crate) static RENTAL_BYTES: Event = Event::builder()
        .name("rental_pool_rental_bytes")
        .histogram(RENTAL_BYTES_BUCKETS)
        .build();

    /// A rental gave its memory back, whether explicitly or on drop.
    pub(crate) static RENTALS_RELEASED: Event = Event::builder()
        .name("rental_pool_rentals_released")
        .build();
}
