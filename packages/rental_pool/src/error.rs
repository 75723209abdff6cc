use thiserror::Error;

/// Errors that can occur when renting or accessing pooled memory.
///
/// All of these indicate a violated caller contract rather than a transient condition,
/// so retrying the same operation will fail the same way.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The byte footprint of the requested rental is larger than the biggest buffer
    /// the pool is configured to hand out.
    #[error("requested {requested} bytes but the pool hands out at most {max} bytes per buffer")]
    SizeExceeded {
        /// Byte footprint of the requested rental.
        requested: usize,

        /// Maximum buffer size of the pool.
        max: usize,
    },

    /// The byte footprint of the requested rental does not fit in `usize`.
    #[error("{length} elements of {element_size} bytes each overflow the addressable range")]
    SizeOverflow {
        /// Requested number of elements.
        length: usize,

        /// Size of one element in bytes.
        element_size: usize,
    },

    /// The element type requires a stricter alignment than pool buffers provide.
    #[error("element alignment of {alignment} bytes exceeds the pool buffer alignment of {max} bytes")]
    UnsupportedAlignment {
        /// Alignment required by the element type.
        alignment: usize,

        /// Alignment of every pool buffer.
        max: usize,
    },

    /// A bounds-checked access was made outside `0..length`.
    #[error("index {index} is out of range for a rental of {length} elements")]
    IndexOutOfRange {
        /// The index that was requested.
        index: usize,

        /// Number of elements in the rental.
        length: usize,
    },

    /// The rental has already returned its memory to the pool.
    #[error("the rental has already been released back to its pool")]
    Released,
}

/// A specialized `Result` type for rental operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
