use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong inside a [`crate::SlabPool`].
///
/// No operation retries internally; each failure is reported to the
/// immediate caller exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The [`crate::PageProvider`] could not reserve a region of the given
    /// size. Raised by pool construction (the eager first slab) and by
    /// pool growth when every existing slab is full. Outstanding
    /// allocations stay valid after this error.
    #[error("page provider could not reserve {0} bytes")]
    ProviderExhausted(usize),

    /// The pointer handed to [`crate::SlabPool::free`] lies outside every
    /// slab's arena. No bitmap was modified.
    #[error("pointer does not belong to any slab of this pool")]
    NotOwned,

    /// `element_size` or `elements_per_slab` was zero, or their product
    /// overflows `usize`.
    #[error("element size and slab capacity must be non-zero and their product must fit in usize")]
    InvalidLayout,
}
