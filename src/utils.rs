//! Small helpers that don't belong to any particular module.

/// Rounds `to_be_aligned` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two. We use this to pad a slab's bitmap
/// out to the native word size so the arena that follows it starts on a
/// word boundary.
pub(crate) fn align(to_be_aligned: usize, alignment: usize) -> usize {
    (to_be_aligned + alignment - 1) & !(alignment - 1)
}
