//! A slab: one fixed-capacity region of equal-sized blocks plus the bitmap
//! tracking which of them are handed out.
//!
//! Each slab sits on a single reservation obtained from a
//! [`PageProvider`], laid out as:
//!
//! ```text
//! +--------------+-------+--------------------------------------+
//! |    bitmap    |  pad  |                arena                 |
//! | ceil(len/8)B |       |          len * size bytes            |
//! +--------------+-------+--------------------------------------+
//! ^ region               ^ arena = region + aligned map bytes
//! ```
//!
//! The bitmap is padded to the native word size so the arena starts on a
//! word boundary; bitmap and arena are reserved and released as one unit.
//! Bit `i` set means block `i` is allocated. Block `i` lives at
//! `arena + i * size`.
//!
//! A slab does not remember its own `size`/`len`: every slab in a pool
//! shares the pool's values, so the pool passes them down on each call,
//! and the per-slab footprint stays three words plus the link.

use std::mem;
use std::ptr::NonNull;
use std::slice;

use crate::bitmap::{first_zero, map_bytes};
use crate::error::{Error, Result};
use crate::provider::PageProvider;
use crate::utils::align;

pub(crate) struct Slab {
    /// The next slab in the pool's chain, owned by this one.
    pub next: Option<Box<Slab>>,
    /// Start of the combined bitmap+arena reservation.
    region: NonNull<u8>,
    /// Exact byte count handed to `reserve`; replayed verbatim on release.
    region_len: usize,
    /// Start of the block storage, `region` + aligned bitmap bytes.
    arena: NonNull<u8>,
}

impl Slab {
    /// Reserves and prepares one slab of `len` blocks of `size` bytes.
    ///
    /// The caller has already validated that `size` and `len` are
    /// non-zero. The combined bitmap+arena byte count is checked here: a
    /// slab too large to describe in a `usize` fails with
    /// [`Error::InvalidLayout`] instead of wrapping into an undersized
    /// reservation.
    pub(crate) fn new<P: PageProvider>(provider: &P, size: usize, len: usize) -> Result<Box<Self>> {
        let map_len = align(map_bytes(len), mem::size_of::<usize>());
        let region_len = size
            .checked_mul(len)
            .and_then(|arena_len| arena_len.checked_add(map_len))
            .ok_or(Error::InvalidLayout)?;

        let region = provider
            .reserve(region_len)
            .ok_or(Error::ProviderExhausted(region_len))?;

        unsafe {
            // All blocks start out free.
            region.as_ptr().write_bytes(0, map_len);

            let arena = NonNull::new_unchecked(region.as_ptr().add(map_len));

            Ok(Box::new(Self {
                next: None,
                region,
                region_len,
                arena,
            }))
        }
    }

    /// Claims the first free block, or `None` when the slab is full.
    ///
    /// The bitmap is scanned in 8 byte chunks. Each chunk is assembled
    /// into a word least-significant-byte first, so the scan order does
    /// not depend on host endianness; bytes past the end of the bitmap
    /// are filled in as 0xFF so they can never look free. A zero bit at a
    /// position past `len` is padding in the last real byte, not a block,
    /// and the scan moves on instead of succeeding on it.
    pub(crate) fn allocate(&mut self, size: usize, len: usize) -> Option<NonNull<u8>> {
        let arena = self.arena.as_ptr();
        let map = self.map(len);

        for chunk in 0..map.len().div_ceil(8) {
            let start = chunk * 8;
            let end = usize::min(start + 8, map.len());

            let mut raw = [0xFF_u8; 8];
            raw[..end - start].copy_from_slice(&map[start..end]);

            let Some(bit) = first_zero(u64::from_le_bytes(raw)) else {
                continue;
            };

            let pos = chunk * 64 + bit as usize;
            if pos >= len {
                continue;
            }

            map[pos / 8] |= 1 << (pos % 8);

            // In range by construction: pos < len.
            return Some(unsafe { NonNull::new_unchecked(arena.add(pos * size)) });
        }

        None
    }

    /// Releases the block at `addr` back to this slab.
    ///
    /// Returns `false` when `addr` lies outside this slab's arena, in
    /// which case nothing is modified and the caller should try the next
    /// slab in the chain. Clearing a bit that was already clear succeeds
    /// silently; the bitmap cannot distinguish that from a valid free.
    pub(crate) fn free(&mut self, addr: NonNull<u8>, size: usize, len: usize) -> bool {
        let start = self.arena.as_ptr() as usize;
        let end = start + size * len;
        let addr = addr.as_ptr() as usize;

        if addr < start || addr >= end {
            return false;
        }

        let pos = (addr - start) / size;
        self.map(len)[pos / 8] &= !(1 << (pos % 8));

        true
    }

    /// `true` when `addr` points into this slab's arena.
    #[cfg(test)]
    pub(crate) fn owns(&self, addr: NonNull<u8>, size: usize, len: usize) -> bool {
        let start = self.arena.as_ptr() as usize;

        (start..start + size * len).contains(&(addr.as_ptr() as usize))
    }

    /// Returns the whole reservation to the provider.
    ///
    /// **SAFETY**: `provider` must be the one the slab was created from,
    /// and neither the slab nor any pointer into its arena may be used
    /// afterwards.
    pub(crate) unsafe fn release<P: PageProvider>(&mut self, provider: &P) {
        unsafe {
            provider.release(self.region, self.region_len);
        }
    }

    /// The occupancy bitmap, one bit per block.
    fn map(&mut self, len: usize) -> &mut [u8] {
        // The slab exclusively owns the region and `&mut self` guarantees
        // no other view of it exists.
        unsafe { slice::from_raw_parts_mut(self.region.as_ptr(), map_bytes(len)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HeapPages;

    fn release(mut slab: Box<Slab>) {
        unsafe { slab.release(&HeapPages) };
    }

    #[test]
    fn oversized_layout_is_rejected_before_reserving() {
        // usize::MAX * 1 survives the multiplication; it is adding the
        // bitmap bytes that wraps.
        assert_eq!(
            Err(Error::InvalidLayout),
            Slab::new(&HeapPages, usize::MAX, 1).map(|_| ())
        );
        // And here the multiplication itself overflows.
        assert_eq!(
            Err(Error::InvalidLayout),
            Slab::new(&HeapPages, usize::MAX / 2, 3).map(|_| ())
        );
    }

    #[test]
    fn blocks_are_distinct_and_evenly_spaced() {
        const SIZE: usize = 16;
        const LEN: usize = 8;

        let mut slab = Slab::new(&HeapPages, SIZE, LEN).unwrap();

        let first = slab.allocate(SIZE, LEN).unwrap();
        for i in 1..LEN {
            let addr = slab.allocate(SIZE, LEN).unwrap();
            let offset = addr.as_ptr() as usize - first.as_ptr() as usize;
            assert_eq!(i * SIZE, offset);
        }

        release(slab);
    }

    #[test]
    fn full_slab_reports_full() {
        const SIZE: usize = 8;
        const LEN: usize = 5;

        let mut slab = Slab::new(&HeapPages, SIZE, LEN).unwrap();

        for _ in 0..LEN {
            assert!(slab.allocate(SIZE, LEN).is_some());
        }

        // All real bits are set now; the padding bits of the last byte
        // must not be handed out as a sixth block.
        assert!(slab.allocate(SIZE, LEN).is_none());

        release(slab);
    }

    #[test]
    fn freed_block_is_reused_first() {
        const SIZE: usize = 32;
        const LEN: usize = 4;

        let mut slab = Slab::new(&HeapPages, SIZE, LEN).unwrap();

        let a = slab.allocate(SIZE, LEN).unwrap();
        let _b = slab.allocate(SIZE, LEN).unwrap();

        assert!(slab.free(a, SIZE, LEN));

        // First-fit: the lowest free bit is block 0 again.
        assert_eq!(a, slab.allocate(SIZE, LEN).unwrap());

        release(slab);
    }

    #[test]
    fn foreign_pointer_is_rejected() {
        const SIZE: usize = 16;
        const LEN: usize = 8;

        let mut slab = Slab::new(&HeapPages, SIZE, LEN).unwrap();
        let block = slab.allocate(SIZE, LEN).unwrap();

        let mut outside = 0u8;
        let foreign = NonNull::from(&mut outside);
        assert!(!slab.free(foreign, SIZE, LEN));

        // One past the arena end is not owned either.
        let end = unsafe { NonNull::new_unchecked(slab.arena.as_ptr().add(SIZE * LEN)) };
        assert!(!slab.free(end, SIZE, LEN));

        // The rejected calls touched nothing: block 1 is still the next
        // free block.
        let next = slab.allocate(SIZE, LEN).unwrap();
        let offset = next.as_ptr() as usize - block.as_ptr() as usize;
        assert_eq!(SIZE, offset);

        release(slab);
    }

    #[test]
    fn capacity_beyond_one_word_is_usable() {
        // 130 blocks: two full bitmap words plus a partial third.
        const SIZE: usize = 8;
        const LEN: usize = 130;

        let mut slab = Slab::new(&HeapPages, SIZE, LEN).unwrap();

        let mut blocks = Vec::with_capacity(LEN);
        for _ in 0..LEN {
            blocks.push(slab.allocate(SIZE, LEN).unwrap());
        }
        assert!(slab.allocate(SIZE, LEN).is_none());

        // Free one block in the middle word and one in the partial word;
        // both come back before the slab reports full again.
        assert!(slab.free(blocks[70], SIZE, LEN));
        assert!(slab.free(blocks[129], SIZE, LEN));
        assert_eq!(blocks[70], slab.allocate(SIZE, LEN).unwrap());
        assert_eq!(blocks[129], slab.allocate(SIZE, LEN).unwrap());
        assert!(slab.allocate(SIZE, LEN).is_none());

        release(slab);
    }

    #[test]
    fn blocks_are_writable() {
        const SIZE: usize = 16;
        const LEN: usize = 8;

        let mut slab = Slab::new(&HeapPages, SIZE, LEN).unwrap();

        let block = slab.allocate(SIZE, LEN).unwrap();
        unsafe {
            block.as_ptr().write_bytes(0x5A, SIZE);
            assert_eq!(0x5A, *block.as_ptr());
            assert_eq!(0x5A, *block.as_ptr().add(SIZE - 1));
        }

        release(slab);
    }
}
