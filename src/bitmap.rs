//! Bit-level search over a slab's occupancy bitmap.
//!
//! A slab tracks its blocks with one bit per block, a set bit meaning
//! "allocated". Finding a free block is finding the first zero bit, which
//! we do one 64 bit word at a time.
//!
//! Endianness never shows up here: callers assemble each word from the raw
//! bitmap bytes least-significant-byte first (see [`crate::slab`]), so bit
//! `i` of the word is always bit `i % 8` of byte `i / 8` no matter what the
//! host byte order is.

/// Returns the index (0..64) of the least significant zero bit of `word`,
/// or `None` when every bit is set.
///
/// `trailing_zeros` on the complement is the portable spelling of the
/// classic De Bruijn "find first zero" trick and compiles down to a single
/// instruction on every target we care about.
#[inline]
pub(crate) fn first_zero(word: u64) -> Option<u32> {
    let bit = (!word).trailing_zeros();

    (bit < u64::BITS).then_some(bit)
}

/// Number of bitmap bytes needed to track `len` blocks, i.e. `len` bits
/// rounded up to whole bytes.
#[inline]
pub(crate) fn map_bytes(len: usize) -> usize {
    len.div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_word_yields_bit_zero() {
        assert_eq!(Some(0), first_zero(0));
    }

    #[test]
    fn full_word_yields_none() {
        assert_eq!(None, first_zero(u64::MAX));
    }

    #[test]
    fn first_zero_skips_set_bits() {
        assert_eq!(Some(1), first_zero(0b0001));
        assert_eq!(Some(2), first_zero(0b1011));
        assert_eq!(Some(4), first_zero(0b1111));
        assert_eq!(Some(63), first_zero(u64::MAX >> 1));
    }

    #[test]
    fn every_single_hole_is_found() {
        for bit in 0..64 {
            let word = u64::MAX & !(1 << bit);
            assert_eq!(Some(bit), first_zero(word));
        }
    }

    #[test]
    fn map_bytes_rounds_up() {
        assert_eq!(1, map_bytes(1));
        assert_eq!(1, map_bytes(8));
        assert_eq!(2, map_bytes(9));
        assert_eq!(8, map_bytes(64));
        assert_eq!(9, map_bytes(65));
    }
}
