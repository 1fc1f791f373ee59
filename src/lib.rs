//! A fixed-size-block (slab) pool allocator.
//!
//! [`SlabPool`] hands out equal-sized blocks from a chain of pre-reserved
//! memory regions called slabs. Each slab is one reservation holding an
//! occupancy bitmap followed by a contiguous arena of blocks:
//!
//! ```text
//! +--------------+-------+------------------------------------+
//! |    bitmap    |  pad  |               arena                |
//! +--------------+-------+------------------------------------+
//! ```
//!
//! Allocation scans the bitmap for the first zero bit, one 64 bit word at
//! a time, so finding a free block is near constant time. When every slab
//! in the chain is full the pool grows by appending one more slab; it
//! never shrinks, and all slabs are released together when the pool is
//! dropped.
//!
//! Raw memory comes from a [`PageProvider`]: anonymous memory mappings on
//! unix (`MmapPages`), `VirtualAlloc` on windows (`VirtualAllocPages`), or
//! the process heap anywhere ([`HeapPages`]). The pool is generic over the
//! provider, so backends are interchangeable and tests can inject failing
//! ones.
//!
//! # Example
//!
//! ```
//! use slabpool::SlabPool;
//!
//! let mut pool = SlabPool::new(16, 8)?;
//!
//! let block = pool.allocate()?;
//! unsafe { block.as_ptr().write_bytes(0x2A, 16) };
//! pool.free(block)?;
//! # Ok::<(), slabpool::Error>(())
//! ```
//!
//! # What this crate is not
//!
//! Not thread safe: a pool is neither `Send` nor `Sync`, and callers who
//! want to share one must serialize access themselves. Not a general
//! allocator: every block in a pool has the same size, blocks are aligned
//! to multiples of the block size from the arena base and nothing more,
//! and a pool never returns memory to the environment before it is
//! dropped.

mod bitmap;
mod error;
mod pool;
mod provider;
mod slab;
mod utils;

pub use error::{Error, Result};
pub use pool::SlabPool;
#[cfg(unix)]
pub use provider::MmapPages;
#[cfg(windows)]
pub use provider::VirtualAllocPages;
pub use provider::{HeapPages, PageProvider, SystemPages};
