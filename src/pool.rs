//! The pool: an ordered, growable chain of slabs sharing one block size
//! and capacity.
//!
//! ```text
//! SlabPool
//!    |
//!    | head                next                 next
//!    v                      |                    |
//! +--------+--------+     +-v------+--------+  +-v------+--------+
//! | bitmap | arena  | --> | bitmap | arena  |->| bitmap | arena  | -> (none)
//! +--------+--------+     +--------+--------+  +--------+--------+
//! ```
//!
//! Allocation is first-fit in chain order: every call starts at the head
//! and takes the first free block it finds. Only when every existing slab
//! is full does the pool append a fresh slab at the tail. Nothing caches
//! "the slab that freed most recently"; re-scanning from the head costs a
//! little throughput and keeps the pool three words of state.

use std::ptr::NonNull;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::provider::{PageProvider, SystemPages};
use crate::slab::Slab;

/// A pool of equal-sized memory blocks, carved out of a chain of slabs.
///
/// The pool exclusively owns its slabs and each slab exclusively owns its
/// bitmap+arena region. Pointers returned by [`allocate`](Self::allocate)
/// are borrowed views into slab-owned memory: give them back through
/// [`free`](Self::free), or let the pool's `Drop` invalidate them all at
/// once. The pool holds raw pointers and is deliberately neither `Send`
/// nor `Sync`; callers that want cross-thread use must serialize access
/// externally.
pub struct SlabPool<P: PageProvider = SystemPages> {
    /// First slab of the chain. Always present: construction fails rather
    /// than producing a pool with nothing to allocate from.
    head: Box<Slab>,
    /// Bytes per block, fixed for the pool's lifetime.
    element_size: usize,
    /// Blocks per slab, fixed for the pool's lifetime.
    elements_per_slab: usize,
    provider: P,
}

impl SlabPool<SystemPages> {
    /// Creates a pool of `elements_per_slab` blocks of `element_size`
    /// bytes per slab, backed by the platform's default page provider.
    ///
    /// The first slab is reserved eagerly, so a pool you hold can always
    /// allocate at least once. Fails with [`Error::InvalidLayout`] when
    /// either parameter is zero or a slab's combined bitmap+arena size
    /// does not fit in a `usize`, and with [`Error::ProviderExhausted`]
    /// when the first reservation fails.
    pub fn new(element_size: usize, elements_per_slab: usize) -> Result<Self> {
        Self::new_in(SystemPages::default(), element_size, elements_per_slab)
    }
}

impl<P: PageProvider> SlabPool<P> {
    /// Same as [`new`](SlabPool::new) with a caller-supplied provider.
    pub fn new_in(provider: P, element_size: usize, elements_per_slab: usize) -> Result<Self> {
        if element_size == 0 || elements_per_slab == 0 {
            return Err(Error::InvalidLayout);
        }

        // Slab::new checks that the reservation size is representable.
        let head = Slab::new(&provider, element_size, elements_per_slab)?;

        debug!("slab pool up: {elements_per_slab} blocks of {element_size} bytes per slab");

        Ok(Self {
            head,
            element_size,
            elements_per_slab,
            provider,
        })
    }

    /// Hands out one free block.
    ///
    /// Walks the slab chain in creation order and returns the first free
    /// block. When every slab is full, appends a new slab at the tail and
    /// allocates from it. [`Error::ProviderExhausted`] means the chain
    /// could not grow; the pool and all outstanding allocations are
    /// untouched by the failure.
    ///
    /// The returned block is zeroed on the first allocation from its slot
    /// and left as-is on reuse.
    pub fn allocate(&mut self) -> Result<NonNull<u8>> {
        let (size, len) = (self.element_size, self.elements_per_slab);

        let mut curr = &mut self.head;
        loop {
            if let Some(addr) = curr.allocate(size, len) {
                trace!("allocated block at {addr:p}");
                return Ok(addr);
            }

            curr = match curr.next {
                Some(ref mut next) => next,
                // Every slab so far is full; grow at the tail.
                ref mut tail @ None => {
                    let slab = Slab::new(&self.provider, size, len)?;
                    debug!("pool full, appended a slab of {len} blocks");
                    tail.insert(slab)
                }
            };
        }
    }

    /// Returns a block to the pool.
    ///
    /// Walks the chain until a slab recognizes `addr` as part of its
    /// arena and clears the matching bit. A pointer no slab owns gets
    /// [`Error::NotOwned`] and modifies nothing; this surfaces wild frees
    /// that a silent no-op would mask.
    ///
    /// `addr` must be a pointer previously returned by
    /// [`allocate`](Self::allocate) and not freed since. Freeing the same
    /// block twice is not detected: the second call succeeds against an
    /// already-clear bit, and the block may meanwhile have been handed
    /// out again.
    pub fn free(&mut self, addr: NonNull<u8>) -> Result<()> {
        let (size, len) = (self.element_size, self.elements_per_slab);

        let mut curr = Some(&mut self.head);
        while let Some(slab) = curr {
            if slab.free(addr, size, len) {
                trace!("freed block at {addr:p}");
                return Ok(());
            }
            curr = slab.next.as_mut();
        }

        Err(Error::NotOwned)
    }

    /// Bytes per block.
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Blocks per slab.
    pub fn elements_per_slab(&self) -> usize {
        self.elements_per_slab
    }

    /// Number of slabs currently chained, including full ones.
    pub fn slab_count(&self) -> usize {
        let mut count = 1;
        let mut curr = &self.head;
        while let Some(next) = curr.next.as_ref() {
            count += 1;
            curr = next;
        }

        count
    }

    #[cfg(test)]
    pub(crate) fn head_owns(&self, addr: NonNull<u8>) -> bool {
        self.head
            .owns(addr, self.element_size, self.elements_per_slab)
    }
}

impl<P: PageProvider> Drop for SlabPool<P> {
    /// Releases every slab's region, walking the chain iteratively so a
    /// long pool cannot overflow the stack through recursive `Box` drops.
    fn drop(&mut self) {
        let mut next = self.head.next.take();

        unsafe { self.head.release(&self.provider) };

        let mut count = 1;
        while let Some(mut slab) = next {
            next = slab.next.take();
            unsafe { slab.release(&self.provider) };
            count += 1;
        }

        debug!("slab pool down, released {count} slab(s)");
    }
}
