//! Walkthrough of a pool of 16 byte blocks, 8 per slab: fill the first
//! slab, trigger growth into a second one, then free and reuse.

use slabpool::SlabPool;

fn main() -> slabpool::Result<()> {
    let mut pool = SlabPool::new(16, 8)?;

    let mut blocks = Vec::new();
    for i in 0..8 {
        let block = pool.allocate()?;
        println!("block {i} at {block:p}");
        blocks.push(block);
    }

    let ninth = pool.allocate()?;
    println!(
        "block 8 at {ninth:p} (pool grew to {} slabs)",
        pool.slab_count()
    );

    pool.free(blocks[3])?;
    let reused = pool.allocate()?;
    println!(
        "freed block 3 and got {reused:p} back (same address: {})",
        reused == blocks[3]
    );

    Ok(())
}
