use rempool::prelude::*;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let pool = PoolOptions::new(64).pre_alloc(4).max_alloc(8).build();
    println!(
        "created: block_size={} available={} allocated={}",
        pool.block_size(),
        pool.available(),
        pool.allocated()
    );

    let mut held = Vec::new();
    loop {
        match pool.acquire() {
            Ok(block) => held.push(block),
            Err(err) => {
                println!("exhausted after {} blocks: {err}", held.len());
                break;
            }
        }
    }

    let last = held.pop().expect("held at least one block");
    unsafe { pool.release(last) };
    let reused = pool.acquire().expect("acquire after release failed");
    println!("reused the last released block: {}", reused == last);
    held.push(reused);

    for block in held.drain(..) {
        unsafe { pool.release(block) };
    }
    println!(
        "drained: available={} allocated={} bytes={}",
        pool.available(),
        pool.allocated(),
        pool.mem_usage()
    );
}
