use rempool::prelude::*;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // the allocator's element type only sets a block size; the map rebinds
    // to its node type, so any placeholder works
    let alloc: PoolAlloc<u8, 30> = PoolAlloc::new();
    let mut map: ListMap<i32, String, 30> = ListMap::with_alloc(&alloc);

    for i in 0..30 {
        map.insert(i, format!("value-{i}")).expect("insert failed");
    }
    println!("filled: len={} pool bytes={}", map.len(), map.mem_usage());

    match map.insert(30, "overflow".to_string()) {
        Ok(_) => println!("unexpected spare capacity"),
        Err(err) => println!("insert past capacity: {err}"),
    }

    map.remove(&12);
    map.insert(30, "fits now".to_string())
        .expect("insert after remove failed");

    for (key, value) in map.iter().take(5) {
        println!("{key} -> {value}");
    }
}
