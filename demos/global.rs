//! This example shares one allocator between threads through the
//! `GlobalAlloc` trait. See [`LockedHeap`] for the actual trait
//! implementation.
//!
//! The heap isn't registered as `#[global_allocator]` since the runtime
//! allocates before `main` gets a chance to hand it any memory.

use std::{
    alloc::{GlobalAlloc, Layout},
    thread,
};

use tlsf_alloc::{LockedHeap, MappedRegion};

static HEAP: LockedHeap = LockedHeap::empty();

fn main() {
    env_logger::init();

    let region = MappedRegion::new(1 << 20).expect("mmap failed");
    unsafe { HEAP.init(region.as_ptr(), region.len()).expect("region rejected") };
    region.leak();

    // Single value example
    let layout = Layout::new::<u64>();
    unsafe {
        let value = HEAP.alloc(layout).cast::<u64>();
        value.write(22);
        println!("Value: {}, At: {:p}", *value, value);
        HEAP.dealloc(value.cast(), layout);
    }

    // Growing buffer example
    let mut layout = Layout::array::<u32>(4).unwrap();
    let mut buf = unsafe { HEAP.alloc(layout) };
    for capacity in [8, 16, 32, 64] {
        let grown = Layout::array::<u32>(capacity).unwrap();
        buf = unsafe { HEAP.realloc(buf, layout, grown.size()) };
        layout = grown;
        println!("Capacity: {capacity}; At: {buf:p}");
    }
    unsafe { HEAP.dealloc(buf, layout) };

    // Merge example
    let block = Layout::new::<[u8; 64]>();
    let (a, b) = unsafe { (HEAP.alloc(block), HEAP.alloc(block)) };
    unsafe {
        HEAP.dealloc(a, block);
        HEAP.dealloc(b, block);
    }

    let c = unsafe { HEAP.alloc(Layout::new::<[u8; 128]>()) };
    if a == c {
        println!("Correctly reused at {c:p}");
    } else {
        println!("Not correctly reused. A was at {a:p} and C is at {c:p}");
    }
    unsafe { HEAP.dealloc(c, Layout::new::<[u8; 128]>()) };

    // Thread example
    let handles: Vec<_> = (0..4)
        .map(|id| {
            thread::spawn(move || {
                let layout = Layout::from_size_align(512, 64).unwrap();
                for _ in 0..1000 {
                    unsafe {
                        let ptr = HEAP.alloc(layout);
                        assert!(!ptr.is_null());
                        ptr.write_bytes(id, layout.size());
                        HEAP.dealloc(ptr, layout);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let heap = HEAP.lock();
    println!(
        "total: {} used: {} available: {}",
        heap.total_bytes(),
        heap.used_bytes(),
        heap.available_bytes()
    );
}
