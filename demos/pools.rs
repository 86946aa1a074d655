//! Adds and removes a pool at runtime.

use tlsf_alloc::{MappedRegion, Pool, Tlsf};

fn dump(tlsf: &Tlsf<'_>, name: &str, pool: Pool) {
    println!("{name} at {:p}:", pool.as_ptr());
    unsafe {
        tlsf.walk_pool(pool, |block| {
            let state = if block.used { "used" } else { "free" };
            println!("  {:p} {:>6} bytes {state}", block.ptr, block.size);
        });
    }
}

fn main() {
    env_logger::init();

    let mut main_region = MappedRegion::new(16 * 1024).expect("mmap failed");
    let mut extra_region = MappedRegion::new(128 * 1024).expect("mmap failed");

    let mut tlsf = Tlsf::create_with_pool(main_region.as_mut_slice()).expect("region rejected");
    let main_pool = tlsf.get_pool().expect("no initial pool");

    println!("32 KiB from the main pool: {:?}", tlsf.malloc(32 * 1024));

    let extra_pool = tlsf.add_pool(extra_region.as_mut_slice()).expect("pool rejected");
    let big = tlsf.malloc(32 * 1024);
    let small = tlsf.malloc(256);
    println!("32 KiB with a second pool: {big:?}");

    dump(&tlsf, "main pool", main_pool);
    dump(&tlsf, "extra pool", extra_pool);

    unsafe {
        tlsf.free(big);
        tlsf.free(small);
    }
    tlsf.check().expect("allocator corrupted");

    // Only whole pools can go. Make sure nothing lives in the extra one.
    let mut busy = false;
    unsafe { tlsf.walk_pool(extra_pool, |block| busy |= block.used) };

    if busy {
        println!("extra pool still in use");
    } else {
        unsafe { tlsf.remove_pool(extra_pool) };
        println!("extra pool removed");
    }

    println!("32 KiB after removing it: {:?}", tlsf.malloc(32 * 1024));
}
