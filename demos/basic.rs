use std::ptr::NonNull;

use tlsf_alloc::{CONTROL_SIZE, MappedRegion, POOL_OVERHEAD, Tlsf};

fn log_alloc(size: usize, addr: Option<NonNull<u8>>) {
    println!("Requested {size} bytes of memory");
    println!("Received this address: {addr:?}");
}

fn main() {
    env_logger::init();

    let mut region = MappedRegion::new(64 * 1024).expect("mmap failed");
    println!(
        "Region of {} bytes: {CONTROL_SIZE} for the allocator, {POOL_OVERHEAD} for pool bookkeeping",
        region.len()
    );

    let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).expect("region rejected");

    let addr1 = tlsf.malloc(8);
    log_alloc(8, addr1);

    let addr2 = tlsf.malloc(100);
    log_alloc(100, addr2);

    let addr3 = tlsf.memalign(256, 16);
    log_alloc(16, addr3);

    unsafe { tlsf.free(addr2) };

    // The block just freed is the first candidate for the same size again.
    let addr4 = tlsf.malloc(100);
    log_alloc(100, addr4);
    println!("Reused freed block: {}", addr2 == addr4);

    // Way more than the pool holds.
    let addr5 = tlsf.malloc(70_000);
    log_alloc(70_000, addr5);

    unsafe {
        tlsf.walk_pool(tlsf.get_pool().expect("no initial pool"), |block| {
            let state = if block.used { "used" } else { "free" };
            println!("  {:p} {:>6} bytes {state}", block.ptr, block.size);
        });

        tlsf.free(addr1);
        tlsf.free(addr3);
        tlsf.free(addr4);
    }

    tlsf.check().expect("allocator corrupted");
}
