use std::{collections::HashMap, ptr::NonNull};

use rand::{Rng, SeedableRng, rngs::StdRng};
use test_log::test;
use tlsf_alloc::{ALIGN_SIZE, ALLOC_OVERHEAD, BlockInfo, CONTROL_SIZE, MappedRegion, POOL_OVERHEAD, Pool, Tlsf};

/// A live allocation and the byte pattern written into it.
struct Live {
    ptr: NonNull<u8>,
    size: usize,
    fill: u8,
}

impl Live {
    fn write(ptr: NonNull<u8>, size: usize, fill: u8) -> Self {
        unsafe { ptr.as_ptr().write_bytes(fill, size) };
        Self { ptr, size, fill }
    }

    fn verify(&self) {
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.size) };
        assert!(
            bytes.iter().all(|&b| b == self.fill),
            "allocation at {:?} was overwritten",
            self.ptr
        );
    }
}

fn blocks(tlsf: &Tlsf<'_>, pool: Pool) -> Vec<BlockInfo> {
    let mut blocks = Vec::new();
    unsafe { tlsf.walk_pool(pool, |info| blocks.push(info)) };
    blocks
}

fn assert_healthy(tlsf: &Tlsf<'_>, pools: &[(Pool, usize)]) {
    tlsf.check().unwrap();

    for &(pool, registered) in pools {
        unsafe { tlsf.check_pool(pool) }.unwrap();

        let accounted: usize = blocks(tlsf, pool).iter().map(|b| b.size + ALLOC_OVERHEAD).sum();
        assert_eq!(accounted, registered + ALLOC_OVERHEAD);
    }
}

fn assert_no_overlap(live: &[Live]) {
    let mut spans: Vec<_> = live.iter().map(|l| (l.ptr.as_ptr() as usize, l.size)).collect();
    spans.sort_unstable();

    for pair in spans.windows(2) {
        assert!(pair[0].0 + pair[0].1 <= pair[1].0, "{pair:?} overlap");
    }
}

#[test]
fn random_workload_keeps_data_and_structure_intact() {
    let mut region = MappedRegion::new(2 << 20).unwrap();
    let len = region.len();
    let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();
    let pools = [(tlsf.get_pool().unwrap(), len - CONTROL_SIZE - POOL_OVERHEAD)];
    let mut rng = StdRng::seed_from_u64(0x7151);
    let mut live: Vec<Live> = Vec::new();

    for phase in 0..20 {
        for _ in 0..500 {
            match rng.gen_range(0..10) {
                0..=4 => {
                    let size = rng.gen_range(1..4096);
                    if let Some(ptr) = tlsf.malloc(size) {
                        assert_eq!(ptr.as_ptr() as usize % ALIGN_SIZE, 0);
                        live.push(Live::write(ptr, size, rng.r#gen()));
                    }
                }
                5 => {
                    let align = 1 << rng.gen_range(3..12);
                    let size = rng.gen_range(1..2048);
                    if let Some(ptr) = tlsf.memalign(align, size) {
                        assert_eq!(ptr.as_ptr() as usize % align, 0);
                        live.push(Live::write(ptr, size, rng.r#gen()));
                    }
                }
                6 if !live.is_empty() => {
                    let index = rng.gen_range(0..live.len());
                    let old = &live[index];
                    old.verify();

                    let size = rng.gen_range(1..8192);
                    if let Some(ptr) = unsafe { tlsf.realloc(Some(old.ptr), size) } {
                        let kept = old.size.min(size);
                        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), kept) };
                        assert!(bytes.iter().all(|&b| b == old.fill));
                        live[index] = Live::write(ptr, size, rng.r#gen());
                    } else {
                        // A failed move leaves the original in place.
                        old.verify();
                    }
                }
                _ if !live.is_empty() => {
                    let victim = live.swap_remove(rng.gen_range(0..live.len()));
                    victim.verify();
                    unsafe { tlsf.free(Some(victim.ptr)) };
                }
                _ => {}
            }
        }

        live.iter().for_each(Live::verify);
        assert_no_overlap(&live);
        assert_healthy(&tlsf, &pools);
        log::debug!("phase {phase}: {} live allocations", live.len());
    }

    for allocation in live.drain(..) {
        allocation.verify();
        unsafe { tlsf.free(Some(allocation.ptr)) };
    }

    let remaining = blocks(&tlsf, pools[0].0);
    assert_eq!(remaining.len(), 1, "pool did not coalesce back: {remaining:?}");
    assert!(!remaining[0].used);
    assert_healthy(&tlsf, &pools);
}

#[test]
fn allocations_spread_over_several_pools() {
    let mut main = MappedRegion::new(64 * 1024).unwrap();
    let mut extra: Vec<_> = (0..3).map(|_| MappedRegion::new(64 * 1024).unwrap()).collect();
    let main_len = main.len();
    let extra_lens: Vec<_> = extra.iter().map(MappedRegion::len).collect();

    let mut tlsf = Tlsf::create_with_pool(main.as_mut_slice()).unwrap();
    let mut pools = vec![(tlsf.get_pool().unwrap(), main_len - CONTROL_SIZE - POOL_OVERHEAD)];
    for (region, len) in extra.iter_mut().zip(extra_lens) {
        let pool = tlsf.add_pool(region.as_mut_slice()).unwrap();
        pools.push((pool, len - POOL_OVERHEAD));
    }

    // Far more than a single pool can hold.
    let mut live = Vec::new();
    while let Some(ptr) = tlsf.malloc(1000) {
        live.push(Live::write(ptr, 1000, live.len() as u8));
    }
    assert!(live.len() > 4 * 50, "only {} allocations fit", live.len());

    let mut per_pool = HashMap::new();
    for allocation in &live {
        let addr = allocation.ptr.as_ptr() as usize;
        let owner = pools
            .iter()
            .position(|(pool, len)| (pool.as_ptr() as usize..pool.as_ptr() as usize + len).contains(&addr))
            .expect("allocation outside every pool");
        *per_pool.entry(owner).or_insert(0) += 1;
    }
    assert_eq!(per_pool.len(), pools.len());

    assert_healthy(&tlsf, &pools);
    assert_no_overlap(&live);

    for allocation in live {
        allocation.verify();
        unsafe { tlsf.free(Some(allocation.ptr)) };
    }
    assert_healthy(&tlsf, &pools);

    // Every extra pool is whole again and can be handed back.
    for &(pool, _) in &pools[1..] {
        assert_eq!(blocks(&tlsf, pool).len(), 1);
        unsafe { tlsf.remove_pool(pool) };
    }

    tlsf.check().unwrap();
    assert!(tlsf.malloc(60 * 1024).is_none());
    assert!(tlsf.malloc(1000).is_some());
}

#[test]
fn freeing_in_every_order_coalesces() {
    let mut region = MappedRegion::new(64 * 1024).unwrap();
    let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();
    let pool = tlsf.get_pool().unwrap();
    let pristine = blocks(&tlsf, pool);
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..50 {
        let mut live: Vec<_> = (0..64).filter_map(|_| tlsf.malloc(rng.gen_range(1..600))).collect();

        // Fisher-Yates shuffle of the free order.
        for i in (1..live.len()).rev() {
            live.swap(i, rng.gen_range(0..=i));
        }

        for ptr in live {
            unsafe { tlsf.free(Some(ptr)) };
        }

        assert_eq!(blocks(&tlsf, pool), pristine);
    }
}
