//! Arena growth: contents survive reallocation, parallel buffers stay in
//! step, and a single growth satisfies any request under the maximum.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use strata_arena::{
    ArenaBufferDesc, ArenaConfig, ArenaError, ExtraView, ModelResourceAllocator, OwnedAllocation,
};
use strata_core::Format;
use strata_test_utils::{byte_pattern, SoftDevice};

fn strided(soft: &Arc<SoftDevice>, initial: u64, strides: &[u32]) -> ModelResourceAllocator {
    ModelResourceAllocator::with_strides(soft.as_device(), "arena", strides, ArenaConfig::new(initial))
        .unwrap()
}

#[test]
fn growth_preserves_existing_contents() {
    let soft = SoftDevice::new();
    let device = soft.as_device();
    let mut arena = strided(&soft, 16, &[4, 12]);
    let first = arena.allocate(16).unwrap();

    let narrow = byte_pattern(16 * 4, 7);
    let wide = byte_pattern(16 * 12, 91);
    soft.poke(&arena.uav(0), 0, &narrow).unwrap();
    soft.poke(&arena.uav(1), 0, &wide).unwrap();

    let second = arena.allocate(40).unwrap();
    assert_eq!(arena.growth_count(), 1);
    assert!(arena.elements() >= 56);
    assert_eq!(second.gpu_index(), 16);
    assert_eq!(first.gpu_index(), 0);

    let narrow_back = device.read_buffer(&arena.srv(0), 0, 16 * 4).unwrap();
    let wide_back = device.read_buffer(&arena.srv(1), 0, 16 * 12).unwrap();
    assert_eq!(narrow_back, narrow);
    assert_eq!(wide_back, wide);
}

#[test]
fn parallel_buffers_share_one_capacity() {
    let soft = SoftDevice::new();
    let mut arena = ModelResourceAllocator::new(
        soft.as_device(),
        "mesh",
        vec![
            ArenaBufferDesc::formatted("index", Format::R32Uint, ExtraView::Index),
            ArenaBufferDesc::formatted("position", Format::R32G32B32Float, ExtraView::Vertex),
            ArenaBufferDesc::structured("skin", 32),
        ],
        ArenaConfig::new(8),
    )
    .unwrap();

    for n in [5, 9, 30, 200, 1] {
        let _ = arena.allocate(n).unwrap();
        for i in 0..arena.buffer_count() {
            assert_eq!(arena.buffer_elements(i), arena.elements());
        }
    }
    assert_eq!(arena.used_elements(), 245);
}

#[test]
fn one_growth_satisfies_an_oversized_request() {
    let soft = SoftDevice::new();
    let mut arena = strided(&soft, 100, &[16]);
    let _a = arena.allocate(60).unwrap();
    let big = arena.allocate(5_000).unwrap();
    assert_eq!(arena.growth_count(), 1);
    assert_eq!(big.element_count(), 5_000);
}

#[test]
fn growth_old_buffers_are_released() {
    let soft = SoftDevice::new();
    let mut arena = strided(&soft, 4, &[4, 4]);
    assert_eq!(soft.live_buffers(), 2);
    let _ = arena.allocate(100).unwrap();
    assert_eq!(soft.live_buffers(), 2);
}

#[test]
fn requests_beyond_the_maximum_fail_cleanly() {
    let soft = SoftDevice::new();
    let mut arena = ModelResourceAllocator::with_strides(
        soft.as_device(),
        "bounded",
        &[4],
        ArenaConfig::new(8).max_elements(64),
    )
    .unwrap();
    let _ = arena.allocate(60).unwrap();
    assert_eq!(
        arena.allocate(10),
        Err(ArenaError::OutOfGpuMemory {
            requested: 10,
            capacity: 64,
            max_elements: 64,
        })
    );
    // The arena is still usable for what fits.
    assert!(arena.allocate(4).is_ok());
}

#[test]
fn device_exhaustion_surfaces_as_out_of_memory() {
    let soft = SoftDevice::with_memory_budget(4 * 1024);
    let mut arena = strided(&soft, 256, &[4]);
    let _ = arena.allocate(256).unwrap();
    assert!(matches!(
        arena.allocate(2_000),
        Err(ArenaError::OutOfGpuMemory { requested: 2_000, .. })
    ));
    assert_eq!(arena.growth_count(), 0);
}

#[test]
fn foreign_and_double_frees_are_rejected() {
    let soft = SoftDevice::new();
    let mut first = strided(&soft, 16, &[4]);
    let mut second = strided(&soft, 16, &[4]);

    let a = first.allocate(4).unwrap();
    assert!(matches!(
        second.free(a.clone()),
        Err(ArenaError::ForeignAllocation { .. })
    ));
    first.free(a.clone()).unwrap();
    assert_eq!(
        first.free(a),
        Err(ArenaError::NotLive {
            gpu_index: 0,
            element_count: 4,
        })
    );
}

#[test]
fn owned_allocations_free_on_drop() {
    let soft = SoftDevice::new();
    let shared = Arc::new(Mutex::new(strided(&soft, 32, &[8])));
    {
        let owned = OwnedAllocation::allocate(&shared, 10).unwrap();
        assert_eq!(owned.gpu_index(), 0);
        assert_eq!(shared.lock().unwrap().used_elements(), 10);
    }
    assert_eq!(shared.lock().unwrap().used_elements(), 0);

    let kept = OwnedAllocation::allocate(&shared, 3).unwrap().release();
    assert_eq!(shared.lock().unwrap().used_elements(), 3);
    shared.lock().unwrap().free(kept).unwrap();
}

#[test]
fn owned_allocation_outliving_the_arena_is_harmless() {
    let soft = SoftDevice::new();
    let shared = Arc::new(Mutex::new(strided(&soft, 8, &[4])));
    let owned = OwnedAllocation::allocate(&shared, 2).unwrap();
    drop(shared);
    drop(owned);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn used_never_exceeds_capacity(
        ops in prop::collection::vec((any::<bool>(), 1u64..64), 1..60),
    ) {
        let soft = SoftDevice::new();
        let mut arena = strided(&soft, 16, &[4, 8]);
        let mut live = Vec::new();
        for (alloc, n) in ops {
            if alloc || live.is_empty() {
                live.push(arena.allocate(n).unwrap());
            } else {
                let victim = live.swap_remove(n as usize % live.len());
                arena.free(victim).unwrap();
            }
            let used: u64 = live.iter().map(|a| a.element_count()).sum();
            prop_assert_eq!(arena.used_elements(), used);
            prop_assert!(arena.used_elements() <= arena.elements());
            for (i, a) in live.iter().enumerate() {
                prop_assert!(a.elements().end <= arena.elements());
                for b in &live[i + 1..] {
                    prop_assert!(
                        a.elements().end <= b.gpu_index() || b.elements().end <= a.gpu_index()
                    );
                }
            }
        }
    }
}
