//! Growth policy for arena capacity.

/// Upper bound on growth, in multiples of the request.
pub const PREALLOCATE_ELEMENTS: u64 = 100;

/// Upper bound on growth, as a percentage of the current size in bytes.
pub const PERCENTAGE_INCREASE_MAX: u64 = 10;

/// Upper bound on a single growth step in bytes.
pub const MAX_GROW_BYTES: u64 = 1024 * 1024;

/// New capacity, in elements, for an arena that must fit `requested` more.
///
/// `stride` is the largest element size among the arena's parallel
/// buffers, so the byte bounds hold for its widest buffer. The arena grows
/// by at least `requested` elements and by at most the smallest of
/// 100x the request, 1 MiB and 10% of the current size.
///
/// A stride of zero is treated as one byte.
pub fn gpu_allocation_strategy(stride: u64, current: u64, requested: u64) -> u64 {
    let stride = stride.max(1);
    let current_bytes = stride.saturating_mul(current);

    let min_bytes = stride.saturating_mul(requested);
    let max_bytes = min_bytes
        .saturating_mul(PREALLOCATE_ELEMENTS)
        .min(MAX_GROW_BYTES)
        .min(current_bytes / 100 * PERCENTAGE_INCREASE_MAX);

    let grow_elements = min_bytes.max(max_bytes) / stride;
    current.saturating_add(grow_elements)
}


#[cfg(all(test, not(miri)))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn growth_always_covers_the_request(
            stride in 1u64..256,
            current in 0u64..10_000_000,
            requested in 1u64..1_000_000,
        ) {
            let grown = gpu_allocation_strategy(stride, current, requested);
            prop_assert!(grown >= current + requested);
            let step_bytes = (grown - current) * stride;
            prop_assert!(step_bytes <= (requested * stride).max(MAX_GROW_BYTES));
        }
    }
}
