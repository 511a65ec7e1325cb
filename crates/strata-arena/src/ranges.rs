//! First-fit free-range tracking with coalescing.

use std::collections::BTreeMap;

/// Tracks which element ranges of an arena are free.
///
/// Free ranges are kept keyed by start, and neighbouring ranges are merged
/// on free, so the map never holds two touching ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FreeRanges {
    free: BTreeMap<u64, u64>,
    capacity: u64,
    free_elements: u64,
}

impl FreeRanges {
    /// A tracker with `[0, capacity)` entirely free.
    pub fn new(capacity: u64) -> Self {
        let mut free = BTreeMap::new();
        if capacity > 0 {
            free.insert(0, capacity);
        }
        Self {
            free,
            capacity,
            free_elements: capacity,
        }
    }

    /// Total tracked elements.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Elements currently free.
    pub fn free_elements(&self) -> u64 {
        self.free_elements
    }

    /// Length of the largest free range.
    pub fn largest_free(&self) -> u64 {
        self.free.values().copied().max().unwrap_or(0)
    }

    /// Length of the free range ending at the capacity, if any.
    pub fn trailing_free(&self) -> u64 {
        match self.free.iter().next_back() {
            Some((&start, &len)) if start + len == self.capacity => len,
            _ => 0,
        }
    }

    /// Reserve the first free range of `n` elements and return its start.
    pub fn allocate(&mut self, n: u64) -> Option<u64> {
        if n == 0 {
            return None;
        }
        let (&start, &len) = self.free.iter().find(|&(_, &len)| len >= n)?;
        self.free.remove(&start);
        if len > n {
            self.free.insert(start + n, len - n);
        }
        self.free_elements -= n;
        Some(start)
    }

    /// Return `[start, start + n)` to the free set.
    ///
    /// Returns `false`, changing nothing, when the range leaves the
    /// capacity or overlaps a range that is already free.
    pub fn free(&mut self, start: u64, n: u64) -> bool {
        let Some(end) = start.checked_add(n) else {
            return false;
        };
        if n == 0 || end > self.capacity {
            return false;
        }
        let prev = self
            .free
            .range(..=start)
            .next_back()
            .map(|(&s, &l)| (s, l));
        let next = self.free.range(start..).next().map(|(&s, &l)| (s, l));
        if matches!(prev, Some((s, l)) if s + l > start) {
            return false;
        }
        if matches!(next, Some((s, _)) if s < end) {
            return false;
        }

        let mut merged_start = start;
        let mut merged_len = n;
        if let Some((s, l)) = prev {
            if s + l == start {
                self.free.remove(&s);
                merged_start = s;
                merged_len += l;
            }
        }
        if let Some((s, l)) = next {
            if s == end {
                self.free.remove(&s);
                merged_len += l;
            }
        }
        self.free.insert(merged_start, merged_len);
        self.free_elements += n;
        true
    }

    /// Extend the capacity to `new_capacity`, freeing the added tail.
    ///
    /// Shrinking is ignored.
    pub fn grow(&mut self, new_capacity: u64) {
        if new_capacity <= self.capacity {
            return;
        }
        let old = self.capacity;
        self.capacity = new_capacity;
        let added = self.free(old, new_capacity - old);
        debug_assert!(added, "grown tail overlapped a free range");
    }

    /// Iterate free ranges as `(start, len)` in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.free.iter().map(|(&s, &l)| (s, l))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_first_fit() {
        let mut ranges = FreeRanges::new(100);
        assert_eq!(ranges.allocate(10), Some(0));
        assert_eq!(ranges.allocate(10), Some(10));
        assert!(ranges.free(0, 10));
        assert_eq!(ranges.allocate(5), Some(0));
        assert_eq!(ranges.allocate(6), Some(20));
        assert_eq!(ranges.free_elements(), 100 - 10 - 5 - 6);
    }

    #[test]
    fn frees_coalesce_with_both_neighbours() {
        let mut ranges = FreeRanges::new(30);
        let a = ranges.allocate(10).unwrap();
        let b = ranges.allocate(10).unwrap();
        let c = ranges.allocate(10).unwrap();
        assert!(ranges.free(a, 10));
        assert!(ranges.free(c, 10));
        assert_eq!(ranges.iter().count(), 2);
        assert!(ranges.free(b, 10));
        assert_eq!(ranges.iter().collect::<Vec<_>>(), vec![(0, 30)]);
    }

    #[test]
    fn double_free_is_rejected() {
        let mut ranges = FreeRanges::new(10);
        let a = ranges.allocate(4).unwrap();
        assert!(ranges.free(a, 4));
        assert!(!ranges.free(a, 4));
        assert!(!ranges.free(2, 4));
        assert_eq!(ranges.free_elements(), 10);
    }

    #[test]
    fn out_of_range_free_is_rejected() {
        let mut ranges = FreeRanges::new(10);
        ranges.allocate(10).unwrap();
        assert!(!ranges.free(8, 4));
        assert!(!ranges.free(u64::MAX, 2));
    }

    #[test]
    fn grow_merges_with_trailing_free_space() {
        let mut ranges = FreeRanges::new(10);
        ranges.allocate(6).unwrap();
        assert_eq!(ranges.trailing_free(), 4);
        ranges.grow(20);
        assert_eq!(ranges.trailing_free(), 14);
        assert_eq!(ranges.allocate(14), Some(6));
        assert_eq!(ranges.trailing_free(), 0);
    }

    #[test]
    fn zero_sized_requests_fail() {
        let mut ranges = FreeRanges::new(10);
        assert_eq!(ranges.allocate(0), None);
        assert!(!ranges.free(0, 0));
    }
}

#[cfg(all(test, not(miri)))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn free_count_matches_live_ranges(
            ops in prop::collection::vec((any::<bool>(), 1u64..16), 1..200),
        ) {
            let mut ranges = FreeRanges::new(256);
            let mut live: Vec<(u64, u64)> = Vec::new();
            for (alloc, n) in ops {
                if alloc || live.is_empty() {
                    if let Some(start) = ranges.allocate(n) {
                        for &(s, l) in &live {
                            prop_assert!(start + n <= s || s + l <= start);
                        }
                        live.push((start, n));
                    }
                } else {
                    let (s, l) = live.swap_remove(n as usize % live.len());
                    prop_assert!(ranges.free(s, l));
                }
                let used: u64 = live.iter().map(|&(_, l)| l).sum();
                prop_assert_eq!(ranges.free_elements() + used, 256);
            }
        }
    }
}
