//! Fence-tagged byte ring for staging uploads.
//!
//! [`UploadRing`] only does the bookkeeping; the bytes live in a device
//! buffer owned by the worker. Allocations are handed out in ring order
//! and released in the same order once the fence they were tagged with
//! has completed, so a region is never rewritten while a copy may still
//! read it.

use std::collections::VecDeque;

use strata_core::FenceValue;

/// A region of the ring reserved for one staged chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingAllocation {
    /// Byte offset into the ring.
    pub offset: u64,
    /// Reserved bytes.
    pub bytes: u64,
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    /// Bytes consumed from the ring, including alignment padding and any
    /// tail skipped to wrap.
    span: u64,
    /// `None` until the submission using it is known.
    fence: Option<FenceValue>,
}

/// Byte ring with wrap-around and in-order, fence-keyed release.
#[derive(Debug)]
pub struct UploadRing {
    capacity: u64,
    /// Next byte to hand out.
    head: u64,
    /// First byte still in use.
    tail: u64,
    used: u64,
    pending: VecDeque<Pending>,
}

impl UploadRing {
    /// A ring of `capacity` bytes.
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            head: 0,
            tail: 0,
            used: 0,
            pending: VecDeque::new(),
        }
    }

    /// Total bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes reserved and not yet reclaimed.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Largest chunk the worker stages at once.
    ///
    /// Half the ring, so one chunk can be staged while another is in flight.
    pub fn max_allocation_space(&self) -> u64 {
        self.capacity / 2
    }

    /// Reserve `bytes` at an `align`-aligned offset.
    ///
    /// Returns `None` when no contiguous region is free; the caller must
    /// wait for a fence and [`reclaim`](Self::reclaim). A region that
    /// does not fit before the end of the ring wraps to offset zero and
    /// the skipped tail is released along with it.
    pub fn allocate(&mut self, bytes: u64, align: u64) -> Option<RingAllocation> {
        if bytes == 0 || bytes > self.capacity {
            return None;
        }
        if self.used == 0 {
            self.head = 0;
            self.tail = 0;
        }
        let align = align.max(1);
        let wrapped = self.head < self.tail || (self.head == self.tail && self.used > 0);

        let (offset, span) = if wrapped {
            let start = align_up(self.head, align);
            if start + bytes > self.tail {
                return None;
            }
            (start, start + bytes - self.head)
        } else {
            let start = align_up(self.head, align);
            if start + bytes <= self.capacity {
                (start, start + bytes - self.head)
            } else if bytes <= self.tail {
                (0, self.capacity - self.head + bytes)
            } else {
                return None;
            }
        };

        self.head = offset + bytes;
        self.used += span;
        self.pending.push_back(Pending { span, fence: None });
        Some(RingAllocation { offset, bytes })
    }

    /// Tag every allocation made since the previous tag with `fence`.
    pub fn tag(&mut self, fence: FenceValue) {
        for pending in self.pending.iter_mut().rev() {
            if pending.fence.is_some() {
                break;
            }
            pending.fence = Some(fence);
        }
    }

    /// Fence of the oldest allocation still held, if it has been tagged.
    pub fn oldest_fence(&self) -> Option<FenceValue> {
        self.pending.front().and_then(|p| p.fence)
    }

    /// Release, in order, every allocation whose fence is `<= completed`.
    ///
    /// Returns the number of bytes released.
    pub fn reclaim(&mut self, completed: FenceValue) -> u64 {
        let mut released = 0;
        while let Some(front) = self.pending.front() {
            match front.fence {
                Some(fence) if fence <= completed => {
                    released += front.span;
                    self.tail = (self.tail + front.span) % self.capacity;
                    self.pending.pop_front();
                }
                _ => break,
            }
        }
        self.used -= released;
        released
    }
}

fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}
