//! Allocation-tracking backend for leak and fault testing
//!
//! Counts every call that reaches the backend and the blocks currently handed
//! out, and can be told to fail on demand. Tests use it to prove that a failed
//! operation performed no allocation at all, or that everything it did
//! allocate was given back.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Allocator, AllocatorBackend, Block};

/// When the tracking allocator refuses requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Every request succeeds
    #[default]
    Never,
    /// Every allocate and reallocate request fails
    Always,
    /// The next `n` requests succeed, all later ones fail
    AfterSuccesses(usize),
}

/// Snapshot of allocator activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocationStats {
    /// Calls to `allocate`, successful or not
    pub allocate_calls: usize,
    /// Calls to `deallocate`
    pub deallocate_calls: usize,
    /// Calls to `reallocate`, successful or not
    pub reallocate_calls: usize,
    /// Requests refused by the failure mode
    pub failed_requests: usize,
    /// Blocks handed out and not yet returned
    pub live_blocks: usize,
    /// Capacity of live blocks in bytes
    pub live_bytes: usize,
    /// High-water mark of `live_bytes`
    pub peak_bytes: usize,
}

impl AllocationStats {
    /// Total calls of any kind that reached the allocator.
    pub fn total_calls(&self) -> usize {
        self.allocate_calls + self.deallocate_calls + self.reallocate_calls
    }
}

#[derive(Debug, Default)]
struct TrackingState {
    stats: AllocationStats,
    mode: FailureMode,
}

impl TrackingState {
    /// Consume one request against the failure mode. `true` means refuse.
    fn should_fail(&mut self) -> bool {
        let fail = match &mut self.mode {
            FailureMode::Never => false,
            FailureMode::Always => true,
            FailureMode::AfterSuccesses(0) => true,
            FailureMode::AfterSuccesses(remaining) => {
                *remaining -= 1;
                false
            },
        };
        if fail {
            self.stats.failed_requests += 1;
        }
        fail
    }

    fn track_acquire(&mut self, capacity: usize) {
        self.stats.live_blocks += 1;
        self.stats.live_bytes += capacity;
        self.stats.peak_bytes = self.stats.peak_bytes.max(self.stats.live_bytes);
    }

    fn track_release(&mut self, capacity: usize) {
        debug_assert!(self.stats.live_blocks > 0, "block returned that was never handed out");
        self.stats.live_blocks = self.stats.live_blocks.saturating_sub(1);
        self.stats.live_bytes = self.stats.live_bytes.saturating_sub(capacity);
    }
}

/// Heap allocator that records every call and injects failures on request.
///
/// Share it through an `Arc` and hand [`TrackingAllocator::allocator`] to the
/// code under test; the counters stay readable from the test.
#[derive(Debug, Default)]
pub struct TrackingAllocator {
    state: Mutex<TrackingState>,
}

impl TrackingAllocator {
    /// Tracker that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker whose allocate and reallocate always fail.
    pub fn failing() -> Self {
        Self::with_failure_mode(FailureMode::Always)
    }

    /// Tracker starting in the given failure mode.
    pub fn with_failure_mode(mode: FailureMode) -> Self {
        Self { state: Mutex::new(TrackingState { stats: AllocationStats::default(), mode }) }
    }

    /// Capability routed through this tracker.
    pub fn allocator(self: &Arc<Self>) -> Allocator {
        Allocator::from_backend(Arc::clone(self))
    }

    /// Change the failure mode for subsequent requests.
    pub fn set_failure_mode(&self, mode: FailureMode) {
        self.lock().mode = mode;
    }

    /// Current counters.
    pub fn stats(&self) -> AllocationStats {
        self.lock().stats
    }

    /// Blocks handed out and not yet returned.
    pub fn live_blocks(&self) -> usize {
        self.lock().stats.live_blocks
    }

    fn lock(&self) -> MutexGuard<'_, TrackingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AllocatorBackend for TrackingAllocator {
    fn allocate(&self, size: usize) -> Option<Block> {
        let mut state = self.lock();
        state.stats.allocate_calls += 1;
        if state.should_fail() {
            return None;
        }
        state.track_acquire(size);
        Some(Block::with_capacity(size))
    }

    fn deallocate(&self, block: Block) {
        let mut state = self.lock();
        state.stats.deallocate_calls += 1;
        state.track_release(block.capacity());
    }

    fn reallocate(&self, block: Block, size: usize) -> Result<Block, Block> {
        let mut state = self.lock();
        state.stats.reallocate_calls += 1;
        if state.should_fail() {
            return Err(block);
        }

        let mut resized = Block::with_capacity(size);
        resized.copy_from(&block);
        state.track_release(block.capacity());
        state.track_acquire(size);
        Ok(resized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_balanced_allocations() {
        let tracker = TrackingAllocator::new();

        let a = tracker.allocate(16).expect("allocate");
        let b = tracker.allocate(32).expect("allocate");
        assert_eq!(tracker.stats().live_bytes, 48);

        tracker.deallocate(a);
        tracker.deallocate(b);

        let stats = tracker.stats();
        assert_eq!(stats.allocate_calls, 2);
        assert_eq!(stats.deallocate_calls, 2);
        assert_eq!(stats.live_blocks, 0);
        assert_eq!(stats.live_bytes, 0);
        assert_eq!(stats.peak_bytes, 48);
    }

    #[test]
    fn failing_tracker_refuses_everything() {
        let tracker = TrackingAllocator::failing();

        assert!(tracker.allocate(8).is_none());
        assert!(tracker.reallocate(Block::with_capacity(1), 8).is_err());

        let stats = tracker.stats();
        assert_eq!(stats.failed_requests, 2);
        assert_eq!(stats.live_blocks, 0);
    }

    #[test]
    fn fails_after_budget_is_spent() {
        let tracker = TrackingAllocator::with_failure_mode(FailureMode::AfterSuccesses(2));

        let a = tracker.allocate(1).expect("first succeeds");
        let b = tracker.allocate(1).expect("second succeeds");
        assert!(tracker.allocate(1).is_none());

        tracker.deallocate(a);
        tracker.deallocate(b);
        assert_eq!(tracker.live_blocks(), 0);
    }

    #[test]
    fn reallocate_moves_accounting_to_new_size() {
        let tracker = TrackingAllocator::new();

        let mut block = tracker.allocate(4).expect("allocate");
        assert!(block.try_extend(&[1, 2, 3]));

        let grown = tracker.reallocate(block, 64).expect("reallocate");
        assert_eq!(grown.as_slice(), &[1, 2, 3]);
        assert_eq!(tracker.stats().live_bytes, 64);
        assert_eq!(tracker.live_blocks(), 1);

        tracker.deallocate(grown);
        assert_eq!(tracker.live_blocks(), 0);
    }
}
