//! Injectable allocator capability.
//!
//! Every piece of dynamic storage a [`Client`](crate::Client) owns (the
//! resolved service name, request frame buffers) is obtained from an
//! [`Allocator`] supplied through [`ClientOptions`](crate::ClientOptions) and
//! returned to it when no longer needed.
//!
//! An [`Allocator`] is a cloneable value with three slots. `allocate` and
//! `deallocate` are required; `reallocate` is optional, and growth falls back
//! to allocate-copy-deallocate when it is absent. Allocator state lives in
//! whatever the slot closures capture. The usual way to fill the slots is
//! [`Allocator::from_backend`] with an [`AllocatorBackend`] implementation.

mod block;
mod tracking;

use std::sync::Arc;

pub use block::Block;
pub use tracking::{AllocationStats, FailureMode, TrackingAllocator};

use crate::error::ClientError;

/// `allocate` slot: produce a block of at least the requested capacity.
pub type AllocateFn = dyn Fn(usize) -> Option<Block> + Send + Sync;

/// `deallocate` slot: take back a block.
pub type DeallocateFn = dyn Fn(Block) + Send + Sync;

/// `reallocate` slot: resize a block, preserving its contents. On failure the
/// original block is handed back unchanged.
pub type ReallocateFn = dyn Fn(Block, usize) -> Result<Block, Block> + Send + Sync;

/// Memory source behind an [`Allocator`].
///
/// # Invariants
///
/// - A block returned by `allocate(size)` has `capacity() >= size`.
/// - `reallocate` either returns a block holding the original contents
///   (truncated to the new size) or returns the original block untouched.
pub trait AllocatorBackend: Send + Sync {
    /// Allocate a block of `size` bytes. `None` on exhaustion.
    fn allocate(&self, size: usize) -> Option<Block>;

    /// Return a block.
    fn deallocate(&self, block: Block);

    /// Resize a block.
    fn reallocate(&self, block: Block, size: usize) -> Result<Block, Block> {
        let Some(mut resized) = self.allocate(size) else {
            return Err(block);
        };
        resized.copy_from(&block);
        self.deallocate(block);
        Ok(resized)
    }
}

/// Plain heap allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl AllocatorBackend for SystemAllocator {
    fn allocate(&self, size: usize) -> Option<Block> {
        Some(Block::with_capacity(size))
    }

    fn deallocate(&self, block: Block) {
        drop(block);
    }
}

/// Allocator capability passed by value into client options.
#[derive(Clone)]
pub struct Allocator {
    /// Required allocation slot
    pub allocate: Option<Arc<AllocateFn>>,
    /// Required deallocation slot
    pub deallocate: Option<Arc<DeallocateFn>>,
    /// Optional resize slot
    pub reallocate: Option<Arc<ReallocateFn>>,
}

impl Allocator {
    /// Capability backed by the process heap.
    pub fn system() -> Self {
        Self::from_backend(Arc::new(SystemAllocator))
    }

    /// Fill all three slots from a backend.
    pub fn from_backend<B: AllocatorBackend + 'static>(backend: Arc<B>) -> Self {
        let for_allocate = Arc::clone(&backend);
        let for_deallocate = Arc::clone(&backend);
        let for_reallocate = backend;

        Self {
            allocate: Some(Arc::new(move |size: usize| for_allocate.allocate(size))),
            deallocate: Some(Arc::new(move |block: Block| for_deallocate.deallocate(block))),
            reallocate: Some(Arc::new(move |block: Block, size: usize| {
                for_reallocate.reallocate(block, size)
            })),
        }
    }

    /// Check that the required slots are present.
    ///
    /// A missing `reallocate` is accepted.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.allocate.is_none() {
            return Err(ClientError::InvalidArgument("allocator has no allocate function".into()));
        }
        if self.deallocate.is_none() {
            return Err(ClientError::InvalidArgument(
                "allocator has no deallocate function".into(),
            ));
        }
        Ok(())
    }

    /// Allocate a block, translating exhaustion into `BadAlloc`.
    pub fn try_allocate(&self, size: usize) -> Result<Block, ClientError> {
        let allocate = self
            .allocate
            .as_ref()
            .ok_or_else(|| ClientError::BadAlloc("allocator has no allocate function".into()))?;

        match allocate(size) {
            Some(block) if block.capacity() >= size => Ok(block),
            Some(short) => {
                let capacity = short.capacity();
                self.deallocate(short);
                Err(ClientError::BadAlloc(format!(
                    "allocator returned {capacity} bytes, {size} requested"
                )))
            },
            None => Err(ClientError::BadAlloc(format!("failed to allocate {size} bytes"))),
        }
    }

    /// Return a block to the allocator.
    ///
    /// Without a `deallocate` slot the block is simply dropped; [`validate`]
    /// keeps that from happening for anything a client holds.
    ///
    /// [`validate`]: Self::validate
    pub fn deallocate(&self, block: Block) {
        if let Some(deallocate) = &self.deallocate {
            deallocate(block);
        }
    }

    /// Resize a block, preserving its contents.
    ///
    /// Uses the `reallocate` slot when present, otherwise allocates a new
    /// block, copies and returns the old one. On failure the untouched
    /// original block comes back alongside the error so the caller can still
    /// release it.
    pub fn try_reallocate(&self, block: Block, size: usize) -> Result<Block, (Block, ClientError)> {
        let bad_alloc = || ClientError::BadAlloc(format!("failed to reallocate to {size} bytes"));

        if let Some(reallocate) = &self.reallocate {
            return match reallocate(block, size) {
                Ok(resized) if resized.capacity() >= size => Ok(resized),
                Ok(short) => Err((short, bad_alloc())),
                Err(original) => Err((original, bad_alloc())),
            };
        }

        match self.try_allocate(size) {
            Ok(mut resized) => {
                resized.copy_from(&block);
                self.deallocate(block);
                Ok(resized)
            },
            Err(e) => Err((block, e)),
        }
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocator")
            .field("allocate", &self.allocate.is_some())
            .field("deallocate", &self.deallocate.is_some())
            .field("reallocate", &self.reallocate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn missing_required_slots_are_rejected() {
        let mut allocator = Allocator::system();
        allocator.allocate = None;
        assert_eq!(allocator.validate().map_err(|e| e.kind()), Err(ErrorKind::InvalidArgument));

        let mut allocator = Allocator::system();
        allocator.deallocate = None;
        assert_eq!(allocator.validate().map_err(|e| e.kind()), Err(ErrorKind::InvalidArgument));
    }

    #[test]
    fn missing_reallocate_is_tolerated() {
        let mut allocator = Allocator::system();
        allocator.reallocate = None;
        assert!(allocator.validate().is_ok());
    }

    #[test]
    fn reallocate_falls_back_to_allocate_and_copy() {
        let tracker = Arc::new(TrackingAllocator::new());
        let mut allocator = tracker.allocator();
        allocator.reallocate = None;

        let mut block = allocator.try_allocate(4).expect("allocate");
        assert!(block.try_extend(&[1, 2, 3, 4]));

        let grown = allocator.try_reallocate(block, 16).expect("reallocate");
        assert_eq!(grown.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(grown.capacity(), 16);

        allocator.deallocate(grown);

        let stats = tracker.stats();
        assert_eq!(stats.allocate_calls, 2);
        assert_eq!(stats.deallocate_calls, 2);
        assert_eq!(stats.reallocate_calls, 0);
        assert_eq!(stats.live_blocks, 0);
    }

    #[test]
    fn failed_reallocate_returns_original_block() {
        let tracker = Arc::new(TrackingAllocator::new());
        let allocator = tracker.allocator();

        let mut block = allocator.try_allocate(4).expect("allocate");
        assert!(block.try_extend(&[7, 7]));

        tracker.set_failure_mode(FailureMode::Always);
        let (original, err) = allocator.try_reallocate(block, 64).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::BadAlloc);
        assert_eq!(original.as_slice(), &[7, 7]);

        allocator.deallocate(original);
        assert_eq!(tracker.stats().live_blocks, 0);
    }

    #[test]
    fn short_block_from_allocator_is_bad_alloc() {
        let allocator = Allocator {
            allocate: Some(Arc::new(|_: usize| Some(Block::with_capacity(1)))),
            deallocate: Some(Arc::new(|block: Block| drop(block))),
            reallocate: None,
        };

        let err = allocator.try_allocate(8).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::BadAlloc);
    }
}
