//! Memory allocator trait, default implementation and scoped raw allocations
//!
//! Matrix buffers go through [`crate::runtime::BufferManager`]; the raw
//! [`Allocator`] is used directly only for solver scratch space (LU pivots,
//! native workspaces, status words), always wrapped in an [`AllocGuard`].

use crate::error::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Memory allocator trait for runtime backends
pub trait Allocator: Clone + Send + Sync {
    /// Allocate memory of given size
    ///
    /// Returns a device pointer (u64), or `0` for a zero-sized request.
    fn allocate(&self, size_bytes: usize) -> Result<u64>;

    /// Deallocate memory
    fn deallocate(&self, ptr: u64, size_bytes: usize);

    /// Get the total allocated bytes
    fn allocated_bytes(&self) -> usize {
        0 // Default: tracking not supported
    }
}

/// Default allocator that delegates to Runtime methods
///
/// Forwards to the runtime's allocate/deallocate functions and keeps a running
/// count of outstanding bytes shared between clones.
#[derive(Clone, Debug)]
pub struct DefaultAllocator<D> {
    device: D,
    allocate_fn: fn(usize, &D) -> Result<u64>,
    deallocate_fn: fn(u64, usize, &D),
    outstanding: Arc<AtomicUsize>,
}

impl<D: Clone + Send + Sync> DefaultAllocator<D> {
    /// Create a new default allocator
    pub fn new(
        device: D,
        allocate_fn: fn(usize, &D) -> Result<u64>,
        deallocate_fn: fn(u64, usize, &D),
    ) -> Self {
        Self {
            device,
            allocate_fn,
            deallocate_fn,
            outstanding: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the device this allocator is associated with
    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: Clone + Send + Sync> Allocator for DefaultAllocator<D> {
    fn allocate(&self, size_bytes: usize) -> Result<u64> {
        let ptr = (self.allocate_fn)(size_bytes, &self.device)?;
        self.outstanding.fetch_add(size_bytes, Ordering::Relaxed);
        Ok(ptr)
    }

    fn deallocate(&self, ptr: u64, size_bytes: usize) {
        (self.deallocate_fn)(ptr, size_bytes, &self.device);
        self.outstanding.fetch_sub(size_bytes, Ordering::Relaxed);
    }

    fn allocated_bytes(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }
}

/// Scoped raw allocation, freed when dropped
///
/// Used for scratch memory that never escapes a single native call. Every
/// early return between acquisition and the end of the call releases it.
pub struct AllocGuard<'a, A: Allocator> {
    allocator: &'a A,
    ptr: u64,
    size_bytes: usize,
}

impl<'a, A: Allocator> AllocGuard<'a, A> {
    /// Allocate `size_bytes` from `allocator`
    pub fn new(allocator: &'a A, size_bytes: usize) -> Result<Self> {
        let ptr = allocator.allocate(size_bytes)?;
        Ok(Self {
            allocator,
            ptr,
            size_bytes,
        })
    }

    /// Raw device pointer
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.ptr
    }

    /// Size of the allocation in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.size_bytes
    }
}

impl<A: Allocator> Drop for AllocGuard<'_, A> {
    fn drop(&mut self) {
        self.allocator.deallocate(self.ptr, self.size_bytes);
    }
}
