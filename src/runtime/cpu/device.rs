//! CPU device implementation

use crate::runtime::Device;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Byte budget shared by every clone of a device
#[derive(Debug, Default)]
pub(crate) struct MemoryBudget {
    limit: Option<usize>,
    used: AtomicUsize,
}

impl MemoryBudget {
    /// Reserve `bytes`, or return false if that would exceed the limit
    pub(crate) fn try_reserve(&self, bytes: usize) -> bool {
        let Some(limit) = self.limit else {
            self.used.fetch_add(bytes, Ordering::Relaxed);
            return true;
        };
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= limit)
            })
            .is_ok()
    }

    pub(crate) fn give_back(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::Relaxed);
    }
}

/// Host-memory reference device
///
/// Behaves like a GPU with a fixed amount of memory: allocations beyond the
/// optional limit fail with `OutOfMemory` instead of growing the heap.
#[derive(Clone, Debug, Default)]
pub struct CpuDevice {
    id: usize,
    pub(crate) budget: Arc<MemoryBudget>,
}

impl CpuDevice {
    /// Create a new CPU device with no memory limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a device that refuses to hold more than `bytes` at once
    pub fn with_memory_limit(bytes: usize) -> Self {
        Self {
            id: 0,
            budget: Arc::new(MemoryBudget {
                limit: Some(bytes),
                used: AtomicUsize::new(0),
            }),
        }
    }

    /// Configured limit, if any
    pub fn memory_limit(&self) -> Option<usize> {
        self.budget.limit
    }

    /// Bytes currently allocated on this device
    pub fn memory_in_use(&self) -> usize {
        self.budget.used.load(Ordering::Relaxed)
    }
}

impl Device for CpuDevice {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> String {
        "cpu".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_limit() {
        let dev = CpuDevice::with_memory_limit(100);
        assert!(dev.budget.try_reserve(60));
        assert!(!dev.budget.try_reserve(41));
        assert!(dev.budget.try_reserve(40));
        assert_eq!(dev.memory_in_use(), 100);
        dev.budget.give_back(100);
        assert_eq!(dev.memory_in_use(), 0);
    }

    #[test]
    fn test_clones_share_budget() {
        let dev = CpuDevice::with_memory_limit(8);
        let other = dev.clone();
        assert!(other.budget.try_reserve(8));
        assert!(!dev.budget.try_reserve(1));
    }
}
