//! Reference-device client

use super::device::CpuDevice;
use super::runtime::CpuRuntime;
use crate::error::Result;
use crate::runtime::{BufferManager, DefaultAllocator, Runtime, RuntimeClient};

/// Client for the host-memory reference device
///
/// Clones share one buffer manager, so buffer counters are per device.
#[derive(Clone, Debug)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    allocator: CpuAllocator,
    buffers: BufferManager<CpuRuntime>,
}

impl CpuClient {
    /// Client for `device`, honoring its memory limit
    pub fn new(device: CpuDevice) -> Self {
        let allocator = create_cpu_allocator(device.clone());
        let buffers = BufferManager::new(device.clone(), allocator.clone());
        Self {
            device,
            allocator,
            buffers,
        }
    }

    /// Buffer manager for matrices on this device
    #[inline]
    pub fn buffers(&self) -> &BufferManager<CpuRuntime> {
        &self.buffers
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        // every reference call completes before returning
        Ok(())
    }

    fn allocator(&self) -> &CpuAllocator {
        &self.allocator
    }
}

/// Heap allocator charged against the device budget
pub type CpuAllocator = DefaultAllocator<CpuDevice>;

fn create_cpu_allocator(device: CpuDevice) -> CpuAllocator {
    DefaultAllocator::new(device, CpuRuntime::allocate, CpuRuntime::deallocate)
}
