//! CPU runtime implementation

use super::client::{CpuAllocator, CpuClient};
use super::device::CpuDevice;
use crate::error::{Error, Result, TransferDirection};
use crate::runtime::Runtime;
use std::alloc::{Layout as AllocLayout, alloc_zeroed, dealloc};

const ALIGN: usize = 64;

fn layout_for(size_bytes: usize) -> Result<AllocLayout> {
    AllocLayout::from_size_align(size_bytes, ALIGN)
        .map_err(|_| Error::OutOfMemory { size: size_bytes })
}

/// Host-memory reference runtime
///
/// Device memory is heap memory, so a device pointer can be dereferenced on
/// the host. Allocation is charged against the device's memory budget.
#[derive(Clone, Debug, Default)]
pub struct CpuRuntime;

impl Runtime for CpuRuntime {
    type Device = CpuDevice;
    type Client = CpuClient;
    type Allocator = CpuAllocator;

    fn name() -> &'static str {
        "cpu"
    }

    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let layout = layout_for(size_bytes)?;
        if !device.budget.try_reserve(size_bytes) {
            return Err(Error::OutOfMemory { size: size_bytes });
        }

        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            device.budget.give_back(size_bytes);
            return Err(Error::OutOfMemory { size: size_bytes });
        }

        Ok(ptr as u64)
    }

    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device) {
        if ptr == 0 || size_bytes == 0 {
            return;
        }

        // allocate() already validated this layout
        let Ok(layout) = layout_for(size_bytes) else {
            return;
        };
        unsafe {
            dealloc(ptr as *mut u8, layout);
        }
        device.budget.give_back(size_bytes);
    }

    fn copy_to_device(src: &[u8], dst: u64, _device: &Self::Device) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        if dst == 0 {
            return Err(Error::transfer(
                TransferDirection::HostToDevice,
                src.len(),
                "null destination",
            ));
        }

        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst as *mut u8, src.len());
        }
        Ok(())
    }

    fn copy_from_device(src: u64, dst: &mut [u8], _device: &Self::Device) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        if src == 0 {
            return Err(Error::transfer(
                TransferDirection::DeviceToHost,
                dst.len(),
                "null source",
            ));
        }

        unsafe {
            std::ptr::copy_nonoverlapping(src as *const u8, dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }

    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        _device: &Self::Device,
    ) -> Result<()> {
        if size_bytes == 0 {
            return Ok(());
        }
        if src == 0 || dst == 0 {
            return Err(Error::transfer(
                TransferDirection::DeviceToDevice,
                size_bytes,
                "null pointer",
            ));
        }

        unsafe {
            // src and dst may overlap
            std::ptr::copy(src as *const u8, dst as *mut u8, size_bytes);
        }
        Ok(())
    }

    fn default_device() -> Self::Device {
        CpuDevice::new()
    }

    fn default_client(device: &Self::Device) -> Result<Self::Client> {
        Ok(CpuClient::new(device.clone()))
    }
}
