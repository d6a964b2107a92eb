//! CUDA runtime implementation

use super::cache::{get_or_create_client, is_cuda_context_valid, log_cuda_memory_error};
use super::client::{CudaAllocator, CudaClient};
use super::device::CudaDevice;
use crate::error::{Error, Result, TransferDirection};
use crate::runtime::{Allocator, Runtime};
use cudarc::driver::sys::{self as drv, CUresult};
use std::ffi::c_void;

/// CUDA runtime
///
/// Every device operation goes through the cached [`CudaClient`] for the
/// device, runs with its context current on the calling thread and is
/// ordered on its stream. Host copies synchronize before returning so host
/// memory can be reused immediately.
#[derive(Clone, Debug, Default)]
pub struct CudaRuntime;

fn require_ptrs(direction: TransferDirection, size: usize, ptrs: &[u64]) -> Result<()> {
    if ptrs.contains(&0) {
        return Err(Error::transfer(direction, size, "null device pointer"));
    }
    Ok(())
}

fn check_copy(direction: TransferDirection, size: usize, result: CUresult) -> Result<()> {
    if result == CUresult::CUDA_SUCCESS {
        Ok(())
    } else {
        Err(Error::transfer(direction, size, format!("{result:?}")))
    }
}

fn drain(client: &CudaClient, direction: TransferDirection, size: usize) -> Result<()> {
    client
        .stream
        .synchronize()
        .map_err(|e| Error::transfer(direction, size, format!("{e:?}")))
}

impl Runtime for CudaRuntime {
    type Device = CudaDevice;
    type Client = CudaClient;
    type Allocator = CudaAllocator;

    fn name() -> &'static str {
        "cuda"
    }

    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }
        get_or_create_client(device)?.allocator.allocate(size_bytes)
    }

    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device) {
        if ptr == 0 {
            return;
        }

        if let Ok(client) = get_or_create_client(device) {
            client.allocator.deallocate(ptr, size_bytes);
            return;
        }
        unsafe {
            if is_cuda_context_valid() {
                let result = drv::cuMemFree_v2(ptr);
                if result != CUresult::CUDA_SUCCESS {
                    log_cuda_memory_error("cuMemFree", ptr, result);
                }
            }
        }
    }

    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()> {
        const DIR: TransferDirection = TransferDirection::HostToDevice;
        if src.is_empty() {
            return Ok(());
        }
        require_ptrs(DIR, src.len(), &[dst])?;

        let client = get_or_create_client(device)?;
        client.bind()?;
        let result = unsafe {
            drv::cuMemcpyHtoDAsync_v2(
                dst,
                src.as_ptr() as *const c_void,
                src.len(),
                client.stream.cu_stream(),
            )
        };
        check_copy(DIR, src.len(), result)?;
        drain(&client, DIR, src.len())
    }

    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()> {
        const DIR: TransferDirection = TransferDirection::DeviceToHost;
        if dst.is_empty() {
            return Ok(());
        }
        require_ptrs(DIR, dst.len(), &[src])?;

        let client = get_or_create_client(device)?;
        client.bind()?;
        let result = unsafe {
            drv::cuMemcpyDtoHAsync_v2(
                dst.as_mut_ptr() as *mut c_void,
                src,
                dst.len(),
                client.stream.cu_stream(),
            )
        };
        check_copy(DIR, dst.len(), result)?;
        drain(&client, DIR, dst.len())
    }

    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        device: &Self::Device,
    ) -> Result<()> {
        const DIR: TransferDirection = TransferDirection::DeviceToDevice;
        if size_bytes == 0 {
            return Ok(());
        }
        require_ptrs(DIR, size_bytes, &[src, dst])?;

        let client = get_or_create_client(device)?;
        client.bind()?;
        let result =
            unsafe { drv::cuMemcpyDtoDAsync_v2(dst, src, size_bytes, client.stream.cu_stream()) };
        check_copy(DIR, size_bytes, result)
    }

    fn default_device() -> Self::Device {
        CudaDevice::new(0)
    }

    fn default_client(device: &Self::Device) -> Result<Self::Client> {
        get_or_create_client(device)
    }
}

/// True if device 0 can be brought up
///
/// cudarc panics when the driver library cannot be loaded; that counts as
/// unavailable.
pub fn is_cuda_available() -> bool {
    std::panic::catch_unwind(|| get_or_create_client(&CudaDevice::new(0)).is_ok())
        .unwrap_or(false)
}
