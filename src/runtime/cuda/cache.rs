//! Process-wide CUDA clients, one per device ordinal

use super::client::CudaClient;
use super::device::CudaDevice;
use crate::error::Result;
use cudarc::driver::sys::{self as drv, CUresult};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

static CLIENTS: OnceLock<Mutex<HashMap<usize, CudaClient>>> = OnceLock::new();

/// True if the calling thread has a current CUDA context
///
/// # Safety
///
/// Calls the driver directly. The answer only describes the calling thread.
#[inline]
pub(super) unsafe fn is_cuda_context_valid() -> bool {
    let mut ctx: drv::CUcontext = std::ptr::null_mut();
    // SAFETY: cuCtxGetCurrent only writes the out-pointer
    let result = unsafe { drv::cuCtxGetCurrent(&mut ctx) };
    result == CUresult::CUDA_SUCCESS && !ctx.is_null()
}

/// Client for `device`, created on first use
///
/// A client that fails to come up is not cached; the next call tries again.
pub(super) fn get_or_create_client(device: &CudaDevice) -> Result<CudaClient> {
    let clients = CLIENTS.get_or_init(Default::default);
    // a panic elsewhere cannot leave the map half-updated
    let mut clients = clients.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(client) = clients.get(&device.index) {
        return Ok(client.clone());
    }
    let client = CudaClient::new(device.clone())?;
    clients.insert(device.index, client.clone());
    Ok(client)
}

#[cold]
#[inline(never)]
pub(super) fn log_cuda_memory_error(call: &str, ptr: u64, result: CUresult) {
    log::warn!("{call}(0x{ptr:x}) failed: {result:?}");
}
