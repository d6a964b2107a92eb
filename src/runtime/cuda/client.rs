//! Per-device CUDA client
//!
//! A `CudaClient` holds everything one device needs to run the dense
//! operators: the primary context, one stream, a cuBLAS handle and a cuSOLVER
//! dense handle, both bound to that stream.
//!
//! # Thread Safety
//!
//! Clones share the same handles. Every driver call first makes the context
//! current on the calling thread, so buffers may be allocated, copied and
//! dropped on any thread. The cuSOLVER handle sits behind a mutex, so
//! factorizations issued from different threads on one device run one after
//! another.
//!
//! There is one client per device per process (see `cache.rs`). Buffers and
//! copies of a device are therefore all ordered on the same stream.

use cudarc::cublas::CudaBlas;
use cudarc::driver::safe::{CudaContext, CudaStream};
use cudarc::driver::sys::{self as drv, CUresult};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::CudaRuntime;
use super::cache::log_cuda_memory_error;
use super::cusolver::CudaSolverDn;
use super::device::{CudaDevice, CudaError};
use crate::error::{Error, Result};
use crate::runtime::{Allocator, BufferManager, RuntimeClient};

/// Handles for one GPU
///
/// Allocations, copies and native calls are all ordered on [`Self::stream`].
#[derive(Clone)]
pub struct CudaClient {
    pub(crate) device: CudaDevice,
    pub(crate) context: Arc<CudaContext>,
    pub(crate) stream: Arc<CudaStream>,
    /// Transposes the lower factor into the upper one
    pub(crate) cublas: Arc<CudaBlas>,
    pub(crate) cusolver: Arc<Mutex<CudaSolverDn>>,
    pub(crate) allocator: CudaAllocator,
    pub(crate) buffers: BufferManager<CudaRuntime>,
}

impl fmt::Debug for CudaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CudaClient")
            .field("device", &self.device)
            .field("buffers", &self.buffers)
            .finish_non_exhaustive()
    }
}

/// Stream-ordered device allocator
///
/// `cuMemAllocAsync` / `cuMemFreeAsync` on the client's stream, with the
/// client's context made current first. Only `CUDA_ERROR_OUT_OF_MEMORY` is
/// `OutOfMemory`, reported straight away with nothing freed and retried; any
/// other refusal is a backend error.
#[derive(Clone)]
pub struct CudaAllocator {
    device: CudaDevice,
    context: Arc<CudaContext>,
    stream: Arc<CudaStream>,
}

/// Error for a `cuMemAllocAsync` that did not succeed
fn alloc_error(result: CUresult, size_bytes: usize) -> Error {
    match result {
        CUresult::CUDA_ERROR_OUT_OF_MEMORY => Error::OutOfMemory { size: size_bytes },
        other => CudaError::Driver {
            call: "cuMemAllocAsync",
            reason: format!("{other:?} ({size_bytes} bytes)"),
        }
        .into(),
    }
}

impl Allocator for CudaAllocator {
    fn allocate(&self, size_bytes: usize) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }
        self.context.bind_to_thread()?;

        let mut ptr: u64 = 0;
        let stream = self.stream.cu_stream();
        let result = unsafe { drv::cuMemAllocAsync(&mut ptr, size_bytes, stream) };
        if result != CUresult::CUDA_SUCCESS {
            match self.device.memory_info() {
                Ok((free, total)) => log::debug!(
                    "cuda:{}: cuMemAllocAsync({size_bytes}) failed: {result:?} \
                     ({free} of {total} bytes free)",
                    self.device.index
                ),
                Err(e) => log::debug!("cuMemAllocAsync({size_bytes}) failed: {result:?}; {e}"),
            }
            return Err(alloc_error(result, size_bytes));
        }
        Ok(ptr)
    }

    fn deallocate(&self, ptr: u64, _size_bytes: usize) {
        if ptr == 0 {
            return;
        }
        // fails only once the driver is shutting down and has reclaimed everything
        if let Err(e) = self.context.bind_to_thread() {
            log::debug!("cuda:{}: skipping free of 0x{ptr:x}: {e:?}", self.device.index);
            return;
        }

        let result = unsafe { drv::cuMemFreeAsync(ptr, self.stream.cu_stream()) };
        if result != CUresult::CUDA_SUCCESS && result != CUresult::CUDA_ERROR_ILLEGAL_ADDRESS {
            log_cuda_memory_error("cuMemFreeAsync", ptr, result);
        }
    }
}

impl CudaClient {
    /// Bring up the context, stream and library handles for `device`
    ///
    /// Only the client cache calls this; everyone else goes through
    /// `CudaRuntime::default_client`.
    pub(crate) fn new(device: CudaDevice) -> std::result::Result<Self, CudaError> {
        let ordinal = device.index;
        let setup = |stage: &'static str| {
            move |e: cudarc::driver::DriverError| CudaError::Setup {
                device: ordinal,
                stage,
                reason: format!("{e:?}"),
            }
        };

        let context = CudaContext::new(ordinal).map_err(setup("context creation"))?;
        context.bind_to_thread().map_err(setup("context binding"))?;
        let stream = context.new_stream().map_err(setup("stream creation"))?;

        let cublas = CudaBlas::new(stream.clone()).map_err(|e| CudaError::Handle {
            library: "cublas",
            reason: format!("{e:?}"),
        })?;
        let cusolver = CudaSolverDn::new(stream.clone())?;

        let allocator = CudaAllocator {
            device: device.clone(),
            context: context.clone(),
            stream: stream.clone(),
        };
        let buffers = BufferManager::new(device.clone(), allocator.clone());

        log::debug!("cuda:{ordinal}: client ready");

        Ok(Self {
            device,
            context,
            stream,
            cublas: Arc::new(cublas),
            cusolver: Arc::new(Mutex::new(cusolver)),
            allocator,
            buffers,
        })
    }

    /// Stream all work is ordered on
    #[inline]
    pub fn stream(&self) -> &CudaStream {
        &self.stream
    }

    /// Device context
    #[inline]
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }

    /// Buffer manager for matrices on this device
    #[inline]
    pub fn buffers(&self) -> &BufferManager<CudaRuntime> {
        &self.buffers
    }

    /// Make this client's context current on the calling thread
    pub(crate) fn bind(&self) -> Result<()> {
        self.context.bind_to_thread()?;
        Ok(())
    }

    /// Exclusive use of the cuSOLVER handle for one call sequence
    pub(crate) fn lock_solver(&self) -> MutexGuard<'_, CudaSolverDn> {
        self.cusolver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RuntimeClient<CudaRuntime> for CudaClient {
    fn device(&self) -> &CudaDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize().map_err(|e| {
            log::warn!("cuda:{}: stream synchronization failed: {e:?}", self.device.index);
            Error::from(CudaError::Driver {
                call: "cuStreamSynchronize",
                reason: format!("{e:?}"),
            })
        })
    }

    fn allocator(&self) -> &CudaAllocator {
        &self.allocator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_exhausted_memory_is_out_of_memory() {
        let err = alloc_error(CUresult::CUDA_ERROR_OUT_OF_MEMORY, 64);
        assert!(matches!(err, Error::OutOfMemory { size: 64 }));

        let err = alloc_error(CUresult::CUDA_ERROR_INVALID_CONTEXT, 64);
        assert!(matches!(err, Error::Backend(_)), "{err}");
        assert!(err.to_string().contains("cuMemAllocAsync"), "{err}");
        assert!(err.to_string().contains("CUDA_ERROR_INVALID_CONTEXT"), "{err}");
    }
}
