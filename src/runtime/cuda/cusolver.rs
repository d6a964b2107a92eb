//! cuSOLVER dense handle
//!
//! RAII wrapper around `cusolverDnHandle_t`, bound to the client's stream.

use super::device::CudaError;
use cudarc::cusolver::sys as dn;
use cudarc::driver::CudaStream;
use std::ptr::null_mut;
use std::sync::Arc;

/// RAII wrapper for a cuSOLVER dense handle
///
/// Keeps its stream alive for as long as the handle is bound to it.
pub struct CudaSolverDn {
    handle: dn::cusolverDnHandle_t,
    stream: Arc<CudaStream>,
}

impl CudaSolverDn {
    /// Create a handle and associate it with `stream`
    pub fn new(stream: Arc<CudaStream>) -> Result<Self, CudaError> {
        let mut handle = null_mut();
        check_cusolver(unsafe { dn::cusolverDnCreate(&mut handle) })?;
        // Dropped (and destroyed) if binding the stream fails
        let this = Self { handle, stream };
        check_cusolver(unsafe {
            dn::cusolverDnSetStream(this.handle, this.stream.cu_stream() as dn::cudaStream_t)
        })?;
        Ok(this)
    }

    /// Get the raw cuSOLVER handle
    #[inline]
    pub fn handle(&self) -> dn::cusolverDnHandle_t {
        self.handle
    }
}

impl Drop for CudaSolverDn {
    fn drop(&mut self) {
        let status = unsafe { dn::cusolverDnDestroy(self.handle) };
        if status != dn::cusolverStatus_t::CUSOLVER_STATUS_SUCCESS {
            log::warn!("cusolverDnDestroy failed: {status:?}");
        }
    }
}

// SAFETY: the handle is only used while the client's mutex is held, and all
// work is ordered on the associated stream.
unsafe impl Send for CudaSolverDn {}
unsafe impl Sync for CudaSolverDn {}

/// Check a handle-management status
pub fn check_cusolver(status: dn::cusolverStatus_t) -> Result<(), CudaError> {
    if status == dn::cusolverStatus_t::CUSOLVER_STATUS_SUCCESS {
        Ok(())
    } else {
        Err(CudaError::Handle {
            library: "cusolverDn",
            reason: format!("{status:?}"),
        })
    }
}
