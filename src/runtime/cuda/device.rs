//! CUDA device handle and setup errors

use crate::runtime::Device;
use thiserror::Error;

/// One GPU, identified by ordinal
///
/// Cheap to clone. The context, stream and library handles for the ordinal
/// live on its cached [`super::CudaClient`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct CudaDevice {
    pub(crate) index: usize,
}

impl CudaDevice {
    /// Device for GPU ordinal `index`
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    /// `(free, total)` bytes of global memory
    ///
    /// Needs this device's context current on the calling thread.
    pub fn memory_info(&self) -> Result<(usize, usize), CudaError> {
        cudarc::driver::result::mem_get_info().map_err(|e| CudaError::Query {
            device: self.index,
            what: "memory info",
            reason: format!("{e:?}"),
        })
    }
}

impl Device for CudaDevice {
    fn id(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        format!("cuda:{}", self.index)
    }
}

/// Failures while bringing up or driving a device
#[derive(Debug, Clone, Error)]
pub enum CudaError {
    /// Driver query failed
    #[error("cuda:{device}: failed to query {what}: {reason}")]
    Query {
        /// Device ordinal
        device: usize,
        /// What was queried
        what: &'static str,
        /// Driver diagnostic
        reason: String,
    },
    /// Context or stream setup failed
    #[error("cuda:{device}: {stage} failed: {reason}")]
    Setup {
        /// Device ordinal
        device: usize,
        /// Setup step that failed
        stage: &'static str,
        /// Driver or library diagnostic
        reason: String,
    },
    /// A library handle could not be created or bound to the stream
    #[error("{library} handle: {reason}")]
    Handle {
        /// `cublas` or `cusolverDn`
        library: &'static str,
        /// Library diagnostic
        reason: String,
    },
    /// A driver call on the stream failed
    #[error("{call} failed: {reason}")]
    Driver {
        /// Driver entry point
        call: &'static str,
        /// Driver diagnostic
        reason: String,
    },
}

impl From<CudaError> for crate::error::Error {
    fn from(err: CudaError) -> Self {
        crate::error::Error::Backend(err.to_string())
    }
}
