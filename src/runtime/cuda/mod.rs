//! CUDA runtime implementation
//!
//! GPU backend over cudarc: stream-ordered device memory through the driver
//! API, dense factorizations through cuSOLVER (`getrf`/`getrs`, `potrf`) and a
//! cuBLAS `geam` transpose for the upper Cholesky factor.
//!
//! # Errors
//!
//! Nothing in this backend panics on device failure:
//!
//! - allocation failure is `Error::OutOfMemory` (no retry, no pooling)
//! - copy failure is `Error::Transfer`
//! - context, stream or handle setup failure is `Error::Backend`
//! - a non-zero library status or `info` is `Error::NativeComputation`

mod cache;
mod client;
mod cusolver;
mod device;
mod runtime;
mod solver;

pub use client::{CudaAllocator, CudaClient};
pub use device::{CudaDevice, CudaError};
pub use runtime::{CudaRuntime, is_cuda_available};
