//! # densolve
//!
//! **GPU dense linear-algebra operators with typed failures and scoped device memory.**
//!
//! densolve is the execution layer behind two graph-level operators, `solve`
//! and `cholesky`. It validates what the graph compiler declared, moves
//! matrices into device memory, calls the vendor dense solver and turns every
//! failure into a structured [`Error`](error::Error).
//!
//! ## Operators
//!
//! - **Solve**: `X = A⁻¹ B` by LU with partial pivoting (`getrf` + `getrs`),
//!   optionally with `Aᵀ`
//! - **Cholesky**: `A = L Lᵀ` (`potrf`), lower or upper factor
//!
//! ## Quick Start
//!
//! ```
//! use densolve::prelude::*;
//!
//! let client = CpuClient::new(CpuDevice::new());
//! let a = HostMatrix::from_rows(&[&[4.0, 2.0], &[2.0, 5.0]])?;
//!
//! let op = CholeskyOp::new(&TensorSpec::matrix("A", DType::F32), true)?;
//! let l = op.execute_to_host(&client, &a)?;
//! assert_eq!(l.get(1, 0), 1.0);
//! # Ok::<(), densolve::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! The host-memory reference device is always built.
//!
//! - `cuda`: NVIDIA CUDA backend (cuSOLVER dense, cuBLAS)
//! - `rayon` (default): parallel right-hand sides in the reference solver

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dtype;
pub mod error;
pub mod ops;
pub mod runtime;
pub mod solver;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::LinalgConfig;
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::ops::{CholeskyOp, OpState, SolveOp, gpu_cholesky, gpu_solve};
    pub use crate::runtime::{BufferManager, Device, DeviceBuffer, Runtime, RuntimeClient};
    pub use crate::solver::{DenseSolver, NativeFailureKind, Routine, Transpose, Triangle};
    pub use crate::tensor::{HostMatrix, MatrixDims, StorageOrder, TensorSpec};

    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::{CudaClient, CudaDevice, CudaRuntime};
}

/// Default runtime based on enabled features
///
/// - With `cuda` feature: `CudaRuntime`
/// - Otherwise: `CpuRuntime`
#[cfg(feature = "cuda")]
pub type DefaultRuntime = runtime::cuda::CudaRuntime;

/// Default runtime based on enabled features
#[cfg(not(feature = "cuda"))]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
