//! Host-memory reference runtime
//!
//! Implements the same buffer and solver contracts as the CUDA backend with
//! device memory living on the heap. Useful for running the operator layer
//! where no GPU is present; it is only ever selected explicitly and never
//! stands in for a failed GPU call.
//!
//! The reference solver follows LAPACK conventions for pivots and `info`, so
//! failure diagnostics match what cuSOLVER reports for the same input.

mod client;
mod device;
mod lapack;
mod runtime;
mod solver;

pub use client::{CpuAllocator, CpuClient};
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
