//! Runtime backends for device-resident dense linear algebra
//!
//! This module defines the `Runtime` trait and provides implementations
//! for the compute backends (host reference device, CUDA).
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity)
//! ├── Device (identifies a specific GPU/CPU)
//! ├── Client (owns stream/library handles, implements DenseSolver)
//! ├── Allocator (raw memory management)
//! └── BufferManager (scoped column-major matrix buffers)
//! ```

mod allocator;
mod buffer;
mod traits;

pub mod cpu;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use allocator::{AllocGuard, Allocator, DefaultAllocator};
pub use buffer::{BufferManager, DeviceBuffer};
pub use traits::{Device, Runtime, RuntimeClient};
