//! Matrix values and symbolic tensor handles
//!
//! [`HostMatrix`] is the concrete value an operator executes on and
//! [`TensorSpec`] is the symbolic handle it is constructed from. Device-resident
//! matrices are [`crate::runtime::DeviceBuffer`]s.

mod host;
mod spec;

pub use host::{HostMatrix, MatrixDims, StorageOrder};
pub use spec::TensorSpec;
