//! Dense linear-algebra operators
//!
//! Operators are built from symbolic [`TensorSpec`](crate::tensor::TensorSpec)s,
//! which validates rank and dtype once, and then executed on concrete
//! matrices through any client that implements
//! [`DenseSolver`](crate::solver::DenseSolver).
//!
//! ```text
//! SolveOp::new / CholeskyOp::new      (validate specs)
//!   └── execute(client, values)
//!         ├── validate values          (squareness, row agreement)
//!         ├── BufferManager::upload
//!         ├── DenseSolver::solve_with / cholesky
//!         └── DeviceBuffer -> caller
//! ```

mod cholesky;
mod solve;
mod state;
pub mod validate;

pub use cholesky::{CholeskyOp, gpu_cholesky};
pub use solve::{SolveOp, gpu_solve};
pub use state::OpState;
pub use validate::{validate_cholesky_inputs, validate_solve_inputs};
