//! Native Solver Binding
//!
//! [`DenseSolver`] is the seam between the operators and a device's dense
//! solver library. Each runtime client implements it: the CUDA client over
//! cuSOLVER dense, the reference client over the column-major kernels in
//! `runtime::cpu`.
//!
//! Every call returns its outcome directly. A non-zero native status or
//! `info` becomes [`crate::error::Error::NativeComputation`] through
//! [`NativeStatus::check`]; nothing is retried.

mod status;

pub use status::{NativeFailureKind, NativeStatus, Routine, StatusTable};

use crate::error::{Error, Result};
use crate::runtime::{BufferManager, DeviceBuffer, Runtime};
use crate::tensor::MatrixDims;

/// Operation applied to the coefficient matrix in a solve
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Transpose {
    /// Solve `A X = B`
    #[default]
    NoTrans,
    /// Solve `A^T X = B`
    Trans,
}

impl Transpose {
    /// BLAS-style flag
    pub const fn as_char(self) -> char {
        match self {
            Self::NoTrans => 'N',
            Self::Trans => 'T',
        }
    }
}

/// Which triangular factor a Cholesky factorization returns
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Triangle {
    /// `A = L L^T`, `L` lower triangular
    #[default]
    Lower,
    /// `A = U^T U`, `U` upper triangular (`U = L^T`)
    Upper,
}

impl Triangle {
    /// `Lower` if `lower` is true
    pub const fn from_lower(lower: bool) -> Self {
        if lower { Self::Lower } else { Self::Upper }
    }

    /// True for `Lower`
    pub const fn is_lower(self) -> bool {
        matches!(self, Self::Lower)
    }
}

/// Dense factorizations and solves on device-resident matrices
///
/// Inputs are consumed: the implementation may factor in place and reuse an
/// input's storage for its result. Every buffer the call acquires, inputs
/// included, is released before an error is returned.
pub trait DenseSolver: Clone + Send + Sync {
    /// Runtime whose buffers this solver operates on
    type Runtime: Runtime;

    /// Buffer manager the solver allocates matrices through
    fn buffer_manager(&self) -> &BufferManager<Self::Runtime>;

    /// Solve `op(A) X = B` by LU factorization with partial pivoting
    ///
    /// `a` is `n x n`, `b` is `n x k`. Returns `X` (`n x k`) in `b`'s storage.
    fn solve_with(
        &self,
        a: DeviceBuffer<Self::Runtime>,
        b: DeviceBuffer<Self::Runtime>,
        trans: Transpose,
    ) -> Result<DeviceBuffer<Self::Runtime>>;

    /// Solve `A X = B`
    fn solve(
        &self,
        a: DeviceBuffer<Self::Runtime>,
        b: DeviceBuffer<Self::Runtime>,
    ) -> Result<DeviceBuffer<Self::Runtime>> {
        self.solve_with(a, b, Transpose::NoTrans)
    }

    /// Cholesky factor of a symmetric positive-definite `a`
    ///
    /// The lower triangle of `a` is factored. The triangle not selected by
    /// `triangle` is zeroed in the result.
    fn cholesky(
        &self,
        a: DeviceBuffer<Self::Runtime>,
        triangle: Triangle,
    ) -> Result<DeviceBuffer<Self::Runtime>>;
}

/// `(n, k)` for a solve, or a shape error
pub(crate) fn solve_dims<R: Runtime>(
    a: &DeviceBuffer<R>,
    b: &DeviceBuffer<R>,
) -> Result<(usize, usize)> {
    let n = square_order("solve", a)?;
    if b.rows() != n {
        return Err(Error::shape(
            "solve",
            format!(
                "right-hand side has {} rows, coefficient matrix is {n}x{n}",
                b.rows()
            ),
        ));
    }
    Ok((n, b.cols()))
}

/// Order of a square matrix, or a shape error
pub(crate) fn square_order<R: Runtime>(op: &'static str, a: &DeviceBuffer<R>) -> Result<usize> {
    if !a.is_square() {
        return Err(Error::shape(
            op,
            format!("expected a square matrix, got {}x{}", a.rows(), a.cols()),
        ));
    }
    Ok(a.rows())
}

/// Native APIs take `int` dimensions
pub(crate) fn as_native_dim(op: &'static str, n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| Error::shape(op, format!("dimension {n} exceeds i32::MAX")))
}
