//! Operator Validators
//!
//! Construction-time checks run on [`TensorSpec`]s before any device work:
//! rank, element type, and whatever shape facts are statically known.
//! Execution-time checks run on concrete values, again before any buffer is
//! allocated. Symmetry, positive-definiteness and singularity are left to
//! the native library.

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::tensor::{MatrixDims, TensorSpec};

/// Validate a spec is a rank-2 `f32` matrix
pub fn validate_matrix_spec(op: &'static str, spec: &TensorSpec) -> Result<()> {
    if spec.ndim() != 2 {
        return Err(Error::shape(
            op,
            format!(
                "'{}' must be a 2D matrix, got {}D tensor {:?}",
                spec.name(),
                spec.ndim(),
                spec
            ),
        ));
    }
    validate_linalg_dtype(op, spec.dtype())
}

/// Operators compute in `f32` only; nothing is cast implicitly
pub fn validate_linalg_dtype(op: &'static str, dtype: DType) -> Result<()> {
    if dtype == DType::F32 {
        Ok(())
    } else {
        Err(Error::dtype(dtype, op))
    }
}

fn validate_static_square(op: &'static str, spec: &TensorSpec) -> Result<()> {
    if let (Some(r), Some(c)) = (spec.dim(0), spec.dim(1)) {
        if r != c {
            return Err(Error::shape(
                op,
                format!("'{}' must be square, declared {r}x{c}", spec.name()),
            ));
        }
    }
    Ok(())
}

/// Construction-time checks for `solve(A, B)`
///
/// Both inputs must be rank-2 `f32`. A statically non-square `A`, or
/// statically known row counts that differ, are rejected here.
pub fn validate_solve_inputs(a: &TensorSpec, b: &TensorSpec) -> Result<()> {
    validate_matrix_spec("solve", a)?;
    validate_matrix_spec("solve", b)?;
    validate_static_square("solve", a)?;

    let a_rows = a.dim(0).or(a.dim(1));
    if let (Some(n), Some(rows)) = (a_rows, b.dim(0)) {
        if n != rows {
            return Err(Error::shape(
                "solve",
                format!(
                    "'{}' has {rows} rows but '{}' is {n}x{n}",
                    b.name(),
                    a.name()
                ),
            ));
        }
    }
    Ok(())
}

/// Construction-time checks for `cholesky(A)`
pub fn validate_cholesky_inputs(a: &TensorSpec) -> Result<()> {
    validate_matrix_spec("cholesky", a)?;
    validate_static_square("cholesky", a)
}

/// A concrete value must match every statically declared dim of its spec
pub(crate) fn validate_against_spec(
    op: &'static str,
    spec: &TensorSpec,
    value: &impl MatrixDims,
) -> Result<()> {
    let (rows, cols) = value.dims();
    for (axis, actual) in [rows, cols].into_iter().enumerate() {
        if let Some(declared) = spec.dim(axis) {
            if declared != actual {
                return Err(Error::shape(
                    op,
                    format!(
                        "'{}' declared {:?}, got {rows}x{cols}",
                        spec.name(),
                        spec
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Execution-time checks for `solve`; returns `(n, k)`
///
/// `A` square, `A.rows == B.rows`, and at least one right-hand side.
pub fn validate_solve_values(a: &impl MatrixDims, b: &impl MatrixDims) -> Result<(usize, usize)> {
    let (n, ac) = a.dims();
    let (br, k) = b.dims();
    if n != ac {
        return Err(Error::shape(
            "solve",
            format!("coefficient matrix must be square, got {n}x{ac}"),
        ));
    }
    if br != n {
        return Err(Error::shape(
            "solve",
            format!("right-hand side has {br} rows, coefficient matrix is {n}x{n}"),
        ));
    }
    if k == 0 {
        return Err(Error::shape(
            "solve",
            "right-hand side must have at least one column",
        ));
    }
    Ok((n, k))
}

/// Execution-time checks for `cholesky`; returns `n`
pub fn validate_cholesky_values(a: &impl MatrixDims) -> Result<usize> {
    let (r, c) = a.dims();
    if !a.is_square() {
        return Err(Error::shape(
            "cholesky",
            format!("input must be square, got {r}x{c}"),
        ));
    }
    Ok(r)
}
