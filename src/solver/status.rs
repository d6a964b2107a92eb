//! Translation of native status codes into [`Error::NativeComputation`]

use crate::error::{Error, Result};
use std::fmt;

/// Native routine a status word came from
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Routine {
    /// LU factorization with partial pivoting
    Getrf,
    /// Solve from an LU factorization
    Getrs,
    /// Cholesky factorization
    Potrf,
    /// Matrix add/transpose (used to produce the upper Cholesky factor)
    Geam,
}

impl Routine {
    /// LAPACK-style short name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Getrf => "getrf",
            Self::Getrs => "getrs",
            Self::Potrf => "potrf",
            Self::Geam => "geam",
        }
    }
}

impl fmt::Display for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Numeric kind of a native failure
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NativeFailureKind {
    /// `getrf` found an exactly-zero pivot `U(info, info)`
    Singular,
    /// `potrf` found a leading minor of order `info` that is not positive definite
    NotPositiveDefinite,
    /// Argument `-info` was illegal, or the library rejected a value
    IllegalArgument,
    /// Library handle was not initialized
    NotInitialized,
    /// Library could not allocate internal resources
    AllocationFailed,
    /// Kernel launch or execution failed on the device
    ExecutionFailed,
    /// Internal library failure (including architecture mismatches)
    InternalError,
    /// Status the translation table does not know
    Unknown,
}

impl NativeFailureKind {
    /// Kind for a non-success `cusolverStatus_t`
    pub const fn from_cusolver_status(code: i32) -> Self {
        match code {
            1 => Self::NotInitialized,
            2 => Self::AllocationFailed,
            3 => Self::IllegalArgument,
            4 => Self::InternalError, // arch mismatch
            5 => Self::ExecutionFailed, // mapping error
            6 => Self::ExecutionFailed,
            7 => Self::InternalError,
            8 => Self::IllegalArgument, // matrix type not supported
            _ => Self::Unknown,
        }
    }

    /// Kind for a non-success `cublasStatus_t`
    pub const fn from_cublas_status(code: i32) -> Self {
        match code {
            1 => Self::NotInitialized,
            3 => Self::AllocationFailed,
            7 => Self::IllegalArgument,
            8 => Self::InternalError, // arch mismatch
            11 => Self::ExecutionFailed, // mapping error
            13 => Self::ExecutionFailed,
            14 => Self::InternalError,
            15 => Self::IllegalArgument, // not supported
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for NativeFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Singular => "singular matrix",
            Self::NotPositiveDefinite => "not positive definite",
            Self::IllegalArgument => "illegal argument",
            Self::NotInitialized => "not initialized",
            Self::AllocationFailed => "allocation failed",
            Self::ExecutionFailed => "execution failed",
            Self::InternalError => "internal error",
            Self::Unknown => "unknown failure",
        };
        f.write_str(s)
    }
}

/// Which status table a code belongs to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusTable {
    /// cuSOLVER dense (and the reference solver, which always reports 0)
    Solver,
    /// cuBLAS
    Blas,
}

/// Status and diagnostic pair returned by one native call
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NativeStatus {
    /// Routine that produced the status
    pub routine: Routine,
    /// Table `status` is interpreted against
    pub table: StatusTable,
    /// Library status code; 0 is success in both tables
    pub status: i32,
    /// Routine diagnostic; 0 unless the routine reports one
    pub info: i32,
}

impl NativeStatus {
    /// Solver routine result
    pub const fn solver(routine: Routine, status: i32, info: i32) -> Self {
        Self {
            routine,
            table: StatusTable::Solver,
            status,
            info,
        }
    }

    /// BLAS routine result (no `info`)
    pub const fn blas(routine: Routine, status: i32) -> Self {
        Self {
            routine,
            table: StatusTable::Blas,
            status,
            info: 0,
        }
    }

    /// Failure kind, or `None` on success
    pub fn kind(&self) -> Option<NativeFailureKind> {
        if self.status != 0 {
            return Some(match self.table {
                StatusTable::Solver => NativeFailureKind::from_cusolver_status(self.status),
                StatusTable::Blas => NativeFailureKind::from_cublas_status(self.status),
            });
        }
        match self.info {
            0 => None,
            i if i < 0 => Some(NativeFailureKind::IllegalArgument),
            _ => Some(match self.routine {
                Routine::Getrf => NativeFailureKind::Singular,
                Routine::Potrf => NativeFailureKind::NotPositiveDefinite,
                Routine::Getrs | Routine::Geam => NativeFailureKind::Unknown,
            }),
        }
    }

    /// `Ok(())` on success, `Err(NativeComputation)` carrying the codes verbatim
    pub fn check(self) -> Result<()> {
        let Some(kind) = self.kind() else {
            return Ok(());
        };
        log::debug!(
            "{} failed: {} (status {}, info {})",
            self.routine,
            kind,
            self.status,
            self.info
        );
        Err(Error::NativeComputation {
            routine: self.routine,
            kind,
            code: self.status,
            info: self.info,
        })
    }
}
