//! Error types for densolve

use crate::dtype::DType;
use crate::ops::OpState;
use crate::solver::{NativeFailureKind, Routine};
use std::fmt;
use thiserror::Error;

/// Result type alias using densolve's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Direction of a host/device memory copy
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferDirection {
    /// Host memory to device memory (upload)
    HostToDevice,
    /// Device memory to host memory (download)
    DeviceToHost,
    /// Device memory to device memory
    DeviceToDevice,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostToDevice => f.write_str("host-to-device"),
            Self::DeviceToHost => f.write_str("device-to-host"),
            Self::DeviceToDevice => f.write_str("device-to-device"),
        }
    }
}

/// Errors that can occur in densolve operations
#[derive(Error, Debug)]
pub enum Error {
    /// Input rank is not 2, the coefficient matrix is not square, or the
    /// operand dimensions disagree
    #[error("Shape error in '{op}': {reason}")]
    Shape {
        /// The operation that rejected the input
        op: &'static str,
        /// What was wrong with the shape
        reason: String,
    },

    /// Element type is not 32-bit floating point
    #[error("Unsupported dtype {dtype} for operation '{op}' (expected float32)")]
    DType {
        /// The rejected dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// Device allocation failed
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// A host/device memory copy failed
    #[error("Transfer error ({direction}, {size} bytes): {reason}")]
    Transfer {
        /// Copy direction
        direction: TransferDirection,
        /// Number of bytes being copied
        size: usize,
        /// Backend diagnostic
        reason: String,
    },

    /// The native solver library reported a failure
    #[error("Native {routine} failed ({kind}): status {code}, info {info}")]
    NativeComputation {
        /// Library routine that failed
        routine: Routine,
        /// Numeric kind of the failure
        kind: NativeFailureKind,
        /// Library status code, verbatim
        code: i32,
        /// Routine diagnostic (`info`), verbatim
        info: i32,
    },

    /// Operator invocation attempted an illegal state transition
    #[error("Invalid operator state transition: {from:?} -> {to:?}")]
    InvalidState {
        /// State before the transition
        from: OpState,
        /// Requested state
        to: OpState,
    },

    /// Invalid configuration value
    #[error("Invalid configuration '{key}': {reason}")]
    Config {
        /// Configuration key
        key: &'static str,
        /// Reason the value was rejected
        reason: String,
    },

    /// Device, context or library handle setup failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// CUDA driver error
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),
}

impl Error {
    /// Create a shape error
    pub fn shape(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Shape {
            op,
            reason: reason.into(),
        }
    }

    /// Create an unsupported dtype error
    pub fn dtype(dtype: DType, op: &'static str) -> Self {
        Self::DType { dtype, op }
    }

    /// Create a transfer error
    pub fn transfer(direction: TransferDirection, size: usize, reason: impl Into<String>) -> Self {
        Self::Transfer {
            direction,
            size,
            reason: reason.into(),
        }
    }

    /// Returns the native failure kind if this is a `NativeComputation` error
    pub fn native_kind(&self) -> Option<NativeFailureKind> {
        match self {
            Self::NativeComputation { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns true for rank, squareness and dimension-agreement failures
    pub fn is_shape_error(&self) -> bool {
        matches!(self, Self::Shape { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_display_carries_codes() {
        let err = Error::NativeComputation {
            routine: Routine::Potrf,
            kind: NativeFailureKind::NotPositiveDefinite,
            code: 0,
            info: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("potrf"), "{msg}");
        assert!(msg.contains("info 2"), "{msg}");
        assert_eq!(err.native_kind(), Some(NativeFailureKind::NotPositiveDefinite));
    }

    #[test]
    fn test_helpers() {
        assert!(Error::shape("solve", "rank 1").is_shape_error());
        assert!(!Error::dtype(DType::F64, "solve").is_shape_error());
        assert_eq!(Error::shape("solve", "x").native_kind(), None);

        let err = Error::transfer(TransferDirection::DeviceToHost, 16, "fault");
        assert_eq!(
            err.to_string(),
            "Transfer error (device-to-host, 16 bytes): fault"
        );
    }
}
