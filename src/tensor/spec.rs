//! TensorSpec: symbolic tensor handle supplied at operator construction

use crate::dtype::DType;
use crate::tensor::{HostMatrix, MatrixDims};
use smallvec::SmallVec;
use std::fmt;

/// Stack allocation threshold for dimensions
const STACK_DIMS: usize = 4;

/// Symbolic description of an operator input
///
/// The graph compiler knows the element type and rank of every value, and
/// sometimes the concrete extent of a dimension. `None` marks a dimension only
/// known at execution time.
#[derive(Clone, PartialEq, Eq)]
pub struct TensorSpec {
    name: String,
    dtype: DType,
    dims: SmallVec<[Option<usize>; STACK_DIMS]>,
}

impl TensorSpec {
    /// Spec with explicit dims
    pub fn new(name: impl Into<String>, dtype: DType, dims: &[Option<usize>]) -> Self {
        Self {
            name: name.into(),
            dtype,
            dims: dims.iter().copied().collect(),
        }
    }

    /// Rank-2 spec with both dims unknown
    pub fn matrix(name: impl Into<String>, dtype: DType) -> Self {
        Self::new(name, dtype, &[None, None])
    }

    /// Rank-1 spec
    pub fn vector(name: impl Into<String>, dtype: DType) -> Self {
        Self::new(name, dtype, &[None])
    }

    /// Rank-3 spec
    pub fn tensor3(name: impl Into<String>, dtype: DType) -> Self {
        Self::new(name, dtype, &[None, None, None])
    }

    /// Fully static rank-2 f32 spec matching a host value
    pub fn from_matrix(name: impl Into<String>, m: &HostMatrix) -> Self {
        let (r, c) = m.dims();
        Self::new(name, DType::F32, &[Some(r), Some(c)])
    }

    /// Replace the dims with known extents
    pub fn with_shape(mut self, shape: &[usize]) -> Self {
        self.dims = shape.iter().map(|&d| Some(d)).collect();
        self
    }

    /// Handle name (for diagnostics)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Static extent of dimension `axis`, if known
    #[inline]
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied().flatten()
    }

    /// All dims
    pub fn dims(&self) -> &[Option<usize>] {
        &self.dims
    }
}

impl fmt::Debug for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}[", self.name, self.dtype)?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match d {
                Some(n) => write!(f, "{n}")?,
                None => write!(f, "?")?,
            }
        }
        write!(f, "]")
    }
}
