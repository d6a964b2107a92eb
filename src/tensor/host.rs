//! HostMatrix: a concrete 2-D `f32` value in host memory

use crate::error::{Error, Result};
use std::fmt;

/// Element order of a matrix's backing storage
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum StorageOrder {
    /// C order: consecutive elements walk along a row
    #[default]
    RowMajor,
    /// Fortran order: consecutive elements walk down a column
    ColumnMajor,
}

/// Anything with a 2-D extent
pub trait MatrixDims {
    /// `(rows, cols)`
    fn dims(&self) -> (usize, usize);

    /// Number of rows
    fn rows(&self) -> usize {
        self.dims().0
    }

    /// Number of columns
    fn cols(&self) -> usize {
        self.dims().1
    }

    /// True if rows == cols
    fn is_square(&self) -> bool {
        let (r, c) = self.dims();
        r == c
    }
}

/// Dense `f32` matrix in host memory
///
/// This is the concrete value an operator receives at execution time. The
/// storage order is whatever the caller supplied; uploads convert to column
/// major, downloads always produce column major.
#[derive(Clone, PartialEq)]
pub struct HostMatrix {
    rows: usize,
    cols: usize,
    order: StorageOrder,
    data: Vec<f32>,
}

impl HostMatrix {
    fn with_order(rows: usize, cols: usize, data: Vec<f32>, order: StorageOrder) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            Error::shape("matrix", format!("{rows}x{cols} overflows usize"))
        })?;
        if data.len() != expected {
            return Err(Error::shape(
                "matrix",
                format!(
                    "{rows}x{cols} matrix needs {expected} elements, got {}",
                    data.len()
                ),
            ));
        }
        Ok(Self {
            rows,
            cols,
            order,
            data,
        })
    }

    /// Build from row-major data
    ///
    /// # Example
    /// ```
    /// use densolve::tensor::HostMatrix;
    /// let m = HostMatrix::from_row_major(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(m.get(0, 1), 2.0);
    /// ```
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        Self::with_order(rows, cols, data, StorageOrder::RowMajor)
    }

    /// Build from column-major data
    pub fn from_col_major(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        Self::with_order(rows, cols, data, StorageOrder::ColumnMajor)
    }

    /// Build from a slice of rows
    pub fn from_rows(rows: &[&[f32]]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        if let Some(bad) = rows.iter().find(|r| r.len() != cols) {
            return Err(Error::shape(
                "matrix",
                format!("ragged rows: expected {cols} columns, got {}", bad.len()),
            ));
        }
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self::from_row_major(rows.len(), cols, data)
    }

    /// All-zero matrix (row-major)
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            order: StorageOrder::RowMajor,
            data: vec![0.0; rows * cols],
        }
    }

    /// `n x n` identity
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Diagonal matrix from its diagonal entries
    pub fn from_diagonal(diag: &[f32]) -> Self {
        let n = diag.len();
        let mut m = Self::zeros(n, n);
        for (i, &d) in diag.iter().enumerate() {
            m.data[i * n + i] = d;
        }
        m
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        match self.order {
            StorageOrder::RowMajor => row * self.cols + col,
            StorageOrder::ColumnMajor => col * self.rows + row,
        }
    }

    /// Element at `(row, col)`
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        assert!(
            row < self.rows && col < self.cols,
            "index ({row}, {col}) out of bounds for {}x{} matrix",
            self.rows,
            self.cols
        );
        self.data[self.index(row, col)]
    }

    /// Storage order of the backing data
    #[inline]
    pub fn order(&self) -> StorageOrder {
        self.order
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the matrix has no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Backing data in [`Self::order`]
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Same values, column-major storage
    pub fn to_col_major(&self) -> Self {
        self.reordered(StorageOrder::ColumnMajor)
    }

    /// Same values, row-major storage
    pub fn to_row_major(&self) -> Self {
        self.reordered(StorageOrder::RowMajor)
    }

    fn reordered(&self, order: StorageOrder) -> Self {
        if self.order == order {
            return self.clone();
        }
        let (outer, inner) = match order {
            StorageOrder::RowMajor => (self.rows, self.cols),
            StorageOrder::ColumnMajor => (self.cols, self.rows),
        };
        let mut data = Vec::with_capacity(self.data.len());
        for o in 0..outer {
            for i in 0..inner {
                let (row, col) = match order {
                    StorageOrder::RowMajor => (o, i),
                    StorageOrder::ColumnMajor => (i, o),
                };
                data.push(self.data[self.index(row, col)]);
            }
        }
        Self {
            rows: self.rows,
            cols: self.cols,
            order,
            data,
        }
    }

    /// Column-major copy of the data
    pub fn col_major_data(&self) -> Vec<f32> {
        match self.order {
            StorageOrder::ColumnMajor => self.data.clone(),
            StorageOrder::RowMajor => self.to_col_major().data,
        }
    }

    /// Transposed matrix
    ///
    /// Reinterprets the storage: a row-major `m x n` is a column-major `n x m`.
    pub fn transpose(&self) -> Self {
        let order = match self.order {
            StorageOrder::RowMajor => StorageOrder::ColumnMajor,
            StorageOrder::ColumnMajor => StorageOrder::RowMajor,
        };
        Self {
            rows: self.cols,
            cols: self.rows,
            order,
            data: self.data.clone(),
        }
    }

    /// Host-side matrix product, used to check residuals
    pub fn matmul(&self, other: &HostMatrix) -> Result<HostMatrix> {
        if self.cols != other.rows {
            return Err(Error::shape(
                "matmul",
                format!(
                    "inner dimensions differ: {}x{} * {}x{}",
                    self.rows, self.cols, other.rows, other.cols
                ),
            ));
        }
        let mut out = HostMatrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(i, k);
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out.data[i * other.cols + j] += a * other.get(k, j);
                }
            }
        }
        Ok(out)
    }
}

impl MatrixDims for HostMatrix {
    fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

impl MatrixDims for (usize, usize) {
    fn dims(&self) -> (usize, usize) {
        *self
    }
}

impl fmt::Debug for HostMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "HostMatrix({}x{}, {:?}) [", self.rows, self.cols, self.order)?;
        for r in 0..self.rows {
            write!(f, "  ")?;
            for c in 0..self.cols {
                write!(f, "{:>10.4} ", self.get(r, c))?;
            }
            writeln!(f)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_is_shape_error() {
        let err = HostMatrix::from_row_major(2, 3, vec![0.0; 5]).unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_order_conversion_preserves_values() {
        let m = HostMatrix::from_row_major(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let c = m.to_col_major();
        assert_eq!(c.order(), StorageOrder::ColumnMajor);
        assert_eq!(c.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(c.get(1, 2), 6.0);
        assert_eq!(c.to_row_major(), m);
    }

    #[test]
    fn test_transpose() {
        let m = HostMatrix::from_rows(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]).unwrap();
        let t = m.transpose();
        assert_eq!(t.dims(), (3, 2));
        assert_eq!(t.get(2, 0), 3.0);
        assert_eq!(t.get(0, 1), 4.0);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(HostMatrix::from_rows(&[&[1.0, 2.0], &[3.0]]).is_err());
    }

    #[test]
    fn test_matmul_identity() {
        let m = HostMatrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]).unwrap();
        let p = m.matmul(&HostMatrix::identity(2)).unwrap();
        assert_eq!(p, m);
        assert!(m.matmul(&HostMatrix::zeros(3, 1)).is_err());
    }
}
