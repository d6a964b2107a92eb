//! Cholesky Operator: triangular factor of a symmetric positive-definite matrix

use super::state::{Invocation, OpState};
use super::validate::{validate_against_spec, validate_cholesky_inputs, validate_cholesky_values};
use crate::config::LinalgConfig;
use crate::error::Result;
use crate::runtime::DeviceBuffer;
use crate::solver::{DenseSolver, Triangle};
use crate::tensor::{HostMatrix, MatrixDims, TensorSpec};

const OP: &str = "cholesky";

/// Validated Cholesky node
///
/// Returns `L` with `A = L L^T` (lower), or `U = L^T` with `A = U^T U`
/// (upper). The other triangle of the result is zero. Symmetry and
/// positive-definiteness are not checked here; the native library reports
/// them as `NativeComputation` failures.
#[derive(Clone, Debug)]
pub struct CholeskyOp {
    a: TensorSpec,
    triangle: Triangle,
}

impl CholeskyOp {
    /// Validate the input and build the node
    pub fn new(a: &TensorSpec, lower: bool) -> Result<Self> {
        validate_cholesky_inputs(a)?;
        log::debug!("{OP}: {:?} -> {:?} for {a:?}", OpState::Constructed, OpState::Validated);
        Ok(Self {
            a: a.clone(),
            triangle: Triangle::from_lower(lower),
        })
    }

    /// Build with the configured default triangle
    pub fn from_config(a: &TensorSpec, config: &LinalgConfig) -> Result<Self> {
        Self::new(a, config.cholesky_triangle.is_lower())
    }

    /// True if the lower factor is returned
    pub fn lower(&self) -> bool {
        self.triangle.is_lower()
    }

    /// Factor returned
    pub fn triangle(&self) -> Triangle {
        self.triangle
    }

    /// Shape of the factor for a concrete input shape
    pub fn output_shape(&self, a: (usize, usize)) -> Result<(usize, usize)> {
        self.check_values(&a)?;
        Ok(a)
    }

    fn check_values(&self, a: &impl MatrixDims) -> Result<()> {
        validate_against_spec(OP, &self.a, a)?;
        validate_cholesky_values(a)?;
        Ok(())
    }

    /// Factor on the device and return the factor as a device buffer
    ///
    /// Squareness is checked before anything is uploaded.
    pub fn execute<C: DenseSolver>(
        &self,
        client: &C,
        a: &HostMatrix,
    ) -> Result<DeviceBuffer<C::Runtime>> {
        let mut inv = Invocation::start(OP);
        let result = self
            .check_values(a)
            .and_then(|()| client.buffer_manager().upload(a))
            .and_then(|a_dev| {
                inv.advance(OpState::Dispatched)?;
                client.cholesky(a_dev, self.triangle)
            });
        inv.finish(result)
    }

    /// Factor a device-resident input, leaving it intact
    pub fn execute_resident<C: DenseSolver>(
        &self,
        client: &C,
        a: &DeviceBuffer<C::Runtime>,
    ) -> Result<DeviceBuffer<C::Runtime>> {
        let mut inv = Invocation::start(OP);
        let result = self
            .check_values(a)
            .and_then(|()| client.buffer_manager().copy(a))
            .and_then(|a_dev| {
                inv.advance(OpState::Dispatched)?;
                client.cholesky(a_dev, self.triangle)
            });
        inv.finish(result)
    }

    /// Factor a device buffer without copying it
    ///
    /// The input is consumed. The lower factor is written into its storage;
    /// the upper factor needs a second buffer for the transpose, after which
    /// the input is released. On failure the input is released too.
    pub fn execute_in_place<C: DenseSolver>(
        &self,
        client: &C,
        a: DeviceBuffer<C::Runtime>,
    ) -> Result<DeviceBuffer<C::Runtime>> {
        let mut inv = Invocation::start(OP);
        let result = self.check_values(&a).and_then(|()| {
            inv.advance(OpState::Dispatched)?;
            client.cholesky(a, self.triangle)
        });
        inv.finish(result)
    }

    /// Factor and download the result (column-major) in one step
    pub fn execute_to_host<C: DenseSolver>(
        &self,
        client: &C,
        a: &HostMatrix,
    ) -> Result<HostMatrix> {
        let f = self.execute(client, a)?;
        client.buffer_manager().download(&f)
    }
}

/// Cholesky factor of a concrete `f32` matrix
///
/// Shorthand for building a [`CholeskyOp`] from the value's own shape and
/// executing it.
pub fn gpu_cholesky<C: DenseSolver>(
    client: &C,
    a: &HostMatrix,
    lower: bool,
) -> Result<DeviceBuffer<C::Runtime>> {
    // dims left open: a non-square value is reported by execute, before upload
    CholeskyOp::new(&TensorSpec::matrix("A", crate::dtype::DType::F32), lower)?.execute(client, a)
}
