//! Solve Operator: `X = solve(A, B)` for square `A`

use super::state::{Invocation, OpState};
use super::validate::{validate_against_spec, validate_solve_inputs, validate_solve_values};
use crate::error::Result;
use crate::runtime::DeviceBuffer;
use crate::solver::{DenseSolver, Transpose};
use crate::tensor::{HostMatrix, MatrixDims, TensorSpec};

const OP: &str = "solve";

/// Validated solve node
///
/// Built from the symbolic inputs once; executed any number of times on
/// concrete matrices. Each execution uploads `A` and `B`, runs an LU solve on
/// the device and returns `X` as a device buffer owned by the caller.
///
/// # Example
///
/// ```
/// use densolve::prelude::*;
///
/// let client = CpuClient::new(CpuDevice::new());
/// let a = HostMatrix::from_rows(&[&[2.0, 0.0], &[0.0, 4.0]]).unwrap();
/// let b = HostMatrix::from_rows(&[&[2.0], &[8.0]]).unwrap();
///
/// let a_spec = TensorSpec::from_matrix("A", &a);
/// let b_spec = TensorSpec::from_matrix("B", &b);
/// let op = SolveOp::new(&a_spec, &b_spec).unwrap();
/// let x = op.execute_to_host(&client, &a, &b).unwrap();
/// assert_eq!(x.get(0, 0), 1.0);
/// assert_eq!(x.get(1, 0), 2.0);
/// ```
#[derive(Clone, Debug)]
pub struct SolveOp {
    a: TensorSpec,
    b: TensorSpec,
    trans: Transpose,
}

impl SolveOp {
    /// Validate the inputs and build the node
    ///
    /// Fails with `Shape` for non-matrix inputs or statically inconsistent
    /// shapes, and with `DType` for anything other than `f32`.
    pub fn new(a: &TensorSpec, b: &TensorSpec) -> Result<Self> {
        validate_solve_inputs(a, b)?;
        log::debug!(
            "{OP}: {:?} -> {:?} for ({a:?}, {b:?})",
            OpState::Constructed,
            OpState::Validated
        );
        Ok(Self {
            a: a.clone(),
            b: b.clone(),
            trans: Transpose::NoTrans,
        })
    }

    /// Solve `A^T X = B` instead of `A X = B`
    pub fn with_transpose(mut self, trans: Transpose) -> Self {
        self.trans = trans;
        self
    }

    /// Operation applied to `A`
    pub fn transpose(&self) -> Transpose {
        self.trans
    }

    /// Shape of `X` for concrete input shapes
    pub fn output_shape(&self, a: (usize, usize), b: (usize, usize)) -> Result<(usize, usize)> {
        self.check_values(&a, &b)?;
        Ok((a.0, b.1))
    }

    /// Symbolic output handle: `f32`, `n x k` with whatever is statically known
    pub fn output_spec(&self, name: impl Into<String>) -> TensorSpec {
        let n = self.a.dim(0).or(self.a.dim(1)).or(self.b.dim(0));
        TensorSpec::new(name, self.a.dtype(), &[n, self.b.dim(1)])
    }

    fn check_values(&self, a: &impl MatrixDims, b: &impl MatrixDims) -> Result<()> {
        validate_against_spec(OP, &self.a, a)?;
        validate_against_spec(OP, &self.b, b)?;
        validate_solve_values(a, b)?;
        Ok(())
    }

    fn dispatch<C: DenseSolver>(
        &self,
        inv: &mut Invocation,
        client: &C,
        a: &HostMatrix,
        b: &HostMatrix,
    ) -> Result<DeviceBuffer<C::Runtime>> {
        self.check_values(a, b)?;
        let buffers = client.buffer_manager();
        let a_dev = buffers.upload(a)?;
        let b_dev = buffers.upload(b)?;
        inv.advance(OpState::Dispatched)?;
        client.solve_with(a_dev, b_dev, self.trans)
    }

    /// Solve on the device and return `X` as a device buffer
    ///
    /// Every intermediate buffer is released before this returns, on success
    /// and on failure.
    pub fn execute<C: DenseSolver>(
        &self,
        client: &C,
        a: &HostMatrix,
        b: &HostMatrix,
    ) -> Result<DeviceBuffer<C::Runtime>> {
        let mut inv = Invocation::start(OP);
        let result = self.dispatch(&mut inv, client, a, b);
        inv.finish(result)
    }

    /// Solve with inputs already on the device; the inputs are left intact
    pub fn execute_resident<C: DenseSolver>(
        &self,
        client: &C,
        a: &DeviceBuffer<C::Runtime>,
        b: &DeviceBuffer<C::Runtime>,
    ) -> Result<DeviceBuffer<C::Runtime>> {
        let mut inv = Invocation::start(OP);
        let result = (|| {
            self.check_values(a, b)?;
            let buffers = client.buffer_manager();
            let a_dev = buffers.copy(a)?;
            let b_dev = buffers.copy(b)?;
            inv.advance(OpState::Dispatched)?;
            client.solve_with(a_dev, b_dev, self.trans)
        })();
        inv.finish(result)
    }

    /// Solve and download `X` (column-major) in one step
    pub fn execute_to_host<C: DenseSolver>(
        &self,
        client: &C,
        a: &HostMatrix,
        b: &HostMatrix,
    ) -> Result<HostMatrix> {
        let x = self.execute(client, a, b)?;
        client.buffer_manager().download(&x)
    }
}

/// Solve `A X = B` for concrete `f32` matrices
///
/// Shorthand for building a [`SolveOp`] from the values' own shapes and
/// executing it.
pub fn gpu_solve<C: DenseSolver>(
    client: &C,
    a: &HostMatrix,
    b: &HostMatrix,
) -> Result<DeviceBuffer<C::Runtime>> {
    SolveOp::new(&TensorSpec::from_matrix("A", a), &TensorSpec::from_matrix("B", b))?
        .execute(client, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;
    use crate::error::Error;
    use crate::runtime::cpu::{CpuClient, CpuDevice};

    fn dynamic_op() -> SolveOp {
        SolveOp::new(
            &TensorSpec::matrix("A", DType::F32),
            &TensorSpec::matrix("B", DType::F32),
        )
        .unwrap()
    }

    #[test]
    fn test_output_shape() {
        let op = dynamic_op();
        assert_eq!(op.output_shape((4, 4), (4, 3)).unwrap(), (4, 3));
        assert!(op.output_shape((4, 3), (4, 3)).is_err());
        assert!(op.output_shape((4, 4), (3, 3)).is_err());
    }

    #[test]
    fn test_output_spec_carries_static_dims() {
        let op = SolveOp::new(
            &TensorSpec::new("A", DType::F32, &[None, Some(5)]),
            &TensorSpec::new("B", DType::F32, &[None, Some(2)]),
        )
        .unwrap();
        let out = op.output_spec("X");
        assert_eq!(out.dims(), &[Some(5), Some(2)]);
        assert_eq!(out.dtype(), DType::F32);
    }

    #[test]
    fn test_runtime_shape_mismatch_allocates_nothing() {
        let client = CpuClient::new(CpuDevice::new());
        let op = dynamic_op();
        let err = op
            .execute(&client, &HostMatrix::identity(3), &HostMatrix::zeros(2, 1))
            .unwrap_err();
        assert!(err.is_shape_error());
        assert_eq!(client.buffers().total_allocations(), 0);
    }

    #[test]
    fn test_value_must_match_static_spec() {
        let client = CpuClient::new(CpuDevice::new());
        let a = HostMatrix::identity(2);
        let b = HostMatrix::zeros(2, 1);
        let op = SolveOp::new(
            &TensorSpec::matrix("A", DType::F32).with_shape(&[3, 3]),
            &TensorSpec::matrix("B", DType::F32),
        )
        .unwrap();
        assert!(matches!(op.execute(&client, &a, &b), Err(Error::Shape { .. })));
    }

    #[test]
    fn test_resident_inputs_survive() {
        let client = CpuClient::new(CpuDevice::new());
        let a = HostMatrix::from_rows(&[&[3.0, 1.0], &[1.0, 2.0]]).unwrap();
        let b = HostMatrix::from_rows(&[&[9.0], &[8.0]]).unwrap();
        let a_dev = client.buffers().upload(&a).unwrap();
        let b_dev = client.buffers().upload(&b).unwrap();

        let x_dev = dynamic_op().execute_resident(&client, &a_dev, &b_dev).unwrap();
        let x = x_dev.to_vec().unwrap();
        assert!((x[0] - 2.0).abs() < 1e-5 && (x[1] - 3.0).abs() < 1e-5, "{x:?}");
        assert_eq!(b_dev.to_vec().unwrap(), vec![9.0, 8.0]);

        drop(x_dev);
        assert_eq!(client.buffers().live_buffers(), 2);
    }
}
