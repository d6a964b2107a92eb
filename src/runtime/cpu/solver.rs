//! Reference `DenseSolver` for the host-memory device

use super::client::CpuClient;
use super::lapack;
use super::runtime::CpuRuntime;
use crate::error::Result;
use crate::runtime::{AllocGuard, BufferManager, DeviceBuffer, RuntimeClient};
use crate::solver::{self, DenseSolver, NativeStatus, Routine, Transpose, Triangle};

/// View reference-device memory as a slice
///
/// # Safety
/// `ptr` must come from `CpuRuntime::allocate` with room for `len` values of
/// `T`, and nothing else may access that memory for `'a`.
unsafe fn device_slice_mut<'a, T>(ptr: u64, len: usize) -> &'a mut [T] {
    if ptr == 0 || len == 0 {
        return &mut [];
    }
    unsafe { std::slice::from_raw_parts_mut(ptr as *mut T, len) }
}

fn matrix_mut(buf: &mut DeviceBuffer<CpuRuntime>) -> &mut [f32] {
    // SAFETY: the buffer owns its allocation and is mutably borrowed
    unsafe { device_slice_mut(buf.ptr(), buf.len()) }
}

impl DenseSolver for CpuClient {
    type Runtime = CpuRuntime;

    fn buffer_manager(&self) -> &BufferManager<CpuRuntime> {
        self.buffers()
    }

    fn solve_with(
        &self,
        mut a: DeviceBuffer<CpuRuntime>,
        mut b: DeviceBuffer<CpuRuntime>,
        trans: Transpose,
    ) -> Result<DeviceBuffer<CpuRuntime>> {
        let (n, k) = solver::solve_dims(&a, &b)?;
        if n == 0 || k == 0 {
            return Ok(b);
        }
        log::debug!("cpu: getrf n={n}, getrs nrhs={k} trans={}", trans.as_char());

        let pivots = AllocGuard::new(self.allocator(), n * std::mem::size_of::<i32>())?;
        // SAFETY: the guard owns n i32 slots for the rest of this call
        let ipiv: &mut [i32] = unsafe { device_slice_mut(pivots.ptr(), n) };

        let lu = matrix_mut(&mut a);
        let info = lapack::sgetrf(n, lu, ipiv);
        NativeStatus::solver(Routine::Getrf, 0, info).check()?;

        lapack::sgetrs(trans, n, k, lu, ipiv, matrix_mut(&mut b));
        NativeStatus::solver(Routine::Getrs, 0, 0).check()?;
        Ok(b)
    }

    fn cholesky(
        &self,
        mut a: DeviceBuffer<CpuRuntime>,
        triangle: Triangle,
    ) -> Result<DeviceBuffer<CpuRuntime>> {
        let n = solver::square_order("cholesky", &a)?;
        if n == 0 {
            return Ok(a);
        }
        log::debug!("cpu: potrf n={n} {triangle:?}");

        let l = matrix_mut(&mut a);
        let info = lapack::spotrf_lower(n, l);
        NativeStatus::solver(Routine::Potrf, 0, info).check()?;
        lapack::zero_strict_upper(n, l);

        match triangle {
            Triangle::Lower => Ok(a),
            Triangle::Upper => {
                let mut u = self.buffers().allocate(n, n)?;
                lapack::transpose(n, n, matrix_mut(&mut a), matrix_mut(&mut u));
                Ok(u)
            }
        }
    }
}
