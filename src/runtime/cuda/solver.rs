//! cuSOLVER dense implementation of `DenseSolver`
//!
//! Each call: bind the context, lock the handle, query the workspace size,
//! take scoped workspace/pivot/info allocations, launch, synchronize, then
//! read `info` back and translate it.

use super::client::{CudaAllocator, CudaClient};
use super::device::CudaError;
use super::runtime::CudaRuntime;
use crate::error::Result;
use crate::runtime::{AllocGuard, BufferManager, DeviceBuffer, Runtime, RuntimeClient};
use crate::solver::{
    self, DenseSolver, NativeStatus, Routine, Transpose, Triangle, as_native_dim,
};
use cudarc::cublas::sys as blas;
use cudarc::cusolver::sys as dn;
use std::mem::size_of;

impl CudaClient {
    /// Wait for `routine` and translate its status and `info` word
    fn finish_native(
        &self,
        routine: Routine,
        status: dn::cusolverStatus_t,
        info: &AllocGuard<'_, CudaAllocator>,
    ) -> Result<()> {
        let status = status as i32;
        if status != 0 {
            return NativeStatus::solver(routine, status, 0).check();
        }
        self.synchronize()?;
        let mut word = [0u8; size_of::<i32>()];
        CudaRuntime::copy_from_device(info.ptr(), &mut word, &self.device)?;
        NativeStatus::solver(routine, 0, i32::from_ne_bytes(word)).check()
    }

    /// Zero the strict upper triangle of a column-major `n x n` matrix
    ///
    /// Column `j`'s upper part is the contiguous run `[j*n, j*n + j)`.
    fn zero_strict_upper(&self, a: &DeviceBuffer<CudaRuntime>, n: usize) -> Result<()> {
        for j in 1..n {
            let dst = a.ptr() + (j * n * size_of::<f32>()) as u64;
            let result = unsafe {
                cudarc::driver::sys::cuMemsetD32Async(dst, 0, j, self.stream.cu_stream())
            };
            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return Err(CudaError::Driver {
                    call: "cuMemsetD32Async",
                    reason: format!("{result:?}"),
                }
                .into());
            }
        }
        Ok(())
    }

    /// `dst = src^T` for square `n x n` matrices via `cublasSgeam`
    fn transpose_into(
        &self,
        src: &DeviceBuffer<CudaRuntime>,
        dst: &mut DeviceBuffer<CudaRuntime>,
        n: i32,
    ) -> Result<()> {
        let alpha: f32 = 1.0;
        let beta: f32 = 0.0;
        let status = unsafe {
            blas::cublasSgeam(
                *self.cublas.handle(),
                blas::cublasOperation_t::CUBLAS_OP_T,
                blas::cublasOperation_t::CUBLAS_OP_N,
                n,
                n,
                &alpha,
                src.ptr() as *const f32,
                n,
                &beta,
                // B is not read when beta == 0; C doubles as B
                dst.ptr() as *const f32,
                n,
                dst.ptr() as *mut f32,
                n,
            )
        };
        NativeStatus::blas(Routine::Geam, status as i32).check()?;
        self.synchronize()
    }
}

impl DenseSolver for CudaClient {
    type Runtime = CudaRuntime;

    fn buffer_manager(&self) -> &BufferManager<CudaRuntime> {
        &self.buffers
    }

    fn solve_with(
        &self,
        a: DeviceBuffer<CudaRuntime>,
        b: DeviceBuffer<CudaRuntime>,
        trans: Transpose,
    ) -> Result<DeviceBuffer<CudaRuntime>> {
        let (n, k) = solver::solve_dims(&a, &b)?;
        if n == 0 || k == 0 {
            return Ok(b);
        }
        let n_i = as_native_dim("solve", n)?;
        let k_i = as_native_dim("solve", k)?;
        log::debug!(
            "cuda:{}: getrf n={n}, getrs nrhs={k} trans={}",
            self.device.index,
            trans.as_char()
        );

        self.bind()?;
        let dn_handle = self.lock_solver();
        let handle = dn_handle.handle();

        let mut lwork: i32 = 0;
        let status = unsafe {
            dn::cusolverDnSgetrf_bufferSize(handle, n_i, n_i, a.ptr() as *mut f32, n_i, &mut lwork)
        };
        NativeStatus::solver(Routine::Getrf, status as i32, 0).check()?;

        let work = AllocGuard::new(&self.allocator, lwork.max(0) as usize * size_of::<f32>())?;
        let ipiv = AllocGuard::new(&self.allocator, n * size_of::<i32>())?;
        let info = AllocGuard::new(&self.allocator, size_of::<i32>())?;

        let status = unsafe {
            dn::cusolverDnSgetrf(
                handle,
                n_i,
                n_i,
                a.ptr() as *mut f32,
                n_i,
                work.ptr() as *mut f32,
                ipiv.ptr() as *mut i32,
                info.ptr() as *mut i32,
            )
        };
        self.finish_native(Routine::Getrf, status, &info)?;

        let op = match trans {
            Transpose::NoTrans => dn::cublasOperation_t::CUBLAS_OP_N,
            Transpose::Trans => dn::cublasOperation_t::CUBLAS_OP_T,
        };
        let status = unsafe {
            dn::cusolverDnSgetrs(
                handle,
                op,
                n_i,
                k_i,
                a.ptr() as *const f32,
                n_i,
                ipiv.ptr() as *const i32,
                b.ptr() as *mut f32,
                n_i,
                info.ptr() as *mut i32,
            )
        };
        self.finish_native(Routine::Getrs, status, &info)?;

        Ok(b)
    }

    fn cholesky(
        &self,
        a: DeviceBuffer<CudaRuntime>,
        triangle: Triangle,
    ) -> Result<DeviceBuffer<CudaRuntime>> {
        let n = solver::square_order("cholesky", &a)?;
        if n == 0 {
            return Ok(a);
        }
        let n_i = as_native_dim("cholesky", n)?;
        log::debug!("cuda:{}: potrf n={n} {triangle:?}", self.device.index);

        self.bind()?;
        let dn_handle = self.lock_solver();
        let handle = dn_handle.handle();
        let uplo = dn::cublasFillMode_t::CUBLAS_FILL_MODE_LOWER;

        let mut lwork: i32 = 0;
        let status = unsafe {
            dn::cusolverDnSpotrf_bufferSize(handle, uplo, n_i, a.ptr() as *mut f32, n_i, &mut lwork)
        };
        NativeStatus::solver(Routine::Potrf, status as i32, 0).check()?;

        let work = AllocGuard::new(&self.allocator, lwork.max(0) as usize * size_of::<f32>())?;
        let info = AllocGuard::new(&self.allocator, size_of::<i32>())?;

        let status = unsafe {
            dn::cusolverDnSpotrf(
                handle,
                uplo,
                n_i,
                a.ptr() as *mut f32,
                n_i,
                work.ptr() as *mut f32,
                lwork,
                info.ptr() as *mut i32,
            )
        };
        self.finish_native(Routine::Potrf, status, &info)?;
        self.zero_strict_upper(&a, n)?;

        match triangle {
            Triangle::Lower => {
                self.synchronize()?;
                Ok(a)
            }
            Triangle::Upper => {
                let mut u = self.buffers.allocate(n, n)?;
                self.transpose_into(&a, &mut u, n_i)?;
                Ok(u)
            }
        }
    }
}
