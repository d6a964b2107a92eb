//! Common test utilities
#![allow(dead_code)]

use densolve::prelude::*;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Create a reference-device client with no memory limit
pub fn create_cpu_client() -> CpuClient {
    let device = CpuDevice::new();
    CpuRuntime::default_client(&device).expect("cpu client")
}

/// Create a reference-device client that refuses allocations beyond `bytes`
pub fn create_limited_cpu_client(bytes: usize) -> CpuClient {
    CpuClient::new(CpuDevice::with_memory_limit(bytes))
}

/// Create a CUDA client, returning None if CUDA is unavailable
#[cfg(feature = "cuda")]
pub fn create_cuda_client() -> Option<CudaClient> {
    if !densolve::runtime::cuda::is_cuda_available() {
        eprintln!("CUDA unavailable, skipping");
        return None;
    }
    CudaRuntime::default_client(&CudaDevice::new(0)).ok()
}

/// Serialize CUDA tests: they share the process-wide client and its counters
#[cfg(feature = "cuda")]
pub fn cuda_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock, PoisonError};
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Assert two f32 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two matrices have the same shape and close values
pub fn assert_matrix_close(a: &HostMatrix, b: &HostMatrix, rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.dims(), b.dims(), "{}: shape mismatch", msg);
    assert_allclose_f32(&a.col_major_data(), &b.col_major_data(), rtol, atol, msg);
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Entries uniform in [-1, 1)
pub fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> HostMatrix {
    let data = (0..rows * cols)
        .map(|_| rng.random_range(-1.0f32..1.0))
        .collect();
    HostMatrix::from_row_major(rows, cols, data).unwrap()
}

/// Standard normal entries (Box-Muller)
pub fn random_normal_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> HostMatrix {
    let data = (0..rows * cols)
        .map(|_| {
            let u1: f32 = rng.random_range(f32::EPSILON..1.0);
            let u2: f32 = rng.random_range(0.0f32..1.0);
            (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
        })
        .collect();
    HostMatrix::from_row_major(rows, cols, data).unwrap()
}

pub fn to_nalgebra(m: &HostMatrix) -> DMatrix<f32> {
    let (r, c) = m.dims();
    DMatrix::from_column_slice(r, c, &m.col_major_data())
}

pub fn from_nalgebra(m: &DMatrix<f32>) -> HostMatrix {
    HostMatrix::from_col_major(m.nrows(), m.ncols(), m.as_slice().to_vec()).unwrap()
}

/// `m + shift * I`
pub fn shift_diagonal(m: &HostMatrix, shift: f32) -> HostMatrix {
    let n = m.rows();
    let mut out = to_nalgebra(m);
    for i in 0..n {
        out[(i, i)] += shift;
    }
    from_nalgebra(&out)
}

/// `M M^T + shift * I` for a random `n x n` M
pub fn random_spd(rng: &mut StdRng, n: usize, shift: f32) -> HostMatrix {
    let m = to_nalgebra(&random_normal_matrix(rng, n, n));
    let gram = &m * m.transpose();
    shift_diagonal(&from_nalgebra(&gram), shift)
}

/// Assert `a * x ≈ b`
pub fn assert_residual(
    a: &HostMatrix,
    x: &HostMatrix,
    b: &HostMatrix,
    rtol: f32,
    atol: f32,
    msg: &str,
) {
    let ax = a.matmul(x).unwrap();
    assert_matrix_close(&ax, b, rtol, atol, msg);
}

/// Largest absolute entry strictly above the diagonal
pub fn max_abs_strict_upper(m: &HostMatrix) -> f32 {
    let mut max = 0.0f32;
    for j in 0..m.cols() {
        for i in 0..j.min(m.rows()) {
            max = max.max(m.get(i, j).abs());
        }
    }
    max
}

/// Largest absolute entry strictly below the diagonal
pub fn max_abs_strict_lower(m: &HostMatrix) -> f32 {
    max_abs_strict_upper(&m.transpose())
}
