//! Integration tests for the Cholesky operator

mod common;

use common::*;
use densolve::prelude::*;

fn op(lower: bool) -> CholeskyOp {
    CholeskyOp::new(&TensorSpec::matrix("A", DType::F32), lower).unwrap()
}

fn check_diagonal<C: DenseSolver>(client: &C) {
    let diag = [4.0f32, 9.0, 0.25, 2.0];
    let a = HostMatrix::from_diagonal(&diag);

    let l = op(true).execute_to_host(client, &a).unwrap();
    let expected = HostMatrix::from_diagonal(&diag.map(f32::sqrt));
    assert_matrix_close(&l, &expected, 1e-6, 0.0, "diagonal factor");
}

fn check_lower_reconstructs<C: DenseSolver>(client: &C) {
    let mut rng = seeded_rng(3);
    let n = 12;
    let a = random_spd(&mut rng, n, 1.0);

    let l = op(true).execute_to_host(client, &a).unwrap();
    assert_eq!(max_abs_strict_upper(&l), 0.0, "upper triangle of L must be zero");
    for i in 0..n {
        assert!(l.get(i, i) > 0.0, "diagonal of L must be positive");
    }

    let llt = l.matmul(&l.transpose()).unwrap();
    assert_matrix_close(&llt, &a, 1e-4, 1e-4, "L L^T");

    let reference = to_nalgebra(&a).cholesky().unwrap().l();
    assert_matrix_close(&l, &from_nalgebra(&reference), 1e-3, 1e-4, "L vs nalgebra");
}

fn check_upper_is_lower_transposed<C: DenseSolver>(client: &C) {
    let mut rng = seeded_rng(17);
    let n = 9;
    let a = random_spd(&mut rng, n, 1.0);

    let l = op(true).execute_to_host(client, &a).unwrap();
    let u = op(false).execute_to_host(client, &a).unwrap();
    assert_eq!(max_abs_strict_lower(&u), 0.0, "lower triangle of U must be zero");
    assert_matrix_close(&u, &l.transpose(), 1e-6, 1e-7, "U = L^T");

    let utu = u.transpose().matmul(&u).unwrap();
    assert_matrix_close(&utu, &a, 1e-4, 1e-4, "U^T U");
}

fn check_not_positive_definite<C: DenseSolver>(client: &C) {
    let mut rng = seeded_rng(29);
    let spd = random_spd(&mut rng, 6, 0.0);
    let negated = from_nalgebra(&(-to_nalgebra(&spd)));

    for lower in [true, false] {
        let err = op(lower).execute(client, &negated).unwrap_err();
        assert_eq!(err.native_kind(), Some(NativeFailureKind::NotPositiveDefinite), "{err}");
        assert!(
            matches!(
                err,
                Error::NativeComputation { routine: Routine::Potrf, info, .. } if info > 0
            ),
            "{err}"
        );
    }
    assert_eq!(client.buffer_manager().live_buffers(), 0);
}

fn non_symmetric_3x3() -> HostMatrix {
    HostMatrix::from_rows(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], &[7.0, 8.0, 10.0]]).unwrap()
}

fn check_non_symmetric<C: DenseSolver>(client: &C) {
    let a = non_symmetric_3x3();

    let err = op(true).execute(client, &a).unwrap_err();
    assert!(matches!(err, Error::NativeComputation { .. }), "{err}");
    assert_eq!(client.buffer_manager().live_buffers(), 0);
}

fn check_resident_keeps_input<C: DenseSolver>(client: &C) {
    let a = HostMatrix::from_rows(&[&[4.0, 2.0], &[2.0, 5.0]]).unwrap();
    let buffers = client.buffer_manager();
    let a_dev = buffers.upload(&a).unwrap();

    let u = op(false).execute_resident(client, &a_dev).unwrap();
    assert_eq!(buffers.download(&u).unwrap().to_row_major().as_slice(), &[2.0, 1.0, 0.0, 2.0]);
    assert_eq!(buffers.download(&a_dev).unwrap().col_major_data(), a.col_major_data());

    drop(u);
    assert_eq!(buffers.live_buffers(), 1);
}

#[test]
fn test_cholesky_diagonal_cpu() {
    check_diagonal(&create_cpu_client());
}

#[test]
fn test_cholesky_lower_cpu() {
    check_lower_reconstructs(&create_cpu_client());
}

#[test]
fn test_cholesky_upper_cpu() {
    check_upper_is_lower_transposed(&create_cpu_client());
}

#[test]
fn test_cholesky_not_positive_definite_cpu() {
    check_not_positive_definite(&create_cpu_client());
}

#[test]
fn test_cholesky_non_symmetric_cpu() {
    check_non_symmetric(&create_cpu_client());

    // the lower triangle is read: l22^2 = 5 - 16
    let client = create_cpu_client();
    let a = non_symmetric_3x3();
    let err = gpu_cholesky(&client, &a, true).unwrap_err();
    assert!(
        matches!(
            err,
            Error::NativeComputation {
                kind: NativeFailureKind::NotPositiveDefinite,
                info: 2,
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn test_cholesky_resident_cpu() {
    check_resident_keeps_input(&create_cpu_client());
}

#[test]
fn test_cholesky_non_square_allocates_nothing() {
    let client = create_cpu_client();
    let a = HostMatrix::zeros(3, 2);

    let err = gpu_cholesky(&client, &a, true).unwrap_err();
    assert!(err.is_shape_error(), "{err}");
    assert_eq!(client.buffers().total_allocations(), 0);
}

#[test]
fn test_cholesky_rejects_bad_specs() {
    for spec in [
        TensorSpec::vector("A", DType::F32),
        TensorSpec::tensor3("A", DType::F32),
        TensorSpec::matrix("A", DType::F32).with_shape(&[4, 3]),
    ] {
        let err = CholeskyOp::new(&spec, true).unwrap_err();
        assert!(err.is_shape_error(), "{spec:?}: {err}");
    }

    let err = CholeskyOp::new(&TensorSpec::matrix("A", DType::I32), true).unwrap_err();
    assert!(matches!(err, Error::DType { dtype: DType::I32, .. }), "{err}");
}

#[test]
fn test_cholesky_in_place_upper_releases_input() {
    let client = create_cpu_client();
    let a = HostMatrix::from_rows(&[&[4.0, 2.0], &[2.0, 5.0]]).unwrap();
    let a_dev = client.buffers().upload(&a).unwrap();

    let u = op(false).execute_in_place(&client, a_dev).unwrap();
    assert_eq!(client.buffers().live_buffers(), 1);
    assert_eq!(client.buffers().total_allocations(), 2);
    assert_eq!(u.to_vec().unwrap(), vec![2.0, 0.0, 1.0, 2.0]);
}

#[test]
fn test_cholesky_out_of_memory() {
    let client = create_limited_cpu_client(16);
    let a = HostMatrix::identity(4);

    let err = gpu_cholesky(&client, &a, true).unwrap_err();
    assert!(matches!(err, Error::OutOfMemory { size: 64 }), "{err}");
    assert_eq!(client.device().memory_in_use(), 0);
}

#[test]
fn test_cholesky_upper_needs_room_for_transpose() {
    // the input fits but the transposed copy does not
    let client = create_limited_cpu_client(16);
    let a = HostMatrix::from_rows(&[&[4.0, 2.0], &[2.0, 5.0]]).unwrap();

    let err = op(false).execute(&client, &a).unwrap_err();
    assert!(matches!(err, Error::OutOfMemory { size: 16 }), "{err}");
    assert_eq!(client.buffers().live_buffers(), 0);
    assert_eq!(client.device().memory_in_use(), 0);

    let l = op(true).execute_to_host(&client, &a).unwrap();
    assert_eq!(l.get(1, 0), 1.0);
}

#[cfg(feature = "cuda")]
mod cuda {
    use super::*;

    macro_rules! cuda_case {
        ($name:ident, $check:ident) => {
            #[test]
            fn $name() {
                let _guard = cuda_test_lock();
                let Some(client) = create_cuda_client() else {
                    return;
                };
                $check(&client);
            }
        };
    }

    cuda_case!(test_cholesky_diagonal_cuda, check_diagonal);
    cuda_case!(test_cholesky_lower_cuda, check_lower_reconstructs);
    cuda_case!(test_cholesky_upper_cuda, check_upper_is_lower_transposed);
    cuda_case!(test_cholesky_not_positive_definite_cuda, check_not_positive_definite);
    cuda_case!(test_cholesky_non_symmetric_cuda, check_non_symmetric);
    cuda_case!(test_cholesky_resident_cuda, check_resident_keeps_input);
}
