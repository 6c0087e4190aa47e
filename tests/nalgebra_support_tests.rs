#![cfg(feature = "nalgebra")]

use nalgebra::DVector;
use tangent::nalgebra_support::{grad_nalgebra, jacobian_nalgebra};
use tangent::Dual64;

fn rosenbrock(x: &[Dual64]) -> Dual64 {
    let dx = x[0] - 1.0;
    let t = x[1] - x[0] * x[0];
    dx * dx + 100.0 * t * t
}

#[test]
fn grad_nalgebra_rosenbrock() {
    let x = DVector::from_vec(vec![1.0_f64, 2.0]);
    let (v, g) = grad_nalgebra(rosenbrock, &x);

    assert!((v - 100.0).abs() < 1e-10, "v={}", v);
    assert!((g[0] - (-400.0)).abs() < 1e-10, "g[0]={}", g[0]);
    assert!((g[1] - 200.0).abs() < 1e-10, "g[1]={}", g[1]);
}

#[test]
fn jacobian_nalgebra_is_row_major() {
    let x = DVector::from_vec(vec![2.0_f64, 3.0]);
    let (y, j) = jacobian_nalgebra(|v: &[Dual64]| vec![v[0] * v[1], v[1] * v[1]], &x);

    assert_eq!(y.len(), 2);
    assert_eq!(j.shape(), (2, 2));
    assert!((j[(0, 0)] - 3.0).abs() < 1e-12);
    assert!((j[(0, 1)] - 2.0).abs() < 1e-12);
    assert!((j[(1, 0)] - 0.0).abs() < 1e-12);
    assert!((j[(1, 1)] - 6.0).abs() < 1e-12);
}
