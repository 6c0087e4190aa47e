use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tangent::Dual64;
use tangent_optim::{
    least_squares, GaussNewton, Lbfgs, LeastSquaresOptions, LinearSolver, MatrixOperator, NoneAux,
    Qr,
};

fn test_matrix(rows: usize, cols: usize) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|i| {
            (0..cols)
                .map(|j| {
                    let base = ((i * 7 + j * 13) % 17) as f64 / 17.0;
                    if i == j {
                        base + cols as f64
                    } else {
                        base
                    }
                })
                .collect()
        })
        .collect()
}

fn bench_qr(c: &mut Criterion) {
    let mut group = c.benchmark_group("qr");
    for n in [4, 16, 64] {
        let a = test_matrix(2 * n, n);
        let b: Vec<f64> = (0..2 * n).map(|i| i as f64).collect();
        let qr = Qr::<f64>::new();

        group.bench_with_input(BenchmarkId::new("factor_and_solve", n), &a, |bench, a| {
            bench.iter(|| {
                let state = qr.init(&MatrixOperator::new(a.clone()));
                black_box(qr.compute(&state, black_box(&b)))
            })
        });

        let state = qr.init(&MatrixOperator::new(a.clone()));
        let v: Vec<f64> = (0..n).map(|i| 1.0 + i as f64).collect();
        group.bench_with_input(BenchmarkId::new("transposed_solve", n), &v, |bench, v| {
            bench.iter(|| {
                let state_t = qr.transpose(&state);
                black_box(qr.compute(&state_t, black_box(v)))
            })
        });
    }
    group.finish();
}

fn exponential_data(n: usize) -> (Vec<f64>, Vec<f64>) {
    let t: Vec<f64> = (0..n).map(|i| i as f64 / n as f64 * 3.0).collect();
    let obs = t.iter().map(|&ti| 2.0 * (-0.7 * ti).exp()).collect();
    (t, obs)
}

fn bench_curve_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("curve_fit");
    let fun = NoneAux(|p: &[Dual64], data: &(Vec<f64>, Vec<f64>)| {
        data.0
            .iter()
            .zip(&data.1)
            .map(|(&ti, &oi)| p[0] * (p[1] * ti).exp() - oi)
            .collect::<Vec<_>>()
    });
    for n in [10, 100] {
        let data = exponential_data(n);

        group.bench_with_input(BenchmarkId::new("gauss_newton", n), &data, |b, data| {
            let gn = GaussNewton::<f64>::default();
            b.iter(|| {
                black_box(least_squares(
                    fun,
                    &gn,
                    &[1.0, 0.0],
                    data,
                    &(),
                    &LeastSquaresOptions::default(),
                ))
            })
        });

        group.bench_with_input(BenchmarkId::new("lbfgs", n), &data, |b, data| {
            let lbfgs = Lbfgs::<f64>::default();
            let opts = LeastSquaresOptions::default()
                .with_max_steps(Some(1000))
                .with_throw(false);
            b.iter(|| black_box(least_squares(fun, &lbfgs, &[1.0, 0.0], data, &(), &opts)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_qr, bench_curve_fit);
criterion_main!(benches);
