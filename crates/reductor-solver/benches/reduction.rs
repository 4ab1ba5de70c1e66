//! Benchmarks for the reduction pipeline.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use nalgebra::DMatrix;
use num_complex::Complex;
use reductor_core::LinearSystem;
use reductor_solver::{IrkaOptions, RkRequest, irka, rk};

fn banded_system(n: usize) -> LinearSystem {
    let a = DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            -(1.0 + i as f64 * 0.1)
        } else if i.abs_diff(j) == 1 {
            0.2
        } else {
            0.0
        }
    });
    LinearSystem::standard(
        a,
        DMatrix::from_element(n, 1, 1.0),
        DMatrix::from_element(1, n, 1.0),
    )
    .unwrap()
}

fn bench_rk(c: &mut Criterion) {
    let mut group = c.benchmark_group("rk_one_sided");
    for size in [40, 120, 400] {
        let sys = banded_system(size);
        let shifts = vec![
            Complex::new(0.0, 0.0),
            Complex::new(1.0, 0.0),
            Complex::new(0.5, 1.0),
            Complex::new(0.5, -1.0),
        ];
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            bencher.iter(|| {
                let result = rk(black_box(&sys), &RkRequest::one_sided(shifts.clone())).unwrap();
                black_box(result.sysr);
            })
        });
    }
    group.finish();
}

fn bench_irka(c: &mut Criterion) {
    let mut group = c.benchmark_group("irka");
    group.sample_size(10);
    for size in [40, 120] {
        let sys = banded_system(size);
        let s0 = [Complex::new(1.0, 0.0), Complex::new(2.0, 0.0)];
        let opts = IrkaOptions {
            max_iter: 30,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            bencher.iter(|| {
                let result = irka(black_box(&sys), &s0, &opts).unwrap();
                black_box(result.sysr);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rk, bench_irka);
criterion_main!(benches);
