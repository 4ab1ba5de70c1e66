//! Benchmarks for transfer-function evaluation and pole computation.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use nalgebra::DMatrix;
use num_complex::Complex;
use reductor_core::LinearSystem;

fn tridiag_system(n: usize) -> LinearSystem {
    let a = DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            -2.0
        } else if i.abs_diff(j) == 1 {
            1.0
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

fn bench_transfer(c: &mut Criterion) {
    let sys = tridiag_system(100);
    c.bench_function("transfer_at n=100", |bench| {
        bench.iter(|| {
            let h = sys.transfer_at(black_box(Complex::new(0.0, 1.0))).unwrap();
            black_box(h);
        })
    });
}

fn bench_poles(c: &mut Criterion) {
    let sys = tridiag_system(100);
    c.bench_function("poles n=100", |bench| {
        bench.iter(|| {
            let p = sys.poles().unwrap();
            black_box(p);
        })
    });
}

criterion_group!(benches, bench_transfer, bench_poles);
criterion_main!(benches);
