use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rug::Integer;
use sdbcmpalgo::*;
use sdbcmpcleartext::ClearContext;
use sdbcmpcrypto::{keygen, EvalContext, LocalOracle, PaillierContext};

fn bench_equality_cleartext(c: &mut Criterion) {
    let ctx = ClearContext::default();
    let mut group = c.benchmark_group("is_equal_cleartext");
    for width in [8usize, 16, 32] {
        let a = encrypt_bits(&ctx, 0x5A5A_5A5A, width).unwrap();
        let b = encrypt_bits(&ctx, 0x5A5A_5A5A, width).unwrap();
        group.bench_with_input(BenchmarkId::new("optimized", width), &width, |bencher, _| {
            bencher.iter(|| black_box(is_equal(&ctx, &a, &b, true).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("naive", width), &width, |bencher, _| {
            bencher.iter(|| black_box(is_equal(&ctx, &a, &b, false).unwrap()));
        });
    }
    group.finish();
}

fn bench_compare_paillier(c: &mut Criterion) {
    let (pk, sk) = keygen(1024, &mut rand::thread_rng()).unwrap();
    let ctx = PaillierContext::new(pk.clone(), LocalOracle::new(pk, sk));
    let x = ctx.encrypt(&Integer::from(1234)).unwrap();
    let y = ctx.encrypt(&Integer::from(4321)).unwrap();
    let a = Bits::new(ctx.extract_bits(&x, 16).unwrap());
    let b = Bits::new(ctx.extract_bits(&y, 16).unwrap());

    let mut group = c.benchmark_group("paillier_16bit");
    group.sample_size(10);
    group.bench_function("is_equal_optimized", |bencher| {
        bencher.iter(|| black_box(is_equal(&ctx, &a, &b, true).unwrap()));
    });
    group.bench_function("is_equal_naive", |bencher| {
        bencher.iter(|| black_box(is_equal(&ctx, &a, &b, false).unwrap()));
    });
    group.bench_function("less_than", |bencher| {
        bencher.iter(|| black_box(compare(&ctx, &a, &b, ComparisonKind::Less, false).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_equality_cleartext, bench_compare_paillier);
criterion_main!(benches);
