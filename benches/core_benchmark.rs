use criterion::{black_box, criterion_group, criterion_main, Criterion};

use semi2k::ndarray::NdArray;
use semi2k::ring::{encode_f64, SignedZ2};
use semi2k::serialization::{Deserializer, Serializer};

type Z = SignedZ2<128>;

fn ring_mul(c: &mut Criterion) {
    let xs: Vec<Z> = (0..1024i64).map(|i| Z::from(i * 7 - 300)).collect();
    let ys: Vec<Z> = (0..1024i64).map(|i| Z::from(i * 13 + 11)).collect();
    c.bench_function("ring_mul_1024", |b| {
        b.iter(|| {
            let mut acc = Z::zero();
            for (&x, &y) in xs.iter().zip(ys.iter()) {
                acc = acc + x * y;
            }
            black_box(acc)
        })
    });
}

fn fixed_encode(c: &mut Criterion) {
    c.bench_function("encode_f64_k128_d40", |b| {
        b.iter(|| {
            for i in 0..256 {
                black_box(encode_f64::<128>(i as f64 * 0.37 - 40.0, 40));
            }
        })
    });
}

fn ndarray_traversal(c: &mut Criterion) {
    let arr = NdArray::from_vec((0..4096i64).map(Z::from).collect(), &[64, 64]);
    let transposed = arr.transpose();
    c.bench_function("ndarray_iter_compact", |b| {
        b.iter(|| black_box(arr.iter().fold(Z::zero(), |acc, x| acc + x)))
    });
    c.bench_function("ndarray_iter_strided", |b| {
        b.iter(|| black_box(transposed.iter().fold(Z::zero(), |acc, x| acc + x)))
    });
}

fn serialization_round_trip(c: &mut Criterion) {
    let arr = NdArray::from_vec((0..2048i64).map(Z::from).collect(), &[2048]);
    c.bench_function("serialize_ndarray_2048", |b| {
        b.iter(|| {
            let mut s = Serializer::new();
            s.write(&arr);
            let bytes = s.finalize().to_vec();
            let mut d = Deserializer::new(bytes);
            let back: NdArray<Z> = d.read().unwrap();
            black_box(back)
        })
    });
}

criterion_group!(
    benches,
    ring_mul,
    fixed_encode,
    ndarray_traversal,
    serialization_round_trip
);
criterion_main!(benches);
