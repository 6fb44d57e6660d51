use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ufser::prelude::*;

const N: usize = 1000;

fn pairs() -> Vec<(i32, Expected<f64>)> {
    (0..N as i32).map(|i| (i, Ok(f64::from(i) / 2.0))).collect()
}

fn bench_widen(c: &mut Criterion) {
    let v = encode_full(&pairs());
    c.bench_function(&format!("Widening {} pairs to lt2Id", N), move |b| {
        b.iter(|| {
            convert(
                "lt2ixd",
                "lt2Id",
                SerPolicy::INTS | SerPolicy::EXPECTED,
                black_box(&v),
            )
            .unwrap()
        })
    });
}

fn bench_into_any(c: &mut Criterion) {
    let v = encode_full(&pairs());
    c.bench_function(&format!("Wrapping {} pairs into anys", N), move |b| {
        b.iter(|| convert("lt2ixd", "la", SerPolicy::ANY, black_box(&v)).unwrap())
    });
}

fn bench_types_only(c: &mut Criterion) {
    c.bench_function("Checking convertibility of types only", |b| {
        b.iter(|| {
            cant_convert(
                black_box("t3lt2ixdmsoat2aX"),
                black_box("t3lt2Idmslait2Xa"),
                SerPolicy::ALL,
                None,
            )
        })
    });
}

fn bench_parse(c: &mut Criterion) {
    let text = Any::new(&pairs()).print().unwrap();
    c.bench_function(&format!("Parsing {} bytes of text", text.len()), move |b| {
        b.iter(|| parse(black_box(&text), ParseMode::Normal).unwrap())
    });
}

criterion_group!(benches, bench_widen, bench_into_any, bench_types_only, bench_parse);
criterion_main!(benches);
