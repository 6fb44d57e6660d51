use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::BTreeMap;
use ufser::prelude::*;

const N_BIG_ARR: usize = 2000;

fn big_arr() -> Vec<i64> { (0..N_BIG_ARR as i64).collect() }

const N_ARR: usize = 10;
const N_MAP: usize = 10;

type Record = Vec<BTreeMap<String, (Vec<i64>, Option<String>)>>;

fn big_record() -> Record {
    let v0: Vec<i64> = (0..N_ARR as i64).collect();
    let m: BTreeMap<String, (Vec<i64>, Option<String>)> = (0..N_MAP)
        .map(|i| (format!("key{}", i), (v0.clone(), Some(i.to_string()))))
        .collect();
    std::iter::repeat(m).take(N_ARR).collect()
}

fn bench_enc(c: &mut Criterion) {
    let rec = big_record();
    let enc_len = encode_full(&rec).len();
    c.bench_function(
        &format!("Encoding a record, output size of {} bytes", enc_len),
        move |b| b.iter(|| encode_full(black_box(&rec))),
    );
}

fn bench_enc_single_alloc(c: &mut Criterion) {
    let rec = big_record();
    let enc_len = encode_full(&rec).len();
    c.bench_function(
        &format!(
            "Encoding a record, output size of {} bytes, buffer preallocated",
            enc_len
        ),
        move |b| {
            b.iter(|| {
                let mut out = Vec::with_capacity(enc_len * 2);
                encode(black_box(&rec), &mut out);
                out
            })
        },
    );
}

fn bench_dec(c: &mut Criterion) {
    let enc = encode_full(&big_record());
    c.bench_function(
        &format!("Decoding a record, input size of {} bytes", enc.len()),
        move |b| b.iter(|| decode_full(black_box(&enc)).map(|x: Record| x).unwrap()),
    );
}

fn bench_scan(c: &mut Criterion) {
    let a = Any::new(&big_record());
    c.bench_function(
        &format!("Scanning a record of type {}", a.typestring()),
        move |b| b.iter(|| scan(a.typestring().as_bytes(), black_box(a.value()), false, true).unwrap()),
    );
}

fn bench_enc_flat(c: &mut Criterion) {
    let arr = big_arr();
    let enc_len = encode_full(&arr).len();
    c.bench_function(
        &format!("Encoding a vector, output size of {} bytes", enc_len),
        move |b| b.iter(|| encode_full(black_box(&arr))),
    );
}

fn bench_dec_flat(c: &mut Criterion) {
    let enc = encode_full(&big_arr());
    c.bench_function(
        &format!("Decoding a vector of length {}", N_BIG_ARR),
        move |b| b.iter(|| decode_full(black_box(&enc)).map(|x: Vec<i64>| x).unwrap()),
    );
}

fn bench_print(c: &mut Criterion) {
    let a = Any::new(&big_record());
    c.bench_function("Printing a record as text", move |b| {
        b.iter(|| black_box(&a).print().unwrap())
    });
}

criterion_group!(
    benches,
    bench_enc,
    bench_enc_single_alloc,
    bench_dec,
    bench_scan,
    bench_enc_flat,
    bench_dec_flat,
    bench_print
);
criterion_main!(benches);
