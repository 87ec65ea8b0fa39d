use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gbf::codec::{Codec, ZlibCodec, DEFAULT_ZLIB_LEVEL};

fn bench_compression(c: &mut Criterion) {
    let zeros = vec![0u8; 1024 * 1024];
    let noisy: Vec<u8> = (0..1024 * 1024).map(|i| (i * 2654435761u32 as usize >> 24) as u8).collect();
    let zlib = ZlibCodec;

    c.bench_function("zlib_compress_1mb_zeros", |b| {
        b.iter(|| zlib.compress(black_box(&zeros), DEFAULT_ZLIB_LEVEL))
    });
    c.bench_function("zlib_compress_1mb_noisy", |b| {
        b.iter(|| zlib.compress(black_box(&noisy), DEFAULT_ZLIB_LEVEL))
    });

    let compressed = zlib.compress(&zeros, DEFAULT_ZLIB_LEVEL).unwrap();
    c.bench_function("zlib_decompress_1mb_zeros", |b| {
        b.iter(|| zlib.decompress(black_box(&compressed), zeros.len()))
    });
}

criterion_group!(benches, bench_compression);
criterion_main!(benches);
