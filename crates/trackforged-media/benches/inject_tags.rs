//! Benchmark inject_tags() against containers of increasing size.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use trackforged_media::mp4::atoms::{write_header, HEADER_SIZE};
use trackforged_media::inject_tags;

fn atom(atom_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    write_header(&mut out, (HEADER_SIZE + payload.len()) as u32, atom_type);
    out.extend_from_slice(payload);
    out
}

/// ftyp + mdat(`media_len` bytes) + moov/udta/meta/ilst.
fn make_m4a(media_len: usize) -> Vec<u8> {
    let mut meta_payload = vec![0u8; 4];
    meta_payload.extend(atom(b"ilst", &[]));
    let moov = atom(b"moov", &atom(b"udta", &atom(b"meta", &meta_payload)));

    let mut file = atom(b"ftyp", b"M4A \0\0\0\0");
    file.extend(atom(b"mdat", &vec![0x5A; media_len]));
    file.extend(moov);
    file
}

const REPLAYGAIN: [(&str, &str); 4] = [
    ("REPLAYGAIN_TRACK_GAIN", "-8.50 dB"),
    ("REPLAYGAIN_TRACK_PEAK", "0.988553"),
    ("REPLAYGAIN_ALBUM_GAIN", "-7.90 dB"),
    ("REPLAYGAIN_ALBUM_PEAK", "0.999969"),
];

fn bench_inject_tags(c: &mut Criterion) {
    let mut group = c.benchmark_group("inject_tags");

    // ~4 minute 256 kbps AAC track.
    let small = make_m4a(8 * 1024 * 1024);
    group.bench_function("8MiB_replaygain", |b| {
        b.iter(|| inject_tags(black_box(&small), REPLAYGAIN));
    });

    // ~10 minute 24-bit lossless track.
    let large = make_m4a(64 * 1024 * 1024);
    group.bench_function("64MiB_replaygain", |b| {
        b.iter(|| inject_tags(black_box(&large), REPLAYGAIN));
    });

    group.finish();
}

criterion_group!(benches, bench_inject_tags);
criterion_main!(benches);
