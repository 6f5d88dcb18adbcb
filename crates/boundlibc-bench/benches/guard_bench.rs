//! Per-call overhead of the guard layer.
//!
//! Compares the checked memory functions with the bare slice operations
//! they wrap, and the C entry points with their declared-size variants.

use boundlibc_abi::BOS_UNKNOWN;
use boundlibc_abi::string_abi::{_timingsafe_bcmp_chk, memcpy_s, timingsafe_bcmp};
use boundlibc_bench::SIZES;
use boundlibc_core::{Buffer, BufferMut};
use boundlibc_membrane::handler::IgnoreHandler;
use boundlibc_membrane::{ConstraintGuard, HandlerFamily};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;

fn bench_memcpy(c: &mut Criterion) {
    let guard = ConstraintGuard::with_handler(HandlerFamily::Mem, Arc::new(IgnoreHandler))
        .ceiling_of(1 << 20);
    let mut group = c.benchmark_group("memcpy_s");

    for &size in SIZES {
        let src = vec![0xABu8; size];
        let mut dst = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("safe_api", size), &size, |b, &n| {
            b.iter(|| {
                let r = boundlibc_core::string::mem_s::memcpy_s(
                    &guard,
                    BufferMut::new(&mut dst),
                    n,
                    Buffer::new(&src),
                    n,
                );
                black_box(r)
            });
        });
        group.bench_with_input(BenchmarkId::new("c_abi", size), &size, |b, &n| {
            b.iter(|| {
                // SAFETY: both buffers hold `n` bytes and do not overlap.
                black_box(unsafe { memcpy_s(dst.as_mut_ptr().cast(), n, src.as_ptr().cast(), n) })
            });
        });
        group.bench_with_input(BenchmarkId::new("copy_from_slice", size), &size, |b, _| {
            b.iter(|| {
                dst.copy_from_slice(&src);
                black_box(dst.as_ptr())
            });
        });
    }
    group.finish();
}

fn bench_abi_bcmp(c: &mut Criterion) {
    let mut group = c.benchmark_group("abi_timingsafe_bcmp");

    for &size in SIZES {
        let a = vec![0x11u8; size];
        let b2 = vec![0x11u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("unknown_bos", size), &size, |b, &n| {
            b.iter(|| {
                // SAFETY: both buffers hold `n` bytes.
                black_box(unsafe { timingsafe_bcmp(a.as_ptr().cast(), b2.as_ptr().cast(), n) })
            });
        });
        group.bench_with_input(BenchmarkId::new("declared_bos", size), &size, |b, &n| {
            b.iter(|| {
                // SAFETY: both buffers hold `n` bytes.
                black_box(unsafe {
                    _timingsafe_bcmp_chk(a.as_ptr().cast(), b2.as_ptr().cast(), n, n, n)
                })
            });
        });
        group.bench_with_input(BenchmarkId::new("explicit_unknown", size), &size, |b, &n| {
            b.iter(|| {
                // SAFETY: both buffers hold `n` bytes.
                black_box(unsafe {
                    _timingsafe_bcmp_chk(
                        a.as_ptr().cast(),
                        b2.as_ptr().cast(),
                        n,
                        BOS_UNKNOWN,
                        BOS_UNKNOWN,
                    )
                })
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_memcpy, bench_abi_bcmp);
criterion_main!(benches);
