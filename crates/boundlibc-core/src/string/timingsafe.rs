//! Constant-time comparison: `timingsafe_bcmp` and `timingsafe_memcmp`.
//!
//! Both kernels visit every byte pair of the validated length. Neither the
//! loop bound nor any branch depends on buffer content; only `n` may
//! influence timing. Accumulators are routed through
//! [`core::hint::black_box`] so the optimizer cannot rewrite the loop into
//! an early-exit comparison, and the final equality test goes through
//! [`subtle::ConstantTimeEq`].
//!
//! `b1` is validated as the destination and `b2` as the source. `b1` is
//! checked completely before `b2`, so a bad `b1` is always the one reported
//! when both are bad.

use core::hint::black_box;

use boundlibc_membrane::{BufferFacts, BufferRole, ConstraintGuard, Guarded};
use subtle::ConstantTimeEq;

use crate::buffer::Buffer;

pub const TIMINGSAFE_BCMP: &str = "timingsafe_bcmp";
pub const TIMINGSAFE_MEMCMP: &str = "timingsafe_memcmp";

/// OR of the XOR of every byte pair, and the number of pairs visited.
///
/// Compares `min(a.len(), b.len())` pairs; callers pass equal-length slices.
#[inline(never)]
#[must_use]
pub fn bcmp_kernel(a: &[u8], b: &[u8]) -> (u8, usize) {
    let mut acc = 0u8;
    let mut steps = 0usize;
    for (&x, &y) in a.iter().zip(b) {
        acc = black_box(acc | (x ^ y));
        steps += 1;
    }
    (acc, steps)
}

/// Sign of the first differing byte pair (-1, 0 or 1), and the number of
/// pairs visited. Branch-free: the first difference is latched with masks.
#[inline(never)]
#[must_use]
pub fn memcmp_kernel(a: &[u8], b: &[u8]) -> (i32, usize) {
    let mut res = 0i32;
    let mut done = 0i32;
    let mut steps = 0usize;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (i32::from(x), i32::from(y));
        // -1 when x < y (resp. y < x), 0 otherwise.
        let lt = (x - y) >> 8;
        let gt = (y - x) >> 8;
        let cmp = lt - gt;
        res = black_box(res | (cmp & !done));
        done = black_box(done | lt | gt);
        steps += 1;
    }
    (res, steps)
}

/// Run the equality kernel on already-validated slices: 0 if equal, 1 if not.
pub fn bcmp_validated(guard: &ConstraintGuard, a: &[u8], b: &[u8]) -> i32 {
    let (acc, steps) = bcmp_kernel(a, b);
    guard.metrics().record_compare(steps);
    i32::from((!acc.ct_eq(&0)).unwrap_u8())
}

/// Run the ordering kernel on already-validated slices.
pub fn memcmp_validated(guard: &ConstraintGuard, a: &[u8], b: &[u8]) -> i32 {
    let (res, steps) = memcmp_kernel(a, b);
    guard.metrics().record_compare(steps);
    res
}

/// Checks shared by both comparators: `b1` completely (null, then `n`
/// against its bound), then `b2` the same way.
pub fn check_compare(
    guard: &ConstraintGuard,
    op: &'static str,
    b1: &BufferFacts,
    b2: &BufferFacts,
    n: usize,
) -> Guarded<()> {
    guard.check_pair(op, n, b1, b2)
}

fn validated_pair<'a, 'b>(
    guard: &ConstraintGuard,
    op: &'static str,
    b1: Buffer<'a>,
    b2: Buffer<'b>,
    n: usize,
) -> Guarded<(&'a [u8], &'b [u8])> {
    let f1 = b1.facts("b1", BufferRole::Dest);
    let f2 = b2.facts("b2", BufferRole::Src);
    check_compare(guard, op, &f1, &f2, n)?;
    Ok((b1.prefix(guard, op, n, &f1)?, b2.prefix(guard, op, n, &f2)?))
}

/// Checked form: compare the first `n` bytes with declared capacities.
///
/// Returns `Ok(0)` when equal, `Ok(1)` when they differ.
pub fn timingsafe_bcmp_chk(
    guard: &ConstraintGuard,
    b1: Buffer<'_>,
    b2: Buffer<'_>,
    n: usize,
) -> Guarded<i32> {
    let (a, b) = validated_pair(guard, TIMINGSAFE_BCMP, b1, b2, n)?;
    Ok(bcmp_validated(guard, a, b))
}

/// Convenience form: capacities unknown, `n` bounded by the ceiling.
pub fn timingsafe_bcmp(
    guard: &ConstraintGuard,
    b1: Option<&[u8]>,
    b2: Option<&[u8]>,
    n: usize,
) -> Guarded<i32> {
    timingsafe_bcmp_chk(guard, b1.into(), b2.into(), n)
}

/// Checked form of the ordering compare: -1, 0 or 1 like `memcmp`, with
/// timing independent of where the buffers first differ.
pub fn timingsafe_memcmp_chk(
    guard: &ConstraintGuard,
    b1: Buffer<'_>,
    b2: Buffer<'_>,
    n: usize,
) -> Guarded<i32> {
    let (a, b) = validated_pair(guard, TIMINGSAFE_MEMCMP, b1, b2, n)?;
    Ok(memcmp_validated(guard, a, b))
}

pub fn timingsafe_memcmp(
    guard: &ConstraintGuard,
    b1: Option<&[u8]>,
    b2: Option<&[u8]>,
    n: usize,
) -> Guarded<i32> {
    timingsafe_memcmp_chk(guard, b1.into(), b2.into(), n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boundlibc_membrane::{HandlerFamily, RecordingHandler, ViolationKind};
    use std::sync::Arc;

    fn s(bytes: &[u8]) -> Option<&[u8]> {
        Some(bytes)
    }

    fn guard() -> (ConstraintGuard, Arc<RecordingHandler>) {
        let rec = Arc::new(RecordingHandler::new());
        let guard = ConstraintGuard::with_handler(HandlerFamily::Mem, rec.clone()).ceiling_of(64);
        (guard, rec)
    }

    #[test]
    fn equal_and_different() {
        let (g, _) = guard();
        assert_eq!(timingsafe_bcmp(&g, s(b"abc"), s(b"abc"), 3), Ok(0));
        assert_eq!(timingsafe_bcmp(&g, s(b"abc"), s(b"abd"), 3), Ok(1));
        assert_eq!(timingsafe_bcmp(&g, s(b"abc"), s(b"abd"), 2), Ok(0));
    }

    #[test]
    fn step_count_is_position_independent() {
        let a = [0x5Au8; 32];
        for pos in 0..32 {
            let mut b = a;
            b[pos] ^= 0x80;
            assert_eq!(bcmp_kernel(&a, &b).1, 32);
            assert_eq!(memcmp_kernel(&a, &b).1, 32);
        }
        assert_eq!(bcmp_kernel(&a, &a), (0, 32));
    }

    #[test]
    fn every_bit_difference_detected() {
        for bit in 0..8 {
            let a = [0u8; 4];
            let b = [0, 0, 1 << bit, 0];
            assert_ne!(bcmp_kernel(&a, &b).0, 0);
        }
    }

    #[test]
    fn memcmp_orders_by_first_difference() {
        let (g, _) = guard();
        assert_eq!(timingsafe_memcmp(&g, s(b"abc"), s(b"abc"), 3), Ok(0));
        assert_eq!(timingsafe_memcmp(&g, s(b"abc"), s(b"abd"), 3), Ok(-1));
        assert_eq!(timingsafe_memcmp(&g, s(b"abd"), s(b"abc"), 3), Ok(1));
        // Later differences never override the first one.
        assert_eq!(timingsafe_memcmp(&g, s(b"az"), s(b"ba"), 2), Ok(-1));
        assert_eq!(timingsafe_memcmp(&g, s(&[0xFF]), s(&[0x00]), 1), Ok(1));
    }

    #[test]
    fn zero_length_is_equal() {
        let (g, rec) = guard();
        assert_eq!(timingsafe_bcmp(&g, s(b""), s(b"x"), 0), Ok(0));
        assert_eq!(timingsafe_memcmp(&g, s(b"a"), s(b"b"), 0), Ok(0));
        assert_eq!(rec.count(), 0);
    }

    #[test]
    fn null_b1_reported_before_b2() {
        let (g, rec) = guard();
        let err = timingsafe_bcmp(&g, None, None, 1).unwrap_err();
        assert_eq!(err.kind, ViolationKind::NullArgument);
        assert_eq!(err.role, Some(BufferRole::Dest));
        assert_eq!(err.negative_code(), -400);
        assert_eq!(rec.count(), 1);
    }

    #[test]
    fn b1_overflow_reported_before_null_b2() {
        let (g, rec) = guard();
        let data = *b"abcdef";
        let err = timingsafe_bcmp_chk(&g, Buffer::with_capacity(&data, 2), Buffer::null(), 4)
            .unwrap_err();
        assert_eq!(err.kind, ViolationKind::LengthExceedsBound);
        assert_eq!(err.role, Some(BufferRole::Dest));
        assert_eq!(err.reason, "n exceeds b1");
        let err = timingsafe_memcmp_chk(&g, Buffer::with_capacity(&data, 2), Buffer::null(), 4)
            .unwrap_err();
        assert_eq!(err.reason, "n exceeds b1");
        assert_eq!(rec.count(), 2);

        // A valid b1 moves on to b2.
        let err = timingsafe_bcmp_chk(&g, Buffer::new(&data), Buffer::null(), 4).unwrap_err();
        assert_eq!(err.kind, ViolationKind::NullArgument);
        assert_eq!(err.role, Some(BufferRole::Src));
    }

    #[test]
    fn declared_capacity_messages() {
        let (g, _) = guard();
        let data = *b"abcdef";
        let err =
            timingsafe_bcmp_chk(&g, Buffer::with_capacity(&data, 2), Buffer::new(&data), 3)
                .unwrap_err();
        assert_eq!(err.to_string(), "timingsafe_bcmp: n exceeds b1");
        let err =
            timingsafe_bcmp_chk(&g, Buffer::new(&data), Buffer::with_capacity(&data, 2), 3)
                .unwrap_err();
        assert_eq!(err.to_string(), "timingsafe_bcmp: n exceeds b2");
        assert_eq!(err.negative_code(), -403);
    }

    #[test]
    fn unknown_capacity_bounded_by_ceiling() {
        let (g, _) = guard();
        let big = vec![0u8; 128];
        let err = timingsafe_bcmp(&g, s(&big), s(&big), 65).unwrap_err();
        assert_eq!(err.to_string(), "timingsafe_bcmp: n exceeds max");
    }

    #[test]
    fn metrics_count_visited_bytes() {
        let (g, _) = guard();
        timingsafe_bcmp(&g, s(b"abc"), s(b"abc"), 3).unwrap();
        timingsafe_bcmp(&g, s(b"abc"), s(b"xbc"), 3).unwrap();
        let snap = g.metrics().snapshot();
        assert_eq!(snap.compares, 2);
        assert_eq!(snap.bytes_compared, 6);
    }
}
