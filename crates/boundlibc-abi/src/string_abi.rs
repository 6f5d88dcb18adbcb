//! ABI layer for the bounds-checked `<string.h>` functions.
//!
//! Each entry point:
//! 1. builds buffer facts from its raw pointers and bound-of-size arguments
//! 2. runs the contract checks shared with `boundlibc-core`
//! 3. only then forms slices and calls the core kernel
//!
//! On a violation nothing is read or written through the caller's pointers.

use std::ffi::{c_int, c_void};

use boundlibc_core::string::mem_s::{
    MEMCMP_S, MEMCPY_S, check_memcmp, check_memcpy, check_memset, first_difference,
};
use boundlibc_core::string::timingsafe::{
    TIMINGSAFE_BCMP, TIMINGSAFE_MEMCMP, bcmp_validated, check_compare, memcmp_validated,
};
use boundlibc_membrane::errno::EOK;
use boundlibc_membrane::{BufferFacts, BufferRole, ConstraintGuard, ConstraintViolation};
use boundlibc_membrane::{Guarded, ViolationKind};

use crate::guard_state::mem_guard;
use crate::{BOS_UNKNOWN, errno_t, raw_facts, rsize_t};

type CompareKernel = fn(&ConstraintGuard, &[u8], &[u8]) -> i32;

#[inline]
fn errno_of(outcome: Guarded<()>) -> errno_t {
    outcome.map_or_else(|v| v.code(), |()| EOK)
}

/// Shared body of both constant-time comparators.
///
/// # Safety
/// When validation passes, `b1` and `b2` must be readable for `n` bytes.
unsafe fn compare_raw(
    op: &'static str,
    b1: *const c_void,
    b2: *const c_void,
    n: usize,
    (destbos, srcbos): (usize, usize),
    kernel: CompareKernel,
) -> c_int {
    let guard = mem_guard();
    let f1 = raw_facts("b1", BufferRole::Dest, b1, destbos);
    let f2 = raw_facts("b2", BufferRole::Src, b2, srcbos);
    if let Err(v) = check_compare(guard, op, &f1, &f2, n) {
        return v.negative_code();
    }
    // SAFETY: both pointers are non-null and the caller guarantees n readable bytes.
    let (a, b) = unsafe {
        (
            std::slice::from_raw_parts(b1.cast::<u8>(), n),
            std::slice::from_raw_parts(b2.cast::<u8>(), n),
        )
    };
    kernel(guard, a, b)
}

// ---------------------------------------------------------------------------
// timingsafe_bcmp / timingsafe_memcmp
// ---------------------------------------------------------------------------

/// 0 when the first `n` bytes are equal, 1 when not, `-errno` on a violation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _timingsafe_bcmp_chk(
    b1: *const c_void,
    b2: *const c_void,
    n: usize,
    destbos: usize,
    srcbos: usize,
) -> c_int {
    // SAFETY: forwarded caller contract.
    unsafe { compare_raw(TIMINGSAFE_BCMP, b1, b2, n, (destbos, srcbos), bcmp_validated) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn timingsafe_bcmp(b1: *const c_void, b2: *const c_void, n: usize) -> c_int {
    // SAFETY: forwarded caller contract.
    unsafe { _timingsafe_bcmp_chk(b1, b2, n, BOS_UNKNOWN, BOS_UNKNOWN) }
}

/// -1, 0 or 1 by the first differing byte, `-errno` on a violation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _timingsafe_memcmp_chk(
    b1: *const c_void,
    b2: *const c_void,
    n: usize,
    destbos: usize,
    srcbos: usize,
) -> c_int {
    // SAFETY: forwarded caller contract.
    unsafe {
        compare_raw(TIMINGSAFE_MEMCMP, b1, b2, n, (destbos, srcbos), memcmp_validated)
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn timingsafe_memcmp(
    b1: *const c_void,
    b2: *const c_void,
    n: usize,
) -> c_int {
    // SAFETY: forwarded caller contract.
    unsafe { _timingsafe_memcmp_chk(b1, b2, n, BOS_UNKNOWN, BOS_UNKNOWN) }
}

// ---------------------------------------------------------------------------
// memcpy_s / memset_s / memcmp_s
// ---------------------------------------------------------------------------

/// Fail with `Overlap` when `[dest, dest+len)` and `[src, src+len)` intersect.
fn check_disjoint(
    guard: &ConstraintGuard,
    dest: &BufferFacts,
    src: &BufferFacts,
    len: usize,
) -> Guarded<()> {
    let (Some(d), Some(s)) = (dest.addr, src.addr) else {
        return Ok(());
    };
    let overlaps = d < s.saturating_add(len) && s < d.saturating_add(len);
    if !overlaps {
        return Ok(());
    }
    guard.fail(
        ConstraintViolation::new(MEMCPY_S, ViolationKind::Overlap, "overlap undefined")
            .at(BufferRole::Dest, d),
    )
}

/// `memcpy_s` with declared capacities for both buffers.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _memcpy_s_chk(
    dest: *mut c_void,
    dmax: rsize_t,
    src: *const c_void,
    slen: rsize_t,
    destbos: usize,
    srcbos: usize,
) -> errno_t {
    let guard = mem_guard();
    let dest_facts = raw_facts("dest", BufferRole::Dest, dest.cast_const(), destbos);
    let src_facts = raw_facts("src", BufferRole::Src, src, srcbos);
    let outcome = check_memcpy(guard, &dest_facts, dmax, &src_facts, slen)
        .and_then(|()| check_disjoint(guard, &dest_facts, &src_facts, slen))
        .map(|()| {
            // SAFETY: non-null, disjoint, and slen fits in both buffers.
            unsafe { std::ptr::copy_nonoverlapping(src.cast::<u8>(), dest.cast::<u8>(), slen) };
        });
    errno_of(outcome)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn memcpy_s(
    dest: *mut c_void,
    dmax: rsize_t,
    src: *const c_void,
    slen: rsize_t,
) -> errno_t {
    // SAFETY: forwarded caller contract.
    unsafe { _memcpy_s_chk(dest, dmax, src, slen, BOS_UNKNOWN, BOS_UNKNOWN) }
}

/// `memset_s` with a declared destination capacity.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _memset_s_chk(
    dest: *mut c_void,
    dmax: rsize_t,
    value: c_int,
    n: rsize_t,
    destbos: usize,
) -> errno_t {
    let guard = mem_guard();
    let facts = raw_facts("dest", BufferRole::Dest, dest.cast_const(), destbos);
    let outcome = check_memset(guard, &facts, dmax, n).map(|()| {
        // SAFETY: non-null and n fits in the destination. C stores value as unsigned char.
        unsafe { std::ptr::write_bytes(dest.cast::<u8>(), value as u8, n) };
    });
    errno_of(outcome)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn memset_s(
    dest: *mut c_void,
    dmax: rsize_t,
    value: c_int,
    n: rsize_t,
) -> errno_t {
    // SAFETY: forwarded caller contract.
    unsafe { _memset_s_chk(dest, dmax, value, n, BOS_UNKNOWN) }
}

/// `memcmp_s` with declared capacities. `*diff` is written only on success.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _memcmp_s_chk(
    dest: *const c_void,
    dmax: rsize_t,
    src: *const c_void,
    slen: rsize_t,
    diff: *mut c_int,
    destbos: usize,
    srcbos: usize,
) -> errno_t {
    let guard = mem_guard();
    let diff_facts = raw_facts("diff", BufferRole::Result, diff.cast_const(), BOS_UNKNOWN);
    let dest_facts = raw_facts("dest", BufferRole::Dest, dest, destbos);
    let src_facts = raw_facts("src", BufferRole::Src, src, srcbos);
    let checked = guard
        .require_present(MEMCMP_S, &diff_facts)
        .and_then(|_| check_memcmp(guard, &dest_facts, dmax, &src_facts, slen));
    if let Err(v) = checked {
        return v.code();
    }
    // SAFETY: both pointers are non-null and slen fits in both buffers.
    let (a, b) = unsafe {
        (
            std::slice::from_raw_parts(dest.cast::<u8>(), slen),
            std::slice::from_raw_parts(src.cast::<u8>(), slen),
        )
    };
    // SAFETY: diff is non-null.
    unsafe { *diff = first_difference(a, b) };
    EOK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn memcmp_s(
    dest: *const c_void,
    dmax: rsize_t,
    src: *const c_void,
    slen: rsize_t,
    diff: *mut c_int,
) -> errno_t {
    // SAFETY: forwarded caller contract.
    unsafe { _memcmp_s_chk(dest, dmax, src, slen, diff, BOS_UNKNOWN, BOS_UNKNOWN) }
}
