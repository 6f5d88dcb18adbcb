//! Bounds-checked memory functions: `memcpy_s`, `memset_s`, `memcmp_s`.
//!
//! Each function validates the destination completely (presence, `dmax`,
//! then capacity) before it looks at the source. On any violation the
//! destination is left untouched.
//!
//! The `check_*` functions hold the whole contract and work on
//! [`BufferFacts`] alone, so the C boundary can validate raw pointers with
//! exactly the same rules before it forms any slice.

use boundlibc_membrane::{BufferFacts, BufferRole, ConstraintGuard, Guarded};

use crate::buffer::{Buffer, BufferMut};

pub const MEMCPY_S: &str = "memcpy_s";
pub const MEMSET_S: &str = "memset_s";
pub const MEMCMP_S: &str = "memcmp_s";

/// Contract of `memcpy_s(dest, dmax, src, slen)`.
///
/// `slen == 0` is a no-op success.
pub fn check_memcpy(
    guard: &ConstraintGuard,
    dest: &BufferFacts,
    dmax: usize,
    src: &BufferFacts,
    slen: usize,
) -> Guarded<()> {
    guard.require_present(MEMCPY_S, dest)?;
    guard.check_nonzero(MEMCPY_S, "dmax", dmax, dest)?;
    guard.check_len(MEMCPY_S, "dmax", dmax, dest)?;
    guard.require_present(MEMCPY_S, src)?;
    guard.check_room(MEMCPY_S, ("slen", slen), ("dmax", dmax), dest)?;
    guard.check_len(MEMCPY_S, "slen", slen, src)
}

/// Contract of `memset_s(dest, dmax, value, n)`.
pub fn check_memset(
    guard: &ConstraintGuard,
    dest: &BufferFacts,
    dmax: usize,
    n: usize,
) -> Guarded<()> {
    guard.require_present(MEMSET_S, dest)?;
    guard.check_len(MEMSET_S, "dmax", dmax, dest)?;
    guard.check_room(MEMSET_S, ("n", n), ("dmax", dmax), dest)
}

/// Contract of `memcmp_s(dest, dmax, src, slen)`.
pub fn check_memcmp(
    guard: &ConstraintGuard,
    dest: &BufferFacts,
    dmax: usize,
    src: &BufferFacts,
    slen: usize,
) -> Guarded<()> {
    guard.require_present(MEMCMP_S, dest)?;
    guard.check_nonzero(MEMCMP_S, "dmax", dmax, dest)?;
    guard.check_len(MEMCMP_S, "dmax", dmax, dest)?;
    guard.require_present(MEMCMP_S, src)?;
    guard.check_nonzero(MEMCMP_S, "slen", slen, src)?;
    guard.check_room(MEMCMP_S, ("slen", slen), ("dmax", dmax), dest)?;
    guard.check_len(MEMCMP_S, "slen", slen, src)
}

/// Copy `slen` bytes of `src` into `dest`, which holds `dmax` bytes.
///
/// Safe slices cannot overlap, so `ESOVRLP` only arises at the C boundary.
pub fn memcpy_s(
    guard: &ConstraintGuard,
    dest: BufferMut<'_>,
    dmax: usize,
    src: Buffer<'_>,
    slen: usize,
) -> Guarded<()> {
    let dest_facts = dest.facts("dest", BufferRole::Dest);
    let src_facts = src.facts("src", BufferRole::Src);
    check_memcpy(guard, &dest_facts, dmax, &src_facts, slen)?;
    if slen == 0 {
        return Ok(());
    }
    let from = src.prefix(guard, MEMCPY_S, slen, &src_facts)?;
    let to = dest.into_prefix(guard, MEMCPY_S, slen, &dest_facts)?;
    to.copy_from_slice(from);
    Ok(())
}

/// Fill the first `n` bytes of `dest`, which holds `dmax` bytes, with `value`.
pub fn memset_s(
    guard: &ConstraintGuard,
    dest: BufferMut<'_>,
    dmax: usize,
    value: u8,
    n: usize,
) -> Guarded<()> {
    let facts = dest.facts("dest", BufferRole::Dest);
    check_memset(guard, &facts, dmax, n)?;
    dest.into_prefix(guard, MEMSET_S, n, &facts)?.fill(value);
    Ok(())
}

/// Compare the first `slen` bytes of `dest` and `src`.
///
/// `Ok(diff)` is zero when equal, otherwise the difference of the first
/// mismatching bytes (`dest[i] - src[i]`). This is an ordinary early-exit
/// comparison; use [`timingsafe_memcmp`](super::timingsafe::timingsafe_memcmp)
/// for secrets.
pub fn memcmp_s(
    guard: &ConstraintGuard,
    dest: Buffer<'_>,
    dmax: usize,
    src: Buffer<'_>,
    slen: usize,
) -> Guarded<i32> {
    let dest_facts = dest.facts("dest", BufferRole::Dest);
    let src_facts = src.facts("src", BufferRole::Src);
    check_memcmp(guard, &dest_facts, dmax, &src_facts, slen)?;
    let a = dest.prefix(guard, MEMCMP_S, slen, &dest_facts)?;
    let b = src.prefix(guard, MEMCMP_S, slen, &src_facts)?;
    Ok(first_difference(a, b))
}

/// `a[i] - b[i]` at the first mismatch, or 0.
#[must_use]
pub fn first_difference(a: &[u8], b: &[u8]) -> i32 {
    a.iter()
        .zip(b)
        .find(|(x, y)| x != y)
        .map_or(0, |(&x, &y)| i32::from(x) - i32::from(y))
}
