// All extern "C" entry points accept raw pointers from C callers; the guard
// validates at runtime, so per-function safety docs would be boilerplate.
#![allow(clippy::missing_safety_doc)]
//! # boundlibc-abi
//!
//! `extern "C"` boundary for boundlibc.
//!
//! This crate produces a `cdylib` exposing the bounds-checked functions
//! under their C names. Every entry point turns its raw pointers and
//! "bound of size" arguments into buffer facts, runs the same contract
//! checks as the safe API in `boundlibc-core`, and only then forms slices
//! and calls the safe kernels.
//!
//! ```text
//! C caller -> ABI entry (this crate) -> contract checks -> core kernel -> errno_t
//! ```
//!
//! Return conventions follow the `_s` family: comparison functions return
//! the negated code on a violation, memory functions return `errno_t`.
//! Formatted output has no C entry point here because C variadics cannot
//! be defined on stable Rust; use the `boundlibc-core` API instead.

pub mod config_abi;
pub mod handler_abi;
pub mod string_abi;

mod guard_state;

use std::ffi::c_int;

use boundlibc_membrane::{BufferFacts, BufferRole};

/// `errno_t` of the `_s` family.
#[allow(non_camel_case_types)]
pub type errno_t = c_int;

/// `rsize_t` of the `_s` family.
#[allow(non_camel_case_types)]
pub type rsize_t = libc::size_t;

/// "Bound of size" meaning the caller does not know the buffer's capacity.
pub const BOS_UNKNOWN: usize = usize::MAX;

/// Map a C bound-of-size argument to a capacity.
#[inline]
#[must_use]
pub const fn capacity_of(bos: usize) -> Option<usize> {
    if bos == BOS_UNKNOWN { None } else { Some(bos) }
}

/// Buffer facts for a raw C pointer. No extent is known at this boundary.
#[inline]
pub(crate) fn raw_facts<T>(
    param: &'static str,
    role: BufferRole,
    ptr: *const T,
    bos: usize,
) -> BufferFacts {
    let addr = (!ptr.is_null()).then_some(ptr as usize);
    BufferFacts::new(param, role, addr).with_capacity(capacity_of(bos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bos_unknown_maps_to_none() {
        assert_eq!(capacity_of(BOS_UNKNOWN), None);
        assert_eq!(capacity_of(0), Some(0));
        assert_eq!(capacity_of(16), Some(16));
    }

    #[test]
    fn raw_facts_from_pointers() {
        let byte = 7u8;
        let facts = raw_facts("b1", BufferRole::Dest, &byte as *const u8, 4);
        assert_eq!(facts.addr, Some(&byte as *const u8 as usize));
        assert_eq!(facts.capacity, Some(4));
        assert_eq!(facts.extent, None);

        let null = raw_facts("b2", BufferRole::Src, std::ptr::null::<u8>(), BOS_UNKNOWN);
        assert!(null.is_null());
        assert_eq!(null.capacity, None);
    }
}
