//! Memory operations and comparisons.
//!
//! Guarded `<string.h>` memory functions operating on slices.

pub mod mem_s;
pub mod timingsafe;

pub use mem_s::{memcmp_s, memcpy_s, memset_s};
pub use timingsafe::{timingsafe_bcmp, timingsafe_bcmp_chk, timingsafe_memcmp, timingsafe_memcmp_chk};
