//! Formatted output.
//!
//! A byte-oriented printf engine and the guarded `sprintf_s` family built
//! on it.

pub mod printf;
pub mod printf_s;

pub use printf::Arg;
pub use printf_s::{PrintfError, fprintf_s, printf_s, snprintf_s, sprintf_s};
