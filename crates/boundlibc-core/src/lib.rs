//! # boundlibc-core
//!
//! Guarded operations over byte slices. Every entry point validates its
//! buffers through a [`ConstraintGuard`](boundlibc_membrane::ConstraintGuard)
//! before the operation body runs, and reports violations through the
//! guard's handler. No `unsafe` code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod buffer;
pub mod stdio;
pub mod string;

pub use buffer::{Buffer, BufferMut};
