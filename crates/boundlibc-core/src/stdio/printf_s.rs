//! Guarded formatted output: `sprintf_s`, `snprintf_s`, `fprintf_s`, `printf_s`.
//!
//! Validation order: destination (presence, `dmax`, capacity), then the
//! control string, then each argument as it is consumed. Output is rendered
//! into scratch space first and reaches the destination only when the whole
//! call succeeds; a failed call never writes a byte.
//!
//! Truncation by `snprintf_s` is a normal outcome and is not reported to the
//! handler.

use std::io::{self, Write};

use boundlibc_membrane::{
    BufferFacts, BufferRole, ConstraintGuard, ConstraintViolation, Guarded, ViolationKind,
};

use super::printf::{Arg, RenderError, Sink, render};
use crate::buffer::BufferMut;

pub const SPRINTF_S: &str = "sprintf_s";
pub const SNPRINTF_S: &str = "snprintf_s";
pub const FPRINTF_S: &str = "fprintf_s";
pub const PRINTF_S: &str = "printf_s";

/// Failure of a stream write.
#[derive(Debug, thiserror::Error)]
pub enum PrintfError {
    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),
    #[error("write failed: {0}")]
    Io(#[from] io::Error),
}

impl PrintfError {
    #[must_use]
    pub fn violation(&self) -> Option<&ConstraintViolation> {
        match self {
            Self::Constraint(v) => Some(v),
            Self::Io(_) => None,
        }
    }
}

/// Presence, `dmax != 0` and `dmax` within the destination.
pub fn check_dest(
    guard: &ConstraintGuard,
    op: &'static str,
    dest: &BufferFacts,
    dmax: usize,
) -> Guarded<()> {
    guard.require_present(op, dest)?;
    guard.check_nonzero(op, "dmax", dmax, dest)?;
    guard.check_len(op, "dmax", dmax, dest)
}

fn require_format<'f>(
    guard: &ConstraintGuard,
    op: &'static str,
    fmt: Option<&'f [u8]>,
) -> Guarded<&'f [u8]> {
    match fmt {
        Some(fmt) => Ok(fmt),
        None => guard.fail(
            ConstraintViolation::new(op, ViolationKind::NullArgument, "fmt is null")
                .at(BufferRole::Format, 0),
        ),
    }
}

fn render_guarded(
    guard: &ConstraintGuard,
    op: &'static str,
    fmt: &[u8],
    args: &[Arg<'_>],
    limit: usize,
) -> Guarded<Sink> {
    let mut out = Sink::bounded(limit);
    match render(fmt, args, &mut out) {
        Ok(()) => Ok(out),
        Err(err) => guard.fail(violation_of(op, &err, fmt, args)),
    }
}

fn violation_of(
    op: &'static str,
    err: &RenderError,
    fmt: &[u8],
    args: &[Arg<'_>],
) -> ConstraintViolation {
    let role = err.role();
    let addr = match role {
        BufferRole::Format => fmt.as_ptr() as usize,
        BufferRole::Argument(index) => match args.get(index.saturating_sub(1)) {
            Some(Arg::Str(Some(s))) => s.as_ptr() as usize,
            _ => 0,
        },
        _ => 0,
    };
    ConstraintViolation::new(op, err.kind(), err.to_string()).at(role, addr)
}

/// Format into `dest`, which holds `dmax` bytes, and NUL-terminate.
///
/// Returns the number of bytes written, excluding the terminator. Output
/// that does not fit with its terminator is a `NoSpace` violation.
pub fn sprintf_s(
    guard: &ConstraintGuard,
    dest: BufferMut<'_>,
    dmax: usize,
    fmt: Option<&[u8]>,
    args: &[Arg<'_>],
) -> Guarded<usize> {
    let facts = dest.facts("dest", BufferRole::Dest);
    check_dest(guard, SPRINTF_S, &facts, dmax)?;
    let fmt = require_format(guard, SPRINTF_S, fmt)?;
    let out = render_guarded(guard, SPRINTF_S, fmt, args, dmax)?;
    let len = out.total();
    guard.check_room(SPRINTF_S, ("output", len.saturating_add(1)), ("dmax", dmax), &facts)?;

    let to = dest.into_prefix(guard, SPRINTF_S, len + 1, &facts)?;
    to[..len].copy_from_slice(out.as_bytes());
    to[len] = 0;
    Ok(len)
}

/// Format into `dest` with truncation.
///
/// Writes at most `dmax - 1` bytes plus a terminator and returns the length
/// the full output would have had, so `Ok(n)` with `n >= dmax` means the
/// output was truncated.
pub fn snprintf_s(
    guard: &ConstraintGuard,
    dest: BufferMut<'_>,
    dmax: usize,
    fmt: Option<&[u8]>,
    args: &[Arg<'_>],
) -> Guarded<usize> {
    let facts = dest.facts("dest", BufferRole::Dest);
    check_dest(guard, SNPRINTF_S, &facts, dmax)?;
    let fmt = require_format(guard, SNPRINTF_S, fmt)?;
    let out = render_guarded(guard, SNPRINTF_S, fmt, args, dmax - 1)?;
    let kept = out.as_bytes();

    let to = dest.into_prefix(guard, SNPRINTF_S, kept.len() + 1, &facts)?;
    to[..kept.len()].copy_from_slice(kept);
    to[kept.len()] = 0;
    Ok(out.total())
}

/// Format to `stream`. Returns the number of bytes written.
///
/// Nothing is written unless the whole output rendered. Output longer than
/// the guard's ceiling is a `LengthExceedsBound` violation.
pub fn fprintf_s<W: Write + ?Sized>(
    guard: &ConstraintGuard,
    stream: Option<&mut W>,
    fmt: Option<&[u8]>,
    args: &[Arg<'_>],
) -> Result<usize, PrintfError> {
    write_stream(guard, FPRINTF_S, stream, fmt, args)
}

/// Format to standard output.
pub fn printf_s(
    guard: &ConstraintGuard,
    fmt: Option<&[u8]>,
    args: &[Arg<'_>],
) -> Result<usize, PrintfError> {
    let mut stdout = io::stdout().lock();
    write_stream(guard, PRINTF_S, Some(&mut stdout), fmt, args)
}

fn write_stream<W: Write + ?Sized>(
    guard: &ConstraintGuard,
    op: &'static str,
    stream: Option<&mut W>,
    fmt: Option<&[u8]>,
    args: &[Arg<'_>],
) -> Result<usize, PrintfError> {
    let Some(stream) = stream else {
        let v = ConstraintViolation::new(op, ViolationKind::NullArgument, "stream is null")
            .at(BufferRole::Dest, 0);
        return Err(guard.report(v).into());
    };
    let fmt = require_format(guard, op, fmt)?;
    let out = render_guarded(guard, op, fmt, args, guard.ceiling())?;
    if out.truncated() {
        let kind = ViolationKind::LengthExceedsBound;
        let v = ConstraintViolation::new(op, kind, "output exceeds max").at(BufferRole::Dest, 0);
        return Err(guard.report(v).into());
    }
    stream.write_all(out.as_bytes())?;
    Ok(out.total())
}
