//! Constraint error codes and the violation record.
//!
//! Guarded operations return `Result<T, ConstraintViolation>`. The numeric
//! `errno_t` values below only matter at the C compatibility boundary; Rust
//! callers branch on [`ViolationKind`].

use std::fmt;

/// Success.
pub const EOK: i32 = 0;
/// Invalid argument (dangerous or malformed directive, bad argument list).
pub const EINVAL: i32 = 22;
/// Required pointer is null.
pub const ESNULLP: i32 = 400;
/// Length is zero where a non-zero length is required.
pub const ESZEROL: i32 = 401;
/// Length exceeds a known capacity or the global ceiling.
pub const ESLEMAX: i32 = 403;
/// Source and destination overlap.
pub const ESOVRLP: i32 = 404;
/// Not enough space in the destination.
pub const ESNOSPC: i32 = 406;

/// Named class of a precondition breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ViolationKind {
    #[error("null pointer argument")]
    NullArgument,
    #[error("zero length")]
    ZeroLength,
    #[error("length exceeds bound")]
    LengthExceedsBound,
    #[error("overlapping regions")]
    Overlap,
    #[error("insufficient destination space")]
    NoSpace,
    #[error("invalid argument")]
    InvalidArgument,
}

impl ViolationKind {
    /// Every kind, in code order.
    pub const ALL: [Self; 6] = [
        Self::InvalidArgument,
        Self::NullArgument,
        Self::ZeroLength,
        Self::LengthExceedsBound,
        Self::Overlap,
        Self::NoSpace,
    ];

    /// Positive `errno_t` for this kind.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::NullArgument => ESNULLP,
            Self::ZeroLength => ESZEROL,
            Self::LengthExceedsBound => ESLEMAX,
            Self::Overlap => ESOVRLP,
            Self::NoSpace => ESNOSPC,
            Self::InvalidArgument => EINVAL,
        }
    }

    /// Symbolic name of the code (`ESNULLP`, `ESLEMAX`, ...).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NullArgument => "ESNULLP",
            Self::ZeroLength => "ESZEROL",
            Self::LengthExceedsBound => "ESLEMAX",
            Self::Overlap => "ESOVRLP",
            Self::NoSpace => "ESNOSPC",
            Self::InvalidArgument => "EINVAL",
        }
    }

    /// Inverse of [`code`](Self::code). Accepts the negated form as well.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        let code = code.checked_abs()?;
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

/// Which side of an operation a buffer sits on.
///
/// Destination checks always run before source checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Dest,
    Src,
    /// Control (format) input of a formatted write.
    Format,
    /// Data argument of a formatted write, by position.
    Argument(usize),
    /// Out-parameter that receives a result, such as `memcmp_s`'s `diff`.
    Result,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dest => f.write_str("dest"),
            Self::Src => f.write_str("src"),
            Self::Format => f.write_str("format"),
            Self::Argument(idx) => write!(f, "argument {idx}"),
            Self::Result => f.write_str("result"),
        }
    }
}

/// A detected precondition breach.
///
/// Carries everything a handler needs to report the event: the operation,
/// a human-readable reason, the offending buffer and the named kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{op}: {reason}")]
pub struct ConstraintViolation {
    pub op: &'static str,
    pub reason: String,
    pub kind: ViolationKind,
    pub role: Option<BufferRole>,
    /// Address of the offending buffer, 0 when null or not applicable.
    pub addr: usize,
}

impl ConstraintViolation {
    #[must_use]
    pub fn new(op: &'static str, kind: ViolationKind, reason: impl Into<String>) -> Self {
        Self {
            op,
            reason: reason.into(),
            kind,
            role: None,
            addr: 0,
        }
    }

    /// Attach the offending buffer.
    #[must_use]
    pub fn at(mut self, role: BufferRole, addr: usize) -> Self {
        self.role = Some(role);
        self.addr = addr;
        self
    }

    /// Positive `errno_t`.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.kind.code()
    }

    /// Negated `errno_t`, as returned by the comparison family.
    #[must_use]
    pub const fn negative_code(&self) -> i32 {
        -self.kind.code()
    }
}

/// Outcome of a guarded operation.
pub type Guarded<T> = Result<T, ConstraintViolation>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_compat_values() {
        assert_eq!(ViolationKind::NullArgument.code(), 400);
        assert_eq!(ViolationKind::LengthExceedsBound.code(), 403);
        assert_eq!(ViolationKind::InvalidArgument.code(), 22);
    }

    #[test]
    fn from_code_accepts_both_signs() {
        for kind in ViolationKind::ALL {
            assert_eq!(ViolationKind::from_code(kind.code()), Some(kind));
            assert_eq!(ViolationKind::from_code(-kind.code()), Some(kind));
        }
        assert_eq!(ViolationKind::from_code(0), None);
        assert_eq!(ViolationKind::from_code(i32::MIN), None);
    }

    #[test]
    fn violation_display_is_op_prefixed() {
        let v = ConstraintViolation::new(
            "timingsafe_bcmp",
            ViolationKind::LengthExceedsBound,
            "n exceeds b1",
        )
        .at(BufferRole::Dest, 0x1000);
        assert_eq!(v.to_string(), "timingsafe_bcmp: n exceeds b1");
        assert_eq!(v.negative_code(), -ESLEMAX);
        assert_eq!(v.role, Some(BufferRole::Dest));
    }

    #[test]
    fn role_display() {
        assert_eq!(BufferRole::Argument(2).to_string(), "argument 2");
        assert_eq!(BufferRole::Format.to_string(), "format");
        assert_eq!(BufferRole::Result.to_string(), "result");
    }
}
