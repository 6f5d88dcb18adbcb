//! Built-in contract cases for every guarded function.

use boundlibc_core::stdio::{Arg, PrintfError, fprintf_s, snprintf_s, sprintf_s};
use boundlibc_core::string::mem_s::{memcmp_s, memcpy_s, memset_s};
use boundlibc_core::string::timingsafe::{
    timingsafe_bcmp, timingsafe_bcmp_chk, timingsafe_memcmp, timingsafe_memcmp_chk,
};
use boundlibc_core::{Buffer, BufferMut};
use boundlibc_membrane::{ConstraintViolation, Guarded, HandlerFamily, ViolationKind};

use crate::contract::{Adapter, ContractCase, ContractClause, ContractSuite};

use ContractClause::{BoundOverflow, DirectiveInjection, NullArgument, Nominal};
use ViolationKind::{InvalidArgument, LengthExceedsBound, NoSpace, ZeroLength};

fn some(bytes: &[u8]) -> Option<&[u8]> {
    Some(bytes)
}

fn int(v: Guarded<i32>) -> Guarded<i64> {
    v.map(i64::from)
}

fn len(v: Guarded<usize>) -> Guarded<i64> {
    v.map(|n| i64::try_from(n).unwrap_or(i64::MAX))
}

// Output streams in the catalog are in-memory, so only contract failures remain.
fn streamed(v: Result<usize, PrintfError>, scratch: &mut [u8], out: &[u8]) -> Guarded<i64> {
    match v {
        Ok(n) => {
            for (slot, byte) in scratch.iter_mut().zip(out) {
                *slot = *byte;
            }
            len(Ok(n))
        }
        Err(PrintfError::Constraint(v)) => Err(v),
        Err(PrintfError::Io(err)) => Err(ConstraintViolation::new(
            "fprintf_s",
            InvalidArgument,
            err.to_string(),
        )),
    }
}

fn timingsafe_cases(suite: &mut ContractSuite) {
    const F: &str = "timingsafe_bcmp";
    suite
        .add(
            ContractCase::new("bcmp-null-b1", F, NullArgument, |g, _| {
                int(timingsafe_bcmp(g, None, some(b"x"), 1))
            })
            .violates(ViolationKind::NullArgument),
        )
        .add(
            ContractCase::new("bcmp-null-b2", F, NullArgument, |g, _| {
                int(timingsafe_bcmp(g, some(b"x"), None, 1))
            })
            .violates(ViolationKind::NullArgument),
        )
        .add(
            ContractCase::new("bcmp-n-over-b1", F, BoundOverflow, |g, _| {
                let data = [0u8; 8];
                int(timingsafe_bcmp_chk(
                    g,
                    Buffer::with_capacity(&data, 4),
                    Buffer::new(&data),
                    5,
                ))
            })
            .violates(LengthExceedsBound),
        )
        .add(
            ContractCase::new("bcmp-n-over-ceiling", F, BoundOverflow, |g, s| {
                int(timingsafe_bcmp(g, some(s), some(s), s.len()))
            })
            .scratch(&[0u8; 1025])
            .violates(LengthExceedsBound),
        )
        .add(
            ContractCase::new("bcmp-equal", F, Nominal, |g, _| {
                int(timingsafe_bcmp(g, some(b"abc"), some(b"abc"), 3))
            })
            .returns(0),
        )
        .add(
            ContractCase::new("bcmp-differ", F, Nominal, |g, _| {
                int(timingsafe_bcmp(g, some(b"abc"), some(b"abd"), 3))
            })
            .returns(1),
        )
        .add(
            ContractCase::new("bcmp-zero-length", F, Nominal, |g, _| {
                int(timingsafe_bcmp(g, some(b"a"), some(b"b"), 0))
            })
            .returns(0),
        );

    const M: &str = "timingsafe_memcmp";
    suite
        .add(
            ContractCase::new("memcmp-null-b1", M, NullArgument, |g, _| {
                int(timingsafe_memcmp(g, None, some(b"x"), 1))
            })
            .violates(ViolationKind::NullArgument),
        )
        .add(
            ContractCase::new("memcmp-n-over-b2", M, BoundOverflow, |g, _| {
                let data = [0u8; 8];
                int(timingsafe_memcmp_chk(
                    g,
                    Buffer::new(&data),
                    Buffer::with_capacity(&data, 2),
                    3,
                ))
            })
            .violates(LengthExceedsBound),
        )
        .add(
            ContractCase::new("memcmp-less", M, Nominal, |g, _| {
                int(timingsafe_memcmp(g, some(b"az"), some(b"ba"), 2))
            })
            .returns(-1),
        )
        .add(
            ContractCase::new("memcmp-greater", M, Nominal, |g, _| {
                int(timingsafe_memcmp(g, some(b"b"), some(b"a"), 1))
            })
            .returns(1),
        );
}

fn memory_cases(suite: &mut ContractSuite) {
    const CPY: &str = "memcpy_s";
    suite
        .add(
            ContractCase::new("memcpy-null-dest", CPY, NullArgument, |g, _| {
                memcpy_s(g, BufferMut::null(), 4, Buffer::new(b"abcd"), 4).map(|()| 0)
            })
            .violates(ViolationKind::NullArgument),
        )
        .add(
            ContractCase::new("memcpy-null-src", CPY, NullArgument, |g, s| {
                memcpy_s(g, BufferMut::new(s), 4, Buffer::null(), 4).map(|()| 0)
            })
            .scratch(b"----")
            .violates(ViolationKind::NullArgument),
        )
        .add(
            ContractCase::new("memcpy-dmax-zero", CPY, BoundOverflow, |g, s| {
                memcpy_s(g, BufferMut::new(s), 0, Buffer::new(b"a"), 1).map(|()| 0)
            })
            .scratch(b"----")
            .violates(ZeroLength),
        )
        .add(
            ContractCase::new("memcpy-dmax-over-dest", CPY, BoundOverflow, |g, s| {
                memcpy_s(g, BufferMut::new(s), 5, Buffer::new(b"abcde"), 5).map(|()| 0)
            })
            .scratch(b"----")
            .violates(LengthExceedsBound),
        )
        .add(
            ContractCase::new("memcpy-slen-over-dmax", CPY, BoundOverflow, |g, s| {
                memcpy_s(g, BufferMut::new(s), 2, Buffer::new(b"abc"), 3).map(|()| 0)
            })
            .scratch(b"----")
            .violates(NoSpace),
        )
        .add(
            ContractCase::new("memcpy-copies", CPY, Nominal, |g, s| {
                memcpy_s(g, BufferMut::new(s), 4, Buffer::new(b"ab"), 2).map(|()| 0)
            })
            .scratch(b"----")
            .returns(0)
            .leaves(b"ab--"),
        );

    const SET: &str = "memset_s";
    suite
        .add(
            ContractCase::new("memset-null-dest", SET, NullArgument, |g, _| {
                memset_s(g, BufferMut::null(), 4, b'x', 1).map(|()| 0)
            })
            .violates(ViolationKind::NullArgument),
        )
        .add(
            ContractCase::new("memset-n-over-dmax", SET, BoundOverflow, |g, s| {
                memset_s(g, BufferMut::new(s), 2, b'x', 3).map(|()| 0)
            })
            .scratch(b"----")
            .violates(NoSpace),
        )
        .add(
            ContractCase::new("memset-fills", SET, Nominal, |g, s| {
                memset_s(g, BufferMut::new(s), 4, b'x', 3).map(|()| 0)
            })
            .scratch(b"----")
            .returns(0)
            .leaves(b"xxx-"),
        );

    const CMP: &str = "memcmp_s";
    suite
        .add(
            ContractCase::new("memcmp_s-null-src", CMP, NullArgument, |g, _| {
                int(memcmp_s(g, Buffer::new(b"abc"), 3, Buffer::null(), 3))
            })
            .violates(ViolationKind::NullArgument),
        )
        .add(
            ContractCase::new("memcmp_s-slen-over-dmax", CMP, BoundOverflow, |g, _| {
                int(memcmp_s(g, Buffer::new(b"abc"), 2, Buffer::new(b"abc"), 3))
            })
            .violates(NoSpace),
        )
        .add(
            ContractCase::new("memcmp_s-diff", CMP, Nominal, |g, _| {
                int(memcmp_s(g, Buffer::new(b"abc"), 3, Buffer::new(b"abe"), 3))
            })
            .returns(-2),
        );
}

fn str_case(
    id: &str,
    function: &'static str,
    clause: ContractClause,
    adapter: Adapter,
) -> ContractCase {
    ContractCase::new(id, function, clause, adapter)
        .family(HandlerFamily::Str)
        .ceiling(256)
}

fn printf_cases(suite: &mut ContractSuite) {
    const SPR: &str = "sprintf_s";
    suite
        .add(
            str_case("sprintf-null-fmt", SPR, NullArgument, |g, s| {
                len(sprintf_s(g, BufferMut::new(s), 8, None, &[]))
            })
            .scratch(&[0x5A; 8])
            .violates(ViolationKind::NullArgument),
        )
        .add(
            str_case("sprintf-null-string-arg", SPR, NullArgument, |g, s| {
                len(sprintf_s(g, BufferMut::new(s), 8, some(b"%s"), &[Arg::Str(None)]))
            })
            .scratch(&[0x5A; 8])
            .violates(ViolationKind::NullArgument),
        )
        .add(
            str_case("sprintf-n-in-fmt", SPR, DirectiveInjection, |g, s| {
                len(sprintf_s(g, BufferMut::new(s), 8, some(b"%s%n\n"), &[Arg::from("x")]))
            })
            .scratch(&[0x5A; 8])
            .violates(InvalidArgument),
        )
        .add(
            str_case("sprintf-n-in-data", SPR, DirectiveInjection, |g, s| {
                len(sprintf_s(g, BufferMut::new(s), 8, some(b"%s"), &[Arg::from("AAAA%n")]))
            })
            .scratch(&[0x5A; 8])
            .violates(InvalidArgument),
        )
        .add(
            str_case("sprintf-output-over-dmax", SPR, BoundOverflow, |g, s| {
                len(sprintf_s(g, BufferMut::new(s), 4, some(b"%d"), &[Arg::Int(12345)]))
            })
            .scratch(&[0x5A; 8])
            .violates(NoSpace),
        )
        .add(
            str_case("sprintf-escaped-percent", SPR, Nominal, |g, s| {
                len(sprintf_s(g, BufferMut::new(s), 8, some(b"%s%%n\n"), &[Arg::from("")]))
            })
            .scratch(&[0x5A; 6])
            .returns(3)
            .leaves(b"%n\n\0\x5A\x5A"),
        )
        .add(
            str_case("sprintf-two-strings", SPR, Nominal, |g, s| {
                let args = [Arg::from("12"), Arg::from("34")];
                len(sprintf_s(g, BufferMut::new(s), 8, some(b"%ls%s"), &args))
            })
            .scratch(&[0x5A; 6])
            .returns(4)
            .leaves(b"1234\0\x5A"),
        );

    const SNPR: &str = "snprintf_s";
    suite
        .add(
            str_case("snprintf-n-in-data", SNPR, DirectiveInjection, |g, s| {
                len(snprintf_s(g, BufferMut::new(s), 4, some(b"%s"), &[Arg::from("%n")]))
            })
            .scratch(&[0x5A; 4])
            .violates(InvalidArgument),
        )
        .add(
            str_case("snprintf-truncates", SNPR, Nominal, |g, s| {
                len(snprintf_s(g, BufferMut::new(s), 3, some(b"%d"), &[Arg::Int(12345)]))
            })
            .scratch(&[0x5A; 4])
            .returns(5)
            .leaves(b"12\0\x5A"),
        );

    const FPR: &str = "fprintf_s";
    suite
        .add(
            str_case("fprintf-null-stream", FPR, NullArgument, |g, s| {
                streamed(fprintf_s::<Vec<u8>>(g, None, some(b"x"), &[]), s, &[])
            })
            .violates(ViolationKind::NullArgument),
        )
        .add(
            str_case("fprintf-n-in-data", FPR, DirectiveInjection, |g, s| {
                let mut out = Vec::new();
                let v = fprintf_s(g, Some(&mut out), some(b"[%s]"), &[Arg::from("%5$n")]);
                streamed(v, s, &out)
            })
            .scratch(&[0x5A; 4])
            .violates(InvalidArgument),
        )
        .add(
            str_case("fprintf-writes", FPR, Nominal, |g, s| {
                let mut out = Vec::new();
                let v = fprintf_s(g, Some(&mut out), some(b"%03d|%-3s|"), &[
                    Arg::Int(7),
                    Arg::from("ab"),
                ]);
                streamed(v, s, &out)
            })
            .scratch(&[0; 8])
            .returns(8)
            .leaves(b"007|ab |"),
        );
}

/// Every built-in case, grouped per guarded function.
#[must_use]
pub fn builtin_suite() -> ContractSuite {
    let mut suite = ContractSuite::new();
    timingsafe_cases(&mut suite);
    memory_cases(&mut suite);
    printf_cases(&mut suite);
    suite
}
