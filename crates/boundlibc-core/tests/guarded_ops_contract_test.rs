//! Black-box contract checks for the guarded operations: null handling,
//! bound overflow, embedded write directives and the nominal path, judged
//! only by outcome and buffer state.

use std::sync::Arc;

use boundlibc_core::stdio::{Arg, snprintf_s, sprintf_s};
use boundlibc_core::string::mem_s::{memcmp_s, memcpy_s, memset_s};
use boundlibc_core::string::timingsafe::{
    bcmp_kernel, memcmp_kernel, timingsafe_bcmp, timingsafe_bcmp_chk, timingsafe_memcmp,
};
use boundlibc_core::{Buffer, BufferMut};
use boundlibc_membrane::{
    ConstraintGuard, HandlerFamily, RecordingHandler, ViolationKind, errno,
};

fn mem_guard() -> (ConstraintGuard, Arc<RecordingHandler>) {
    let rec = Arc::new(RecordingHandler::new());
    (
        ConstraintGuard::with_handler(HandlerFamily::Mem, rec.clone()).ceiling_of(1024),
        rec,
    )
}

fn str_guard() -> (ConstraintGuard, Arc<RecordingHandler>) {
    let rec = Arc::new(RecordingHandler::new());
    (
        ConstraintGuard::with_handler(HandlerFamily::Str, rec.clone()).ceiling_of(256),
        rec,
    )
}

fn some(bytes: &[u8]) -> Option<&[u8]> {
    Some(bytes)
}

#[test]
fn equality_matches_bytewise_identity() {
    let (guard, _) = mem_guard();
    let samples: [&[u8]; 5] = [b"", b"a", b"abc", b"abd", b"\x00\xff\x10"];
    for a in samples {
        for b in samples {
            if a.len() != b.len() {
                continue;
            }
            let got = timingsafe_bcmp(&guard, some(a), some(b), a.len()).unwrap();
            assert_eq!(got == 0, a == b, "{a:?} vs {b:?}");
            let ord = timingsafe_memcmp(&guard, some(a), some(b), a.len()).unwrap();
            assert_eq!(ord, a.cmp(b) as i32, "{a:?} vs {b:?}");
        }
    }
}

#[test]
fn equal_and_differing_inputs_take_identical_steps() {
    let (guard, _) = mem_guard();
    let eq = timingsafe_bcmp(&guard, some(b"abc"), some(b"abc"), 3);
    let after_eq = guard.metrics().snapshot().bytes_compared;
    let ne = timingsafe_bcmp(&guard, some(b"abc"), some(b"abd"), 3);
    let after_ne = guard.metrics().snapshot().bytes_compared;

    assert_eq!(eq, Ok(0));
    assert_eq!(ne, Ok(1));
    assert_eq!(after_eq, 3);
    assert_eq!(after_ne - after_eq, 3);

    let secret = [0x42u8; 256];
    let expected = bcmp_kernel(&secret, &secret).1;
    for pos in [0, 1, 127, 255] {
        let mut guess = secret;
        guess[pos] = 0;
        assert_eq!(bcmp_kernel(&secret, &guess).1, expected);
        assert_eq!(memcmp_kernel(&secret, &guess).1, expected);
    }
}

#[test]
fn zero_length_compares_equal_without_reads() {
    let (guard, rec) = mem_guard();
    assert_eq!(timingsafe_bcmp(&guard, some(b"x"), some(b"y"), 0), Ok(0));
    assert_eq!(guard.metrics().snapshot().bytes_compared, 0);
    assert_eq!(rec.count(), 0);
}

#[test]
fn over_capacity_is_length_violation_with_no_reads() {
    let (guard, rec) = mem_guard();
    let data = [7u8; 16];
    let err =
        timingsafe_bcmp_chk(&guard, Buffer::with_capacity(&data, 8), Buffer::new(&data), 9)
            .unwrap_err();
    assert_eq!(err.negative_code(), -errno::ESLEMAX);
    assert_eq!(guard.metrics().snapshot().bytes_compared, 0);
    assert_eq!(rec.count(), 1);
}

#[test]
fn unknown_capacity_over_ceiling_is_length_violation() {
    let (guard, _) = mem_guard();
    let data = vec![0u8; 2048];
    let err = timingsafe_bcmp(&guard, some(&data), some(&data), 1025).unwrap_err();
    assert_eq!(err.kind, ViolationKind::LengthExceedsBound);
    assert_eq!(err.reason, "n exceeds max");
}

#[test]
fn null_buffers_invoke_handler_exactly_once() {
    let (guard, rec) = mem_guard();
    for (a, b) in [(None, some(b"x")), (some(b"x"), None), (None, None)] {
        let err = timingsafe_bcmp(&guard, a, b, 1).unwrap_err();
        assert_eq!(err.negative_code(), -errno::ESNULLP);
    }
    assert_eq!(rec.count(), 3);
}

#[test]
fn embedded_write_directive_rejected_and_dest_untouched() {
    let (guard, rec) = str_guard();
    let mut dest = [0x5Au8; 32];
    let payload = Arg::from("AAAA%n");
    let err = sprintf_s(&guard, BufferMut::new(&mut dest), 32, some(b"%s"), &[payload])
        .unwrap_err();
    assert_eq!(err.kind, ViolationKind::InvalidArgument);
    assert_eq!(err.code(), errno::EINVAL);
    assert_eq!(dest, [0x5A; 32]);
    assert_eq!(rec.count(), 1);
}

#[test]
fn formatted_write_scenarios() {
    let (guard, _) = str_guard();
    let mut dest = [0u8; 32];

    let err = sprintf_s(&guard, BufferMut::new(&mut dest), 32, some(b"%s%n\n"), &[Arg::from("x")]);
    assert_eq!(err.map_err(|v| v.code()), Err(errno::EINVAL));

    let n = sprintf_s(&guard, BufferMut::new(&mut dest), 32, some(b"%s%%n\n"), &[Arg::from("")]);
    assert_eq!(n, Ok(3));
    let n = sprintf_s(&guard, BufferMut::new(&mut dest), 32, some(b"%%n\n"), &[]);
    assert_eq!(n, Ok(3));
    let n = sprintf_s(
        &guard,
        BufferMut::new(&mut dest),
        32,
        some(b"%ls%s"),
        &[Arg::from("12"), Arg::from("34")],
    );
    assert_eq!(n, Ok(4));
    assert_eq!(&dest[..5], b"1234\0");

    let n = snprintf_s(&guard, BufferMut::new(&mut dest), 3, some(b"%d"), &[Arg::Int(12345)]);
    assert_eq!(n, Ok(5));
    assert_eq!(&dest[..3], b"12\0");
}

#[test]
fn memory_functions_follow_the_same_conventions() {
    let (guard, rec) = mem_guard();
    let mut dest = [0u8; 8];

    memcpy_s(&guard, BufferMut::new(&mut dest), 8, Buffer::new(b"abcdefgh"), 8).unwrap();
    assert_eq!(&dest, b"abcdefgh");
    assert_eq!(
        memcmp_s(&guard, Buffer::new(&dest), 8, Buffer::new(b"abcdefgh"), 8),
        Ok(0)
    );

    let err = memset_s(&guard, BufferMut::new(&mut dest), 8, 0, 9).unwrap_err();
    assert_eq!(err.code(), errno::ESNOSPC);
    assert_eq!(&dest, b"abcdefgh");

    let err = memcpy_s(&guard, BufferMut::with_capacity(&mut dest, 4), 8, Buffer::new(b"z"), 1)
        .unwrap_err();
    assert_eq!(err.code(), errno::ESLEMAX);
    assert_eq!(rec.count(), 2);
}

#[test]
fn repeated_calls_are_idempotent() {
    let (guard, _) = mem_guard();
    let first = timingsafe_bcmp(&guard, some(b"token"), some(b"tokem"), 5);
    for _ in 0..32 {
        assert_eq!(timingsafe_bcmp(&guard, some(b"token"), some(b"tokem"), 5), first);
    }
    let bad = timingsafe_bcmp(&guard, None, some(b"x"), 1);
    for _ in 0..32 {
        assert_eq!(timingsafe_bcmp(&guard, None, some(b"x"), 1), bad);
    }
}
