#![no_main]
use std::sync::Arc;

use boundlibc_core::BufferMut;
use boundlibc_core::stdio::{Arg, snprintf_s, sprintf_s};
use boundlibc_membrane::handler::IgnoreHandler;
use boundlibc_membrane::{ConstraintGuard, HandlerFamily};
use libfuzzer_sys::fuzz_target;

// Layout: [dmax, format bytes..., 0, string argument bytes...].
fuzz_target!(|data: &[u8]| {
    let Some((&dmax, rest)) = data.split_first() else {
        return;
    };
    let (fmt, text) = match rest.iter().position(|&b| b == 0) {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, &[][..]),
    };
    let dmax = usize::from(dmax);
    let args = [
        Arg::Str(Some(text)),
        Arg::Int(-42),
        Arg::Uint(7),
        Arg::Float(1.5),
        Arg::Char(b'z'),
        Arg::Str(Some(text)),
    ];
    let guard =
        ConstraintGuard::with_handler(HandlerFamily::Str, Arc::new(IgnoreHandler)).ceiling_of(256);

    let mut dest = [0xEEu8; 256];
    match sprintf_s(&guard, BufferMut::new(&mut dest), dmax, Some(fmt), &args) {
        Ok(len) => {
            assert!(len < dmax);
            assert_eq!(dest[len], 0);
        }
        Err(_) => assert!(dest.iter().all(|&b| b == 0xEE)),
    }

    let mut dest = [0xEEu8; 256];
    match snprintf_s(&guard, BufferMut::new(&mut dest), dmax, Some(fmt), &args) {
        Ok(total) => {
            let kept = total.min(dmax - 1);
            assert_eq!(dest[kept], 0);
        }
        Err(_) => assert!(dest.iter().all(|&b| b == 0xEE)),
    }
});
