#![no_main]
use std::sync::Arc;

use boundlibc_core::Buffer;
use boundlibc_core::string::timingsafe::{timingsafe_bcmp_chk, timingsafe_memcmp_chk};
use boundlibc_membrane::handler::IgnoreHandler;
use boundlibc_membrane::{ConstraintGuard, HandlerFamily};
use libfuzzer_sys::fuzz_target;

fn buffer(bytes: &[u8], cap: u8) -> Buffer<'_> {
    match cap {
        0xFF => Buffer::new(bytes),
        c => Buffer::with_capacity(bytes, usize::from(c)),
    }
}

// Layout: [n, cap1, cap2, split, bytes...]. cap 0xFF means undeclared.
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let (header, rest) = data.split_at(4);
    let split = usize::from(header[3]).min(rest.len());
    let (a, b) = rest.split_at(split);
    let n = usize::from(header[0]);

    let guard =
        ConstraintGuard::with_handler(HandlerFamily::Mem, Arc::new(IgnoreHandler)).ceiling_of(128);
    let eq = timingsafe_bcmp_chk(&guard, buffer(a, header[1]), buffer(b, header[2]), n);
    let ord = timingsafe_memcmp_chk(&guard, buffer(a, header[1]), buffer(b, header[2]), n);

    match (eq, ord) {
        (Ok(eq), Ok(ord)) => {
            let (a, b) = (&a[..n], &b[..n]);
            assert_eq!(eq == 0, a == b);
            assert_eq!(ord, a.cmp(b) as i32);
            assert_eq!(guard.metrics().snapshot().bytes_compared, 2 * n as u64);
        }
        (Err(x), Err(y)) => {
            assert_eq!(x.kind, y.kind);
            assert_eq!(guard.metrics().snapshot().bytes_compared, 0);
        }
        other => panic!("comparators disagree on validity: {other:?}"),
    }
});
