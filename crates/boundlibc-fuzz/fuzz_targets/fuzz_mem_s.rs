#![no_main]
use std::sync::Arc;

use boundlibc_core::string::mem_s::{memcmp_s, memcpy_s, memset_s};
use boundlibc_core::{Buffer, BufferMut};
use boundlibc_membrane::handler::IgnoreHandler;
use boundlibc_membrane::{ConstraintGuard, HandlerFamily};
use libfuzzer_sys::fuzz_target;

// Layout: [dmax, slen, value, src bytes...] against a 64-byte destination.
fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let (dmax, slen, value) = (usize::from(data[0]), usize::from(data[1]), data[2]);
    let src = &data[3..];
    let guard =
        ConstraintGuard::with_handler(HandlerFamily::Mem, Arc::new(IgnoreHandler)).ceiling_of(96);

    let original = [0x11u8; 64];
    let mut dest = original;
    match memcpy_s(&guard, BufferMut::new(&mut dest), dmax, Buffer::new(src), slen) {
        Ok(()) => {
            assert_eq!(&dest[..slen], &src[..slen]);
            assert_eq!(&dest[slen..], &original[slen..]);
            if slen > 0 {
                let diff = memcmp_s(&guard, Buffer::new(&dest), dmax, Buffer::new(src), slen);
                assert_eq!(diff, Ok(0));
            }
        }
        Err(_) => assert_eq!(dest, original),
    }

    let mut dest = original;
    match memset_s(&guard, BufferMut::new(&mut dest), dmax, value, slen) {
        Ok(()) => assert!(dest[..slen].iter().all(|&b| b == value)),
        Err(_) => assert_eq!(dest, original),
    }
});
