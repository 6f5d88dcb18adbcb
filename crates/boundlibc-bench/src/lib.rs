//! Shared inputs for the boundlibc benchmarks.

/// Sizes used by every size-swept group.
pub const SIZES: &[usize] = &[16, 64, 256, 1024, 4096];

/// A secret of `len` bytes and three guesses: equal, differing at the
/// first byte and differing at the last byte.
#[must_use]
pub fn secret_and_guesses(len: usize) -> (Vec<u8>, [(&'static str, Vec<u8>); 3]) {
    let secret: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_mul(31) ^ 0xA5).collect();
    let mut first = secret.clone();
    let mut last = secret.clone();
    if len > 0 {
        first[0] ^= 0xFF;
        last[len - 1] ^= 0xFF;
    }
    let guesses = [("equal", secret.clone()), ("first_byte", first), ("last_byte", last)];
    (secret, guesses)
}
