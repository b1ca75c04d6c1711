//! Random number generation utilities.
//!
//! Kept deliberately thin: the payment core only ever needs
//! cryptographically secure random bytes (Ed25519 keypair generation, DEKs,
//! IVs) and never needs a full PRNG algebra.

use rand_core::{CryptoRng, OsRng, RngCore};

/// A succinct trait alias for a cryptographically secure PRNG.
pub trait Crng: RngCore + CryptoRng {}
impl<R: RngCore + CryptoRng> Crng for R {}

/// Extension methods built on top of any [`Crng`].
pub trait RngExt: Crng {
    fn gen_bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut buf = [0u8; N];
        self.fill_bytes(&mut buf);
        buf
    }

    fn gen_u32(&mut self) -> u32 {
        self.next_u32()
    }

    fn gen_u64(&mut self) -> u64 {
        self.next_u64()
    }
}

impl<R: Crng> RngExt for R {}

/// The process-wide source of cryptographically secure randomness.
///
/// A thin newtype over [`OsRng`] so call sites depend on `pay_common::rng`
/// rather than reaching for `rand_core` directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct SysRng(OsRng);

impl SysRng {
    pub fn new() -> Self {
        Self(OsRng)
    }
}

impl CryptoRng for SysRng {}

impl RngCore for SysRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(
        &mut self,
        dest: &mut [u8],
    ) -> Result<(), rand_core::Error> {
        self.0.try_fill_bytes(dest)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gen_bytes_fills_the_whole_array() {
        let mut rng = SysRng::new();
        let a: [u8; 32] = rng.gen_bytes();
        let b: [u8; 32] = rng.gen_bytes();
        // Vanishingly unlikely to collide; catches an accidental all-zero fill.
        assert_ne!(a, b);
        assert_ne!(a, [0u8; 32]);
    }
}
