//! Deterministic seed derivation.
//!
//! Every pseudo-random choice in the engine flows through [`stable_unit`]:
//! a SHA-256 hash of a label string projected to `[0, 1)`. Using a pure
//! hash instead of a stateful RNG keeps world genesis and agent spawning
//! reproducible under event replay.

use sha2::{Digest, Sha256};

/// Project a seed string to a deterministic value in `[0, 1)`.
///
/// Takes the first 8 bytes of the seed's SHA-256 digest as a big-endian
/// integer, reduced modulo one million. The millionth-resolution grain is
/// plenty for tile attributes and spawn offsets.
pub fn stable_unit(seed: &str) -> f64 {
    let digest = Sha256::digest(seed.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let n = u64::from_be_bytes(prefix);
    // The residue is below 2^20; exactly representable as f64.
    #[allow(clippy::cast_precision_loss)]
    let unit = (n % 1_000_000) as f64 / 1_000_000.0;
    unit
}
