use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::TypeError;

/// Length of a seed in bytes.
pub const SEED_LENGTH: usize = 32;

/// Secret root material for address derivation.
///
/// A `Seed` is owned by the caller and only ever borrowed by derivation
/// calls. The bytes are wiped when the seed is dropped and are never
/// printed: `Debug` is redacted and there is no `Display`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_LENGTH]);

impl Seed {
    /// Create a seed from raw bytes.
    pub fn from_bytes(bytes: [u8; SEED_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create a seed from a byte slice of exactly [`SEED_LENGTH`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.is_empty() {
            return Err(TypeError::InvalidSeed("seed is empty".into()));
        }
        if bytes.len() != SEED_LENGTH {
            return Err(TypeError::InvalidLength {
                expected: SEED_LENGTH,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; SEED_LENGTH];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Parse a seed from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TypeError::InvalidSeed("seed is empty".into()));
        }
        // The decoded buffer holds secret material too.
        let mut bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let seed = Self::from_slice(&bytes);
        bytes.zeroize();
        seed
    }

    /// Generate a random seed for tests and demos.
    pub fn random() -> Self {
        let mut bytes = [0u8; SEED_LENGTH];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// The raw secret bytes.
    pub fn as_bytes(&self) -> &[u8; SEED_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED_HEX: &str = "256a818b2aac458941f7274985a410e57fb750f3a3a67969ece5bd9ae7eef5b2";

    #[test]
    fn from_hex_accepts_64_chars() {
        let seed = Seed::from_hex(SEED_HEX).unwrap();
        assert_eq!(hex::encode(seed.as_bytes()), SEED_HEX);
    }

    #[test]
    fn empty_seed_is_rejected() {
        assert!(matches!(Seed::from_hex(""), Err(TypeError::InvalidSeed(_))));
        assert!(matches!(Seed::from_slice(&[]), Err(TypeError::InvalidSeed(_))));
    }

    #[test]
    fn short_seed_is_rejected() {
        let err = Seed::from_hex("abcd").unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 32, actual: 2 });
    }

    #[test]
    fn non_hex_is_rejected() {
        assert!(matches!(Seed::from_hex("zz"), Err(TypeError::InvalidHex(_))));
    }

    #[test]
    fn debug_redacts_secret() {
        let seed = Seed::from_hex(SEED_HEX).unwrap();
        let debug = format!("{seed:?}");
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("256a"));
    }

    #[test]
    fn random_seeds_differ() {
        assert_ne!(Seed::random().as_bytes(), Seed::random().as_bytes());
    }
}
