//! SLIP-10 key derivation over Ed25519.
//!
//! Ed25519 only supports hardened children, so every segment of a path must
//! be hardened. The master key comes from HMAC-SHA512 keyed with
//! `"ed25519 seed"`.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use tangle_types::{DerivationPath, Seed, HARDENED_OFFSET};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::signer::SigningKey;

type HmacSha512 = Hmac<Sha512>;

const MASTER_HMAC_KEY: &[u8] = b"ed25519 seed";

/// A private key plus chain code at some depth of the derivation tree.
pub struct ExtendedKey {
    key: Zeroizing<[u8; 32]>,
    chain_code: [u8; 32],
}

impl ExtendedKey {
    /// Master key for a seed.
    pub fn master(seed: &Seed) -> CryptoResult<Self> {
        let mut mac = HmacSha512::new_from_slice(MASTER_HMAC_KEY)
            .map_err(|e| CryptoError::Mac(e.to_string()))?;
        mac.update(seed.as_bytes());
        Ok(Self::from_mac_output(mac))
    }

    /// Derive along every segment of `path` starting from the master key.
    pub fn derive(seed: &Seed, path: &DerivationPath) -> CryptoResult<Self> {
        path.segments().iter().try_fold(Self::master(seed)?, |key, segment| {
            if !segment.is_hardened() {
                return Err(CryptoError::InvalidPath(format!(
                    "ed25519 requires hardened segments, got {segment} in {path}"
                )));
            }
            key.child(segment.index())
        })
    }

    /// Hardened child at `index` (`index` must be below 2^31).
    pub fn child(&self, index: u32) -> CryptoResult<Self> {
        if index >= HARDENED_OFFSET {
            return Err(CryptoError::InvalidPath(format!(
                "child index {index} out of hardened range"
            )));
        }
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|e| CryptoError::Mac(e.to_string()))?;
        mac.update(&[0u8]);
        mac.update(self.key.as_ref());
        mac.update(&(index | HARDENED_OFFSET).to_be_bytes());
        Ok(Self::from_mac_output(mac))
    }

    fn from_mac_output(mac: HmacSha512) -> Self {
        let out = mac.finalize().into_bytes();
        let mut key = Zeroizing::new([0u8; 32]);
        let mut chain_code = [0u8; 32];
        key.copy_from_slice(&out[..32]);
        chain_code.copy_from_slice(&out[32..]);
        Self { key, chain_code }
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    /// Ed25519 signing key for this node.
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.key)
    }
}

impl std::fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExtendedKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SLIP-0010 test vector 1 for ed25519.
    const VECTOR_SEED: &str = "000102030405060708090a0b0c0d0e0f";

    fn vector_master() -> ExtendedKey {
        let seed_bytes = hex::decode(VECTOR_SEED).unwrap();
        let mut mac = HmacSha512::new_from_slice(MASTER_HMAC_KEY).unwrap();
        mac.update(&seed_bytes);
        ExtendedKey::from_mac_output(mac)
    }

    #[test]
    fn slip10_vector_master() {
        let master = vector_master();
        assert_eq!(
            hex::encode(master.key.as_ref()),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            hex::encode(master.chain_code()),
            "90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb"
        );
    }

    #[test]
    fn slip10_vector_first_child() {
        let child = vector_master().child(0).unwrap();
        assert_eq!(
            hex::encode(child.key.as_ref()),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );
        assert_eq!(
            hex::encode(child.chain_code()),
            "8b59aa11380b624e81507a27fedda59fea6d0b779a778918a2fd3590e16e9c69"
        );
    }

    #[test]
    fn rejects_non_hardened_segment() {
        let seed = Seed::from_bytes([1; 32]);
        let path = "m/0'/1".parse().unwrap();
        assert!(matches!(
            ExtendedKey::derive(&seed, &path),
            Err(CryptoError::InvalidPath(_))
        ));
    }

    #[test]
    fn derivation_is_deterministic() {
        let seed = Seed::from_bytes([7; 32]);
        let path = "m/44'/4218'/0'".parse().unwrap();
        let a = ExtendedKey::derive(&seed, &path).unwrap();
        let b = ExtendedKey::derive(&seed, &path).unwrap();
        assert_eq!(a.signing_key().verifying_key(), b.signing_key().verifying_key());
        assert_eq!(a.chain_code(), b.chain_code());
    }

    #[test]
    fn siblings_differ() {
        let master = ExtendedKey::master(&Seed::from_bytes([3; 32])).unwrap();
        let a = master.child(0).unwrap();
        let b = master.child(1).unwrap();
        assert_ne!(a.signing_key().verifying_key(), b.signing_key().verifying_key());
    }
}
