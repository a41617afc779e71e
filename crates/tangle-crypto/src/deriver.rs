use tangle_types::{Address, DerivationPath, Seed, Segment, HARDENED_OFFSET};

use crate::error::{CryptoError, CryptoResult};
use crate::signer::SigningKey;
use crate::slip10::ExtendedKey;

/// Deterministic seed-to-address derivation.
///
/// All operations are pure and offline: the same seed and path always yield
/// the same key and address.
pub struct AddressDeriver;

impl AddressDeriver {
    /// Signing key at `path`.
    pub fn derive_keypair(seed: &Seed, path: &DerivationPath) -> CryptoResult<SigningKey> {
        Ok(ExtendedKey::derive(seed, path)?.signing_key())
    }

    /// Address at `path`.
    pub fn derive_address(seed: &Seed, path: &DerivationPath) -> CryptoResult<Address> {
        Ok(Self::derive_keypair(seed, path)?.address())
    }

    /// `count` consecutive addresses below `base`, at hardened indices
    /// `start..start + count`, in increasing index order.
    ///
    /// The key at `base` is derived once and each address is a single
    /// hardened step below it.
    pub fn derive_range(
        seed: &Seed,
        base: &DerivationPath,
        start: u32,
        count: u32,
    ) -> CryptoResult<Vec<Address>> {
        let end = u64::from(start) + u64::from(count);
        if end > u64::from(HARDENED_OFFSET) {
            return Err(CryptoError::InvalidPath(format!(
                "range {start}..{end} below {base} exceeds the hardened index space"
            )));
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        // Validates that `base` is fully hardened before any child is built.
        let parent = ExtendedKey::derive(seed, base)?;
        (start..start + count)
            .map(|index| Ok(parent.child(index)?.signing_key().address()))
            .collect()
    }

    /// Path of the address at `index` below `base`.
    pub fn path_at(base: &DerivationPath, index: u32) -> CryptoResult<DerivationPath> {
        Ok(base.extend(Segment::hardened(index)?))
    }
}
