use std::fmt;
use std::str::FromStr;

use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Address kind byte for Ed25519 addresses in the Bech32 encoding.
pub const ADDRESS_KIND_ED25519: u8 = 1;

/// Human-readable part of mainnet Bech32 addresses.
pub const HRP_MAINNET: &str = "iot";

/// Human-readable part of testnet Bech32 addresses.
pub const HRP_TESTNET: &str = "atoi";

/// Ed25519 address: the 32-byte hash of a public key.
///
/// Addresses compare by byte value. The canonical text form is 64 hex
/// characters; [`to_bech32`](Self::to_bech32) produces the network-specific
/// form (`iot1...`) that prefixes the kind byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(#[serde(with = "crate::serde_hex")] [u8; 32]);

impl Address {
    /// Create from a pre-computed public key hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded hash.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex hash.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Bech32 encoding under the given human-readable part.
    pub fn to_bech32(&self, hrp: &str) -> Result<String, TypeError> {
        let mut data = Vec::with_capacity(33);
        data.push(ADDRESS_KIND_ED25519);
        data.extend_from_slice(&self.0);
        bech32::encode(hrp, data.to_base32(), Variant::Bech32)
            .map_err(|e| TypeError::InvalidBech32(e.to_string()))
    }

    /// Decode a Bech32 address, returning its human-readable part.
    pub fn from_bech32(s: &str) -> Result<(String, Self), TypeError> {
        let (hrp, data, variant) =
            bech32::decode(s).map_err(|e| TypeError::InvalidBech32(e.to_string()))?;
        if variant != Variant::Bech32 {
            return Err(TypeError::InvalidBech32("expected bech32 variant".into()));
        }
        let bytes =
            Vec::<u8>::from_base32(&data).map_err(|e| TypeError::InvalidBech32(e.to_string()))?;
        let (kind, hash) = bytes
            .split_first()
            .ok_or_else(|| TypeError::InvalidBech32("empty payload".into()))?;
        if *kind != ADDRESS_KIND_ED25519 {
            return Err(TypeError::UnsupportedAddressKind(*kind));
        }
        if hash.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: hash.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(hash);
        Ok((hrp, Self(arr)))
    }

    /// Parse either encoding: Bech32 (any network) or hex.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let s = s.trim();
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Self::from_hex(s);
        }
        Self::from_bech32(s).map(|(_, address)| address)
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPOSIT: &str = "iot1q9jyad2efwyq7ldg9u6eqg5krxdqawgcdxvhjlmxrveylrt4fgaqj30s9qj";
    const DEPOSIT_HASH: &str = "644eb5594b880f7da82f35902296199a0eb9186999797f661b324f8d754a3a09";

    #[test]
    fn decodes_known_mainnet_address() {
        let (hrp, address) = Address::from_bech32(DEPOSIT).unwrap();
        assert_eq!(hrp, HRP_MAINNET);
        assert_eq!(address.to_hex(), DEPOSIT_HASH);
    }

    #[test]
    fn bech32_encoding_matches_known_address() {
        let address = Address::from_hex(DEPOSIT_HASH).unwrap();
        assert_eq!(address.to_bech32(HRP_MAINNET).unwrap(), DEPOSIT);
    }

    #[test]
    fn parse_accepts_both_encodings() {
        let a = Address::parse(DEPOSIT).unwrap();
        let b = Address::parse(DEPOSIT_HASH).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn testnet_hrp_differs() {
        let address = Address::from_hash([3; 32]);
        let encoded = address.to_bech32(HRP_TESTNET).unwrap();
        assert!(encoded.starts_with("atoi1"));
        let (hrp, decoded) = Address::from_bech32(&encoded).unwrap();
        assert_eq!(hrp, HRP_TESTNET);
        assert_eq!(decoded, address);
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let mut bad = DEPOSIT.to_string();
        bad.pop();
        bad.push('q');
        assert!(matches!(Address::parse(&bad), Err(TypeError::InvalidBech32(_))));
    }

    #[test]
    fn wrong_hex_length_is_rejected() {
        let err = Address::from_hex("abcd").unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 32, actual: 2 });
    }

    #[test]
    fn json_is_hex_string() {
        let address = Address::from_hex(DEPOSIT_HASH).unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{DEPOSIT_HASH}\""));
    }
}
