//! Serde helper for fixed-size byte arrays.
//!
//! Human-readable formats (the node's JSON API) see a lowercase hex string;
//! binary formats (the canonical `bincode` message encoding) see raw bytes.
//! Works for any array length, including the 64-byte signatures that serde
//! cannot derive for.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Unlock {
//!     #[serde(with = "tangle_types::serde_hex")]
//!     signature: [u8; 64],
//! }
//! ```

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if serializer.is_human_readable() {
        serializer.serialize_str(&hex::encode(bytes))
    } else {
        serializer.serialize_bytes(bytes)
    }
}

pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
where
    D: Deserializer<'de>,
{
    let bytes = if deserializer.is_human_readable() {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(|e| D::Error::custom(format!("invalid hex: {e}")))?
    } else {
        Vec::<u8>::deserialize(deserializer)?
    };
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| D::Error::custom(format!("expected {N} bytes, got {len}")))
}
