use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::Address;
use crate::error::TypeError;
use crate::message_id::MessageId;

/// Length of an [`OutputId`] in bytes: transaction id plus a `u16` index.
pub const OUTPUT_ID_LENGTH: usize = 34;

/// Hash of a transaction payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(#[serde(with = "crate::serde_hex")] [u8; 32]);

impl TransactionId {
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", hex::encode(&self.0[..4]))
    }
}

/// Identifier of a ledger output: the producing transaction and the output's
/// position within it.
///
/// Text form is 68 hex characters: the transaction id followed by the index
/// in little-endian byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId {
    transaction_id: TransactionId,
    index: u16,
}

impl OutputId {
    pub fn new(transaction_id: TransactionId, index: u16) -> Self {
        Self {
            transaction_id,
            index,
        }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    /// Packed 34-byte form.
    pub fn to_bytes(&self) -> [u8; OUTPUT_ID_LENGTH] {
        let mut bytes = [0u8; OUTPUT_ID_LENGTH];
        bytes[..32].copy_from_slice(self.transaction_id.as_bytes());
        bytes[32..].copy_from_slice(&self.index.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() != OUTPUT_ID_LENGTH {
            return Err(TypeError::InvalidLength {
                expected: OUTPUT_ID_LENGTH,
                actual: bytes.len(),
            });
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[..32]);
        let index = u16::from_le_bytes([bytes[32], bytes[33]]);
        Ok(Self::new(TransactionId::from_hash(hash), index))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl FromStr for OutputId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OutputId({}:{})",
            hex::encode(&self.transaction_id.as_bytes()[..4]),
            self.index
        )
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for OutputId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.to_bytes())
        }
    }
}

impl<'de> Deserialize<'de> for OutputId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = Vec::<u8>::deserialize(deserializer)?;
            Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
        }
    }
}

/// A ledger output as reported by a node.
///
/// The amount never changes; `is_spent` reflects the node's view at the time
/// of the query and must be re-queried for fresh state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub output_id: OutputId,
    pub message_id: MessageId,
    pub address: Address,
    pub amount: u64,
    pub is_spent: bool,
}

impl Output {
    /// Amount if unspent, zero otherwise.
    pub fn unspent_amount(&self) -> u64 {
        if self.is_spent {
            0
        } else {
            self.amount
        }
    }
}
