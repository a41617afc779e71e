use serde::{Deserialize, Serialize};
use tangle_crypto::{ContentHasher, Signature, SigningKey, VerifyingKey};

use crate::error::{MessageError, MessageResult};
use crate::transaction::TransactionPayload;

/// Maximum length of an indexation index in bytes.
pub const INDEXATION_INDEX_MAX: usize = 64;

/// The content carried by a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Payload {
    Transaction(Box<TransactionPayload>),
    Milestone(Box<MilestonePayload>),
    Indexation(Box<IndexationPayload>),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transaction(_) => "transaction",
            Self::Milestone(_) => "milestone",
            Self::Indexation(_) => "indexation",
        }
    }

    /// Structural validation of the payload and everything it nests.
    pub fn validate(&self) -> MessageResult<()> {
        match self {
            Self::Transaction(tx) => tx.validate(),
            Self::Milestone(_) => Ok(()),
            Self::Indexation(ix) => ix.validate(),
        }
    }
}

impl From<TransactionPayload> for Payload {
    fn from(tx: TransactionPayload) -> Self {
        Self::Transaction(Box::new(tx))
    }
}

impl From<IndexationPayload> for Payload {
    fn from(ix: IndexationPayload) -> Self {
        Self::Indexation(Box::new(ix))
    }
}

impl From<MilestonePayload> for Payload {
    fn from(ms: MilestonePayload) -> Self {
        Self::Milestone(Box::new(ms))
    }
}

/// Arbitrary data filed under a text index.
///
/// Text data is stored as its UTF-8 bytes; the index must be 1 to
/// [`INDEXATION_INDEX_MAX`] bytes long.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexationPayload {
    index: String,
    data: Vec<u8>,
}

impl IndexationPayload {
    pub fn new(index: impl Into<String>, data: impl Into<Vec<u8>>) -> MessageResult<Self> {
        let payload = Self {
            index: index.into(),
            data: data.into(),
        };
        payload.validate()?;
        Ok(payload)
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn validate(&self) -> MessageResult<()> {
        let len = self.index.len();
        if len == 0 || len > INDEXATION_INDEX_MAX {
            return Err(MessageError::InvalidIndexation(format!(
                "index length {len} outside 1..={INDEXATION_INDEX_MAX}"
            )));
        }
        Ok(())
    }
}

/// A consensus checkpoint issued by the network's coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestonePayload {
    pub index: u32,
    pub timestamp: u64,
    #[serde(with = "tangle_types::serde_hex")]
    pub inclusion_merkle_root: [u8; 32],
    pub signatures: Vec<Signature>,
}

impl MilestonePayload {
    pub fn new(index: u32, timestamp: u64, inclusion_merkle_root: [u8; 32]) -> Self {
        Self {
            index,
            timestamp,
            inclusion_merkle_root,
            signatures: Vec::new(),
        }
    }

    /// Bytes covered by the coordinator signatures.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + 8 + 32);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.inclusion_merkle_root);
        ContentHasher::ESSENCE.hash(&bytes).to_vec()
    }

    pub fn sign(mut self, key: &SigningKey) -> Self {
        let signature = key.sign(&self.signing_bytes());
        self.signatures.push(signature);
        self
    }

    /// Whether at least one signature verifies under `key`.
    pub fn is_signed_by(&self, key: &VerifyingKey) -> bool {
        let bytes = self.signing_bytes();
        self.signatures.iter().any(|s| key.verify(&bytes, s).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexation_keeps_text_as_utf8() {
        let ix = IndexationPayload::new("tangle.rs", "héllo").unwrap();
        assert_eq!(ix.index(), "tangle.rs");
        assert_eq!(ix.data(), "héllo".as_bytes());
    }

    #[test]
    fn indexation_keeps_binary_unchanged() {
        let data = vec![0u8, 255, 1, 128];
        let ix = IndexationPayload::new("bin", data.clone()).unwrap();
        assert_eq!(ix.data(), data.as_slice());
    }

    #[test]
    fn indexation_index_bounds() {
        assert!(IndexationPayload::new("", "x").is_err());
        assert!(IndexationPayload::new("a".repeat(64), "x").is_ok());
        assert!(matches!(
            IndexationPayload::new("a".repeat(65), "x"),
            Err(MessageError::InvalidIndexation(_))
        ));
    }

    #[test]
    fn milestone_signatures() {
        let coordinator = SigningKey::generate();
        let other = SigningKey::generate();
        let ms = MilestonePayload::new(3, 1_600_000_000, [0; 32]).sign(&coordinator);
        assert!(ms.is_signed_by(&coordinator.verifying_key()));
        assert!(!ms.is_signed_by(&other.verifying_key()));
    }

    #[test]
    fn payload_json_is_tagged() {
        let payload = Payload::from(IndexationPayload::new("i", "d").unwrap());
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("indexation").is_some());
        assert_eq!(payload.kind(), "indexation");
    }
}
