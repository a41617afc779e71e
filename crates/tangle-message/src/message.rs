use serde::{Deserialize, Serialize};
use tangle_crypto::ContentHasher;
use tangle_types::MessageId;
use tracing::debug;

use crate::error::{MessageError, MessageResult};
use crate::payload::Payload;
use crate::pow::{PowConfig, ProofOfWork};

/// Maximum size of a message's canonical bytes.
pub const MAX_MESSAGE_LENGTH: usize = 32 * 1024;

/// Width of the trailing nonce in the canonical bytes.
const NONCE_LENGTH: usize = 8;

/// A vertex of the tangle: two parents, an optional payload and a
/// proof-of-work nonce.
///
/// The canonical bytes are the `bincode` encoding of this struct. The nonce is
/// the last field, so it occupies the trailing 8 little-endian bytes and a
/// nonce search only rewrites that suffix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    parent1: MessageId,
    parent2: MessageId,
    payload: Option<Payload>,
    nonce: u64,
}

impl Message {
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    pub fn parent1(&self) -> &MessageId {
        &self.parent1
    }

    pub fn parent2(&self) -> &MessageId {
        &self.parent2
    }

    pub fn parents(&self) -> [MessageId; 2] {
        [self.parent1, self.parent2]
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Same message with a different nonce.
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Canonical bytes, size-checked.
    pub fn to_bytes(&self) -> MessageResult<Vec<u8>> {
        let bytes =
            bincode::serialize(self).map_err(|e| MessageError::Serialization(e.to_string()))?;
        if bytes.len() > MAX_MESSAGE_LENGTH {
            return Err(MessageError::MessageTooLarge {
                size: bytes.len(),
                max: MAX_MESSAGE_LENGTH,
            });
        }
        Ok(bytes)
    }

    /// Decode and validate canonical bytes.
    pub fn from_bytes(bytes: &[u8]) -> MessageResult<Self> {
        if bytes.len() > MAX_MESSAGE_LENGTH {
            return Err(MessageError::MessageTooLarge {
                size: bytes.len(),
                max: MAX_MESSAGE_LENGTH,
            });
        }
        let message: Self = bincode::deserialize(bytes)
            .map_err(|e| MessageError::Deserialization(e.to_string()))?;
        let reencoded = message.to_bytes()?;
        if reencoded.as_slice() != bytes {
            return Err(MessageError::Deserialization(
                "bytes are not in canonical form".into(),
            ));
        }
        message.validate()?;
        Ok(message)
    }

    /// Content hash of the canonical bytes.
    pub fn id(&self) -> MessageResult<MessageId> {
        Ok(Self::id_of_bytes(&self.to_bytes()?))
    }

    pub fn id_of_bytes(bytes: &[u8]) -> MessageId {
        MessageId::from_hash(ContentHasher::MESSAGE.hash(bytes))
    }

    /// Proof-of-work score of this message's current nonce.
    pub fn pow_score(&self) -> MessageResult<u32> {
        ProofOfWork::score_message_bytes(&self.to_bytes()?)
    }

    /// Structural validation of the payload.
    pub fn validate(&self) -> MessageResult<()> {
        match &self.payload {
            Some(payload) => payload.validate(),
            None => Ok(()),
        }
    }
}

/// Assembles a [`Message`] and optionally seals it with proof of work.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    parents: Option<(MessageId, MessageId)>,
    payload: Option<Payload>,
    nonce_start: u64,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parents(mut self, parent1: MessageId, parent2: MessageId) -> Self {
        self.parents = Some((parent1, parent2));
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// First nonce tried by [`seal`](Self::seal); also the nonce of an
    /// unsealed message.
    pub fn with_nonce_start(mut self, nonce: u64) -> Self {
        self.nonce_start = nonce;
        self
    }

    /// The message with its starting nonce, leaving proof of work to the node.
    pub fn build_unsealed(self) -> MessageResult<Message> {
        let (parent1, parent2) = self.parents.ok_or(MessageError::MissingParents)?;
        let message = Message {
            parent1,
            parent2,
            payload: self.payload,
            nonce: self.nonce_start,
        };
        message.validate()?;
        message.to_bytes()?;
        Ok(message)
    }

    /// Build the message and search for a nonce meeting `config`.
    ///
    /// CPU-bound; async callers run it on a blocking task.
    pub fn seal(self, config: &PowConfig) -> MessageResult<Message> {
        let start = self.nonce_start;
        let message = self.build_unsealed()?;
        let bytes = message.to_bytes()?;
        let prefix = &bytes[..bytes.len() - NONCE_LENGTH];
        let nonce = ProofOfWork::search(prefix, start, config)?;
        let sealed = message.with_nonce(nonce);
        debug!(
            nonce,
            size = bytes.len(),
            payload = sealed.payload().map(Payload::kind).unwrap_or("none"),
            "sealed message"
        );
        Ok(sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::IndexationPayload;

    fn parents() -> (MessageId, MessageId) {
        (MessageId::from_hash([1; 32]), MessageId::from_hash([2; 32]))
    }

    fn indexation() -> IndexationPayload {
        IndexationPayload::new("tangle.rs", "hello").unwrap()
    }

    fn low_difficulty() -> PowConfig {
        PowConfig::default().with_difficulty(6)
    }

    #[test]
    fn nonce_is_trailing_le_field() {
        let (p1, p2) = parents();
        let message = Message::builder()
            .with_parents(p1, p2)
            .with_nonce_start(0x0102_0304_0506_0708)
            .build_unsealed()
            .unwrap();
        let bytes = message.to_bytes().unwrap();
        assert_eq!(&bytes[bytes.len() - 8..], &0x0102_0304_0506_0708u64.to_le_bytes());
    }

    #[test]
    fn bytes_roundtrip_preserves_id() {
        let (p1, p2) = parents();
        let message = Message::builder()
            .with_parents(p1, p2)
            .with_payload(indexation())
            .build_unsealed()
            .unwrap();
        let bytes = message.to_bytes().unwrap();
        let decoded = Message::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.id().unwrap(), message.id().unwrap());
    }

    #[test]
    fn id_depends_on_nonce() {
        let (p1, p2) = parents();
        let message = Message::builder().with_parents(p1, p2).build_unsealed().unwrap();
        let other = message.clone().with_nonce(1);
        assert_ne!(message.id().unwrap(), other.id().unwrap());
    }

    #[test]
    fn seal_meets_difficulty() {
        let (p1, p2) = parents();
        let sealed = Message::builder()
            .with_parents(p1, p2)
            .with_payload(indexation())
            .seal(&low_difficulty())
            .unwrap();
        assert!(sealed.pow_score().unwrap() >= 6);
    }

    #[test]
    fn missing_parents_fail() {
        assert!(matches!(
            Message::builder().build_unsealed(),
            Err(MessageError::MissingParents)
        ));
    }

    #[test]
    fn oversized_message_is_rejected() {
        let (p1, p2) = parents();
        let big = IndexationPayload::new("big", vec![0u8; MAX_MESSAGE_LENGTH]).unwrap();
        let err = Message::builder()
            .with_parents(p1, p2)
            .with_payload(big)
            .build_unsealed()
            .unwrap_err();
        assert!(matches!(err, MessageError::MessageTooLarge { .. }));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let (p1, p2) = parents();
        let message = Message::builder().with_parents(p1, p2).build_unsealed().unwrap();
        let mut bytes = message.to_bytes().unwrap();
        bytes.push(0);
        assert!(Message::from_bytes(&bytes).is_err());
    }

    #[test]
    fn indexation_survives_json() {
        let (p1, p2) = parents();
        let data = vec![0u8, 159, 146, 150];
        let message = Message::builder()
            .with_parents(p1, p2)
            .with_payload(IndexationPayload::new("bin", data.clone()).unwrap())
            .build_unsealed()
            .unwrap();
        let json = serde_json::to_string(&message).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        match parsed.payload() {
            Some(Payload::Indexation(ix)) => {
                assert_eq!(ix.index(), "bin");
                assert_eq!(ix.data(), data.as_slice());
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(parsed.id().unwrap(), message.id().unwrap());
    }
}
