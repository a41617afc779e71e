//! Ledger messages for the tangle client.
//!
//! A [`Message`] references two parent messages and carries an optional
//! [`Payload`]: a signed [`TransactionPayload`], a [`MilestonePayload`] or an
//! [`IndexationPayload`]. Its identity is the hash of its canonical `bincode`
//! bytes, sealed by a proof-of-work nonce in the trailing 8 bytes.
//!
//! Nothing here talks to a node. Tip selection and submission are driven by
//! `tangle-client`.

pub mod error;
pub mod message;
pub mod payload;
pub mod pow;
pub mod transaction;

pub use error::{MessageError, MessageResult};
pub use message::{Message, MessageBuilder, MAX_MESSAGE_LENGTH};
pub use payload::{IndexationPayload, MilestonePayload, Payload, INDEXATION_INDEX_MAX};
pub use pow::{PowConfig, ProofOfWork, MAX_DIFFICULTY};
pub use transaction::{
    Essence, InputSigningData, SignatureLockedOutput, SignatureUnlock, TransactionBuilder,
    TransactionPayload, UnlockBlock, UtxoInput, MAX_INPUTS, MAX_OUTPUTS, MAX_SUPPLY,
};
