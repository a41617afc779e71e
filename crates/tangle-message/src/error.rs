use tangle_crypto::CryptoError;
use tangle_types::{Address, OutputId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("message has no parents")]
    MissingParents,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("invalid indexation payload: {0}")]
    InvalidIndexation(String),

    #[error("invalid input count {0} (allowed 1..={max})", max = crate::transaction::MAX_INPUTS)]
    InputCount(usize),

    #[error("invalid output count {0} (allowed 1..={max})", max = crate::transaction::MAX_OUTPUTS)]
    OutputCount(usize),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("duplicate input {0}")]
    DuplicateInput(OutputId),

    #[error("inputs and outputs must be sorted by their canonical bytes")]
    Unsorted,

    #[error("input amounts {inputs} do not match output amounts {outputs}")]
    AmountMismatch { inputs: u64, outputs: u64 },

    #[error("input {output_id} is owned by {owner}, not by the key at its path")]
    InputAddressMismatch { output_id: OutputId, owner: Address },

    #[error("invalid unlock block at {index}: {reason}")]
    InvalidUnlock { index: usize, reason: String },

    #[error("invalid proof-of-work difficulty {0}")]
    InvalidDifficulty(u32),

    #[error("proof of work not found after {attempts} attempts")]
    ProofOfWorkTimeout { attempts: u64 },

    #[error("worker pool error: {0}")]
    WorkerPool(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

pub type MessageResult<T> = Result<T, MessageError>;
