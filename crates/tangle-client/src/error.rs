use tangle_crypto::CryptoError;
use tangle_message::MessageError;
use tangle_node::NodeError;
use tangle_types::{MessageId, TypeError};
use tangle_wallet::WalletError;
use thiserror::Error;

/// Every failure a client call can report.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("node unavailable for {query}: {reason}")]
    NodeUnavailable { query: String, reason: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("invalid parent {0}")]
    InvalidParent(MessageId),

    #[error("node assigned id {remote}, local content hash is {local}")]
    EncodingMismatch { local: MessageId, remote: MessageId },

    #[error("proof of work not found after {attempts} attempts")]
    ProofOfWorkTimeout { attempts: u64 },

    #[error("quorum not reached for {query}: {agreeing} of {queried} nodes agree")]
    QuorumNotReached {
        query: String,
        agreeing: usize,
        queried: usize,
    },

    #[error("message rejected by node: {0}")]
    Rejected(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Whether repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NodeUnavailable { .. } | Self::QuorumNotReached { .. } | Self::ProofOfWorkTimeout { .. }
        )
    }
}

impl From<NodeError> for ClientError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Unavailable {
                endpoint,
                query,
                reason,
            } => Self::NodeUnavailable {
                query,
                reason: format!("{endpoint}: {reason}"),
            },
            NodeError::NotFound(what) => Self::NotFound(what),
            NodeError::InvalidParent(id) => Self::InvalidParent(id),
            NodeError::Rejected(reason) => Self::Rejected(reason),
            NodeError::Decode(reason) => Self::NodeUnavailable {
                query: "decode".into(),
                reason: format!("malformed node response: {reason}"),
            },
            NodeError::QuorumNotReached {
                query,
                agreeing,
                queried,
            } => Self::QuorumNotReached {
                query,
                agreeing,
                queried,
            },
            NodeError::NoNodes => Self::Config("no nodes configured".into()),
            NodeError::Url(e) => Self::Config(format!("invalid node url: {e}")),
            NodeError::Message(e) => e.into(),
        }
    }
}

impl From<MessageError> for ClientError {
    fn from(err: MessageError) -> Self {
        match err {
            MessageError::ProofOfWorkTimeout { attempts } => Self::ProofOfWorkTimeout { attempts },
            MessageError::InvalidDifficulty(_) => Self::Config(err.to_string()),
            MessageError::WorkerPool(reason) => Self::Internal(reason),
            MessageError::Crypto(e) => e.into(),
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

impl From<WalletError> for ClientError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InsufficientBalance { required, available } => {
                Self::InsufficientBalance { required, available }
            }
            WalletError::TooManyInputs { .. } | WalletError::InvalidOptions(_) => {
                Self::InvalidRequest(err.to_string())
            }
            WalletError::Node(e) => e.into(),
            WalletError::Crypto(e) => e.into(),
        }
    }
}

impl From<CryptoError> for ClientError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidPath(msg) => Self::InvalidPath(msg),
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

impl From<TypeError> for ClientError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidPath(msg) => Self::InvalidPath(msg),
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
