use tangle_message::MessageError;
use tangle_types::MessageId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node {endpoint} unavailable for {query}: {reason}")]
    Unavailable {
        endpoint: String,
        query: String,
        reason: String,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid parent {0}")]
    InvalidParent(MessageId),

    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("quorum not reached for {query}: {agreeing} of {queried} nodes agree")]
    QuorumNotReached {
        query: String,
        agreeing: usize,
        queried: usize,
    },

    #[error("no nodes configured")]
    NoNodes,

    #[error("invalid node url: {0}")]
    Url(#[from] url::ParseError),

    #[error("message error: {0}")]
    Message(#[from] MessageError),
}

impl NodeError {
    /// Whether another node might answer the same query.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Whether a failover should try the next node. A garbled answer may be
    /// specific to the node that sent it.
    pub fn warrants_failover(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Decode(_))
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
