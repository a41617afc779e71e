use thiserror::Error;

/// Errors from key derivation and signature operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid key")]
    InvalidKey,

    #[error("mac error: {0}")]
    Mac(String),
}

impl From<tangle_types::TypeError> for CryptoError {
    fn from(err: tangle_types::TypeError) -> Self {
        match err {
            tangle_types::TypeError::InvalidPath(msg) => Self::InvalidPath(msg),
            other => Self::InvalidPath(other.to_string()),
        }
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
