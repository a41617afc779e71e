use thiserror::Error;

/// Errors produced by type parsing and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid bech32 address: {0}")]
    InvalidBech32(String),

    #[error("unsupported address kind: {0}")]
    UnsupportedAddressKind(u8),

    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("invalid seed: {0}")]
    InvalidSeed(String),
}
