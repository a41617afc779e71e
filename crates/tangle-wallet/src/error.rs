use tangle_crypto::CryptoError;
use tangle_node::NodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("amount needs more than {max} inputs")]
    TooManyInputs { max: usize },

    #[error("invalid scan options: {0}")]
    InvalidOptions(String),

    #[error("node error: {0}")]
    Node(#[from] NodeError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

pub type WalletResult<T> = Result<T, WalletError>;
