//! Client library for a tangle ledger.
//!
//! [`Client`] is the single entry point: it derives addresses from a seed,
//! aggregates balances with a gap-limited scan, builds and signs value
//! transfers, seals messages with proof of work and queries nodes, either one
//! or a quorum of several.
//!
//! ```no_run
//! # async fn demo() -> tangle_client::ClientResult<()> {
//! use tangle_client::{BalanceRequest, Client, Seed};
//!
//! let client = Client::builder().node("http://localhost:14265").build()?;
//! let seed = Seed::random();
//! let balance = client
//!     .get_balance(&seed, &BalanceRequest::new("m/0'/0'".parse()?))
//!     .await?;
//! # let _ = balance;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod request;

pub use builder::ClientBuilder;
pub use client::{Client, GetMessage};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use logging::init_logging;
pub use request::{
    BalanceRequest, ConfirmationState, FindAddresses, MessageQuery, MessageResponse, SendRequest,
    UnspentAddressRequest,
};

// Re-export the types callers need to fill in requests.
pub use tangle_message::{IndexationPayload, Message, Payload};
pub use tangle_node::{
    HttpNode, InMemoryNode, InMemoryNodeConfig, LedgerInclusionState, MessageMetadata, NodeApi, NodeInfo,
};
pub use tangle_types::{Address, DerivationPath, MessageId, MilestoneInfo, Output, OutputId, Seed};
