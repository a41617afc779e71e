//! Foundation types for the tangle client.
//!
//! Every other tangle crate depends on `tangle-types`. The types here carry
//! no behaviour beyond parsing, encoding and validation; derivation, hashing
//! and signing live in `tangle-crypto`.
//!
//! # Key Types
//!
//! - [`Seed`]: 32-byte secret, zeroized on drop, never printed
//! - [`DerivationPath`]: immutable sequence of hardened/non-hardened segments
//! - [`Address`]: Ed25519 address hash with hex and Bech32 encodings
//! - [`MessageId`]: content hash of a serialized message
//! - [`OutputId`] / [`Output`]: ledger outputs and their spent state
//! - [`MilestoneInfo`]: consensus checkpoint reference

pub mod address;
pub mod error;
pub mod message_id;
pub mod milestone;
pub mod output;
pub mod path;
pub mod seed;
pub mod serde_hex;

pub use address::{Address, ADDRESS_KIND_ED25519, HRP_MAINNET, HRP_TESTNET};
pub use error::TypeError;
pub use message_id::MessageId;
pub use milestone::MilestoneInfo;
pub use output::{Output, OutputId, TransactionId, OUTPUT_ID_LENGTH};
pub use path::{DerivationPath, Segment, HARDENED_OFFSET};
pub use seed::{Seed, SEED_LENGTH};
