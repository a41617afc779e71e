//! Cryptographic primitives for the tangle client.
//!
//! Provides domain-separated BLAKE3 hashing, Ed25519 signing/verification,
//! SLIP-10 hierarchical key derivation and the [`AddressDeriver`] built on
//! top of it.
//!
//! Primitives come from audited crates (blake3, ed25519-dalek, hmac, sha2).
//! Nothing in this crate touches the network.

pub mod deriver;
pub mod error;
pub mod hasher;
pub mod signer;
pub mod slip10;

pub use deriver::AddressDeriver;
pub use error::{CryptoError, CryptoResult};
pub use hasher::ContentHasher;
pub use signer::{Signature, SigningKey, VerifyingKey};
pub use slip10::ExtendedKey;
