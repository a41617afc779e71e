//! Node API boundary for the tangle client.
//!
//! [`NodeApi`] is the single seam between the client and the network. It is
//! implemented three ways:
//!
//! - [`HttpNode`]: a node's REST interface over `reqwest`
//! - [`QuorumNode`]: several nodes, with quorum agreement on balance and
//!   output queries and failover for everything else
//! - [`InMemoryNode`]: a validating single-process node for tests and
//!   offline embedding

pub mod api;
pub mod error;
pub mod http;
pub mod memory;
pub mod quorum;
pub mod types;

pub use api::NodeApi;
pub use error::{NodeError, NodeResult};
pub use http::HttpNode;
pub use memory::{InMemoryNode, InMemoryNodeConfig};
pub use quorum::{QuorumNode, DEFAULT_QUORUM_THRESHOLD};
pub use types::{BalanceResponse, LedgerInclusionState, MessageMetadata, NodeInfo};
