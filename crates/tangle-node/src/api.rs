use async_trait::async_trait;
use tangle_message::Message;
use tangle_types::{Address, MessageId, MilestoneInfo, Output, OutputId};

use crate::error::NodeResult;
use crate::types::{BalanceResponse, MessageMetadata, NodeInfo};

/// Queries and submissions a tangle node answers.
///
/// Implemented by [`HttpNode`](crate::HttpNode) for a remote node,
/// [`QuorumNode`](crate::QuorumNode) for a set of nodes, and
/// [`InMemoryNode`](crate::InMemoryNode) for tests and offline use.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Human-readable endpoint, used in logs and errors.
    fn endpoint(&self) -> &str;

    async fn get_info(&self) -> NodeResult<NodeInfo>;

    /// Messages without children, suitable as parents of a new message.
    async fn get_tips(&self) -> NodeResult<Vec<MessageId>>;

    async fn get_message(&self, id: &MessageId) -> NodeResult<Message>;

    /// Canonical bytes of a message.
    async fn get_message_raw(&self, id: &MessageId) -> NodeResult<Vec<u8>>;

    async fn get_message_children(&self, id: &MessageId) -> NodeResult<Vec<MessageId>>;

    async fn get_message_metadata(&self, id: &MessageId) -> NodeResult<MessageMetadata>;

    async fn get_address_balance(&self, address: &Address) -> NodeResult<BalanceResponse>;

    /// Ids of every output (spent or not) ever locked to `address`.
    async fn get_address_outputs(&self, address: &Address) -> NodeResult<Vec<OutputId>>;

    async fn get_output(&self, id: &OutputId) -> NodeResult<Output>;

    async fn get_milestone(&self, index: u32) -> NodeResult<MilestoneInfo>;

    /// Submit a message. Returns the id the node computed for it.
    async fn post_message(&self, message: &Message) -> NodeResult<MessageId>;
}
