use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tangle_message::Message;
use tangle_types::{Address, MessageId, MilestoneInfo, Output, OutputId};
use tracing::{debug, warn};

use crate::api::NodeApi;
use crate::error::{NodeError, NodeResult};
use crate::types::{BalanceResponse, MessageMetadata, NodeInfo};

/// Default share of queried nodes that must agree, in percent.
pub const DEFAULT_QUORUM_THRESHOLD: u8 = 66;

/// [`NodeApi`] over several nodes.
///
/// Balance and address-output queries are sent to the first `quorum_size`
/// nodes at once and the most common answer is returned when at least
/// `threshold` percent of the queried nodes gave it. Every other call goes to
/// the first node and moves on to the next only when a node is unavailable.
pub struct QuorumNode {
    nodes: Vec<Arc<dyn NodeApi>>,
    quorum_size: usize,
    threshold: u8,
    endpoint: String,
}

impl QuorumNode {
    /// `quorum_size` is clamped to `1..=nodes.len()`; `threshold` must be in
    /// `1..=100`.
    pub fn new(nodes: Vec<Arc<dyn NodeApi>>, quorum_size: usize, threshold: u8) -> NodeResult<Self> {
        if nodes.is_empty() {
            return Err(NodeError::NoNodes);
        }
        if threshold == 0 || threshold > 100 {
            return Err(NodeError::Rejected(format!(
                "quorum threshold {threshold} outside 1..=100"
            )));
        }
        let quorum_size = quorum_size.clamp(1, nodes.len());
        let endpoint = nodes
            .iter()
            .map(|n| n.endpoint())
            .collect::<Vec<_>>()
            .join(",");
        Ok(Self {
            nodes,
            quorum_size,
            threshold,
            endpoint,
        })
    }

    /// A single node without quorum.
    pub fn single(node: Arc<dyn NodeApi>) -> Self {
        let endpoint = node.endpoint().to_string();
        Self {
            nodes: vec![node],
            quorum_size: 1,
            threshold: 100,
            endpoint,
        }
    }

    pub fn nodes(&self) -> &[Arc<dyn NodeApi>] {
        &self.nodes
    }

    pub fn quorum_size(&self) -> usize {
        self.quorum_size
    }

    async fn quorum<T, F, Fut>(&self, query: &str, call: F) -> NodeResult<T>
    where
        T: PartialEq + Debug,
        F: Fn(Arc<dyn NodeApi>) -> Fut,
        Fut: Future<Output = NodeResult<T>>,
    {
        let queried = &self.nodes[..self.quorum_size];
        let results = join_all(queried.iter().map(|node| call(Arc::clone(node)))).await;

        let mut tally: Vec<(T, usize)> = Vec::new();
        let mut first_error = None;
        for (node, result) in queried.iter().zip(results) {
            match result {
                Ok(answer) => match tally.iter_mut().find(|(seen, _)| *seen == answer) {
                    Some((_, count)) => *count += 1,
                    None => tally.push((answer, 1)),
                },
                Err(e) => {
                    warn!(endpoint = node.endpoint(), query, error = %e, "quorum member failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        let Some((answer, agreeing)) = tally.into_iter().max_by_key(|(_, count)| *count) else {
            return Err(first_error.unwrap_or(NodeError::NoNodes));
        };
        let queried = queried.len();
        if agreeing * 100 < usize::from(self.threshold) * queried {
            warn!(query, agreeing, queried, "quorum not reached");
            return Err(NodeError::QuorumNotReached {
                query: query.to_string(),
                agreeing,
                queried,
            });
        }
        debug!(query, agreeing, queried, "quorum reached");
        Ok(answer)
    }

    async fn failover<T, F, Fut>(&self, query: &str, call: F) -> NodeResult<T>
    where
        F: Fn(Arc<dyn NodeApi>) -> Fut,
        Fut: Future<Output = NodeResult<T>>,
    {
        let mut last_error = None;
        for node in &self.nodes {
            match call(Arc::clone(node)).await {
                Err(e) if e.warrants_failover() => {
                    warn!(endpoint = node.endpoint(), query, error = %e, "node failed, failing over");
                    last_error = Some(e);
                }
                other => return other,
            }
        }
        Err(last_error.unwrap_or(NodeError::NoNodes))
    }
}

#[async_trait]
impl NodeApi for QuorumNode {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_info(&self) -> NodeResult<NodeInfo> {
        self.failover("info", |n| async move { n.get_info().await })
            .await
    }

    async fn get_tips(&self) -> NodeResult<Vec<MessageId>> {
        self.failover("tips", |n| async move { n.get_tips().await })
            .await
    }

    async fn get_message(&self, id: &MessageId) -> NodeResult<Message> {
        self.failover("message", |n| async move { n.get_message(id).await })
            .await
    }

    async fn get_message_raw(&self, id: &MessageId) -> NodeResult<Vec<u8>> {
        self.failover("raw message", |n| async move { n.get_message_raw(id).await })
            .await
    }

    async fn get_message_children(&self, id: &MessageId) -> NodeResult<Vec<MessageId>> {
        self.failover("children", |n| async move {
            n.get_message_children(id).await
        })
        .await
    }

    async fn get_message_metadata(&self, id: &MessageId) -> NodeResult<MessageMetadata> {
        self.failover("metadata", |n| async move {
            n.get_message_metadata(id).await
        })
        .await
    }

    async fn get_address_balance(&self, address: &Address) -> NodeResult<BalanceResponse> {
        self.quorum("address balance", |n| async move {
            n.get_address_balance(address).await
        })
        .await
    }

    async fn get_address_outputs(&self, address: &Address) -> NodeResult<Vec<OutputId>> {
        self.quorum("address outputs", |n| async move {
            let mut ids = n.get_address_outputs(address).await?;
            ids.sort();
            Ok(ids)
        })
        .await
    }

    async fn get_output(&self, id: &OutputId) -> NodeResult<Output> {
        self.failover("output", |n| async move { n.get_output(id).await })
            .await
    }

    async fn get_milestone(&self, index: u32) -> NodeResult<MilestoneInfo> {
        self.failover("milestone", |n| async move { n.get_milestone(index).await })
            .await
    }

    async fn post_message(&self, message: &Message) -> NodeResult<MessageId> {
        self.failover("post message", |n| async move {
            n.post_message(message).await
        })
        .await
    }
}
