use serde::{Deserialize, Serialize};
use tangle_types::{Address, MessageId, OutputId};

/// Node status as reported by `GET /api/v1/info`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub name: String,
    pub version: String,
    pub is_healthy: bool,
    pub network_id: String,
    pub bech32_hrp: String,
    pub min_pow_score: u32,
    pub latest_milestone_index: u32,
    pub confirmed_milestone_index: u32,
    #[serde(default)]
    pub features: Vec<String>,
}

/// How a confirmed message affected the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedgerInclusionState {
    /// Transaction applied to the ledger.
    Included,
    /// Transaction conflicted with the ledger (e.g. a double spend) and was
    /// ignored.
    Conflicting,
    /// Confirmed message without a transaction.
    NoTransaction,
}

/// Confirmation state of a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    pub message_id: MessageId,
    pub parent_message_ids: Vec<MessageId>,
    pub is_solid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_by_milestone_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_inclusion_state: Option<LedgerInclusionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_reattach: Option<bool>,
}

impl MessageMetadata {
    pub fn is_confirmed(&self) -> bool {
        self.referenced_by_milestone_index.is_some()
    }
}

/// Confirmed balance of one address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub address: Address,
    pub balance: u64,
}

/// Wire shape of `GET /api/v1/tips`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TipsResponse {
    pub tip_message_ids: Vec<MessageId>,
}

/// Wire shape of `GET /api/v1/messages/{id}/children`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChildrenResponse {
    pub message_id: MessageId,
    pub children_message_ids: Vec<MessageId>,
}

/// Wire shape of `GET /api/v1/addresses/ed25519/{address}/outputs`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddressOutputsResponse {
    pub address: Address,
    pub output_ids: Vec<OutputId>,
}

/// Wire shape of `POST /api/v1/messages`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostMessageResponse {
    pub message_id: MessageId,
}

/// Every node response is wrapped in `{ "data": ... }`.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}
