use serde::{Deserialize, Serialize};

use crate::message_id::MessageId;

/// A milestone as reported by a node's milestone endpoint.
///
/// Any message transitively referenced by milestone `index` (or an earlier
/// one) is confirmed through `index`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneInfo {
    pub message_id: MessageId,
    #[serde(rename = "milestoneIndex")]
    pub index: u32,
    /// Seconds since UNIX epoch.
    pub timestamp: u64,
}
