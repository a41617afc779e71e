use std::ops::Range;

use tangle_message::{IndexationPayload, Message, MAX_OUTPUTS, MAX_SUPPLY};
use tangle_node::{LedgerInclusionState, MessageMetadata};
use tangle_types::{Address, DerivationPath, MessageId, HARDENED_OFFSET};

use crate::error::{ClientError, ClientResult};

fn invalid<T>(msg: impl Into<String>) -> ClientResult<T> {
    Err(ClientError::InvalidRequest(msg.into()))
}

/// Derive a range of addresses of one chain of an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FindAddresses {
    pub path: DerivationPath,
    pub range: Range<u32>,
    pub internal: bool,
}

impl FindAddresses {
    /// Public addresses 0..20 of `path`.
    pub fn new(path: DerivationPath) -> Self {
        Self {
            path,
            range: 0..20,
            internal: false,
        }
    }

    pub fn with_range(mut self, range: Range<u32>) -> Self {
        self.range = range;
        self
    }

    pub fn with_internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.range.is_empty() {
            return invalid(format!("empty address range {:?}", self.range));
        }
        if self.range.end > HARDENED_OFFSET {
            return Err(ClientError::InvalidPath(format!(
                "address index {} out of range",
                self.range.end - 1
            )));
        }
        Ok(())
    }
}

/// Transfer value and/or attach indexed data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendRequest {
    /// Account whose addresses fund the transfer.
    pub path: DerivationPath,
    pub outputs: Vec<(Address, u64)>,
    /// Explicit parents; node tips when absent.
    pub parents: Option<(MessageId, MessageId)>,
    pub indexation: Option<IndexationPayload>,
    /// Lowest address index considered for inputs.
    pub start_index: u32,
}

impl SendRequest {
    pub fn new(path: DerivationPath) -> Self {
        Self {
            path,
            outputs: Vec::new(),
            parents: None,
            indexation: None,
            start_index: 0,
        }
    }

    pub fn with_output(mut self, address: Address, amount: u64) -> Self {
        self.outputs.push((address, amount));
        self
    }

    pub fn with_parents(mut self, parent1: MessageId, parent2: MessageId) -> Self {
        self.parents = Some((parent1, parent2));
        self
    }

    pub fn with_indexation(mut self, indexation: IndexationPayload) -> Self {
        self.indexation = Some(indexation);
        self
    }

    pub fn with_start_index(mut self, start_index: u32) -> Self {
        self.start_index = start_index;
        self
    }

    /// Sum of requested amounts.
    pub fn total_amount(&self) -> ClientResult<u64> {
        let total = self
            .outputs
            .iter()
            .try_fold(0u64, |acc, (_, amount)| acc.checked_add(*amount))
            .filter(|total| *total <= MAX_SUPPLY);
        match total {
            Some(total) => Ok(total),
            None => invalid("requested amounts exceed the total supply"),
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.outputs.is_empty() && self.indexation.is_none() {
            return invalid("send needs at least one output or an indexation payload");
        }
        if self.outputs.len() > MAX_OUTPUTS {
            return invalid(format!("{} outputs exceed the maximum of {MAX_OUTPUTS}", self.outputs.len()));
        }
        if let Some((address, _)) = self.outputs.iter().find(|(_, amount)| *amount == 0) {
            return invalid(format!("zero amount for {address}"));
        }
        if self.start_index >= HARDENED_OFFSET {
            return Err(ClientError::InvalidPath(format!(
                "start index {} out of range",
                self.start_index
            )));
        }
        if let Some(indexation) = &self.indexation {
            indexation.validate()?;
        }
        self.total_amount().map(|_| ())
    }
}

/// Total unspent balance of an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceRequest {
    pub path: DerivationPath,
    pub start_index: u32,
}

impl BalanceRequest {
    pub fn new(path: DerivationPath) -> Self {
        Self { path, start_index: 0 }
    }

    pub fn with_start_index(mut self, start_index: u32) -> Self {
        self.start_index = start_index;
        self
    }
}

/// First public address holding an unspent output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnspentAddressRequest {
    pub path: DerivationPath,
    pub start_index: u32,
}

impl UnspentAddressRequest {
    pub fn new(path: DerivationPath) -> Self {
        Self { path, start_index: 0 }
    }

    pub fn with_start_index(mut self, start_index: u32) -> Self {
        self.start_index = start_index;
        self
    }
}

pub(crate) fn check_start_index(start_index: u32) -> ClientResult<()> {
    if start_index >= HARDENED_OFFSET {
        return Err(ClientError::InvalidPath(format!("start index {start_index} out of range")));
    }
    Ok(())
}

/// What to fetch about a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageQuery {
    Data(MessageId),
    Children(MessageId),
    Metadata(MessageId),
    Raw(MessageId),
}

impl MessageQuery {
    pub fn message_id(&self) -> &MessageId {
        match self {
            Self::Data(id) | Self::Children(id) | Self::Metadata(id) | Self::Raw(id) => id,
        }
    }
}

/// Answer to a [`MessageQuery`], in the same variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageResponse {
    Data(Message),
    Children(Vec<MessageId>),
    Metadata(MessageMetadata),
    Raw(Vec<u8>),
}

/// Where a posted message stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmationState {
    /// Not yet referenced by a milestone.
    Pending,
    /// Referenced; the transaction, if any, was applied.
    Confirmed {
        milestone_index: u32,
        inclusion: LedgerInclusionState,
    },
    /// Referenced, but its transaction conflicted and was ignored.
    Conflicting { milestone_index: u32 },
}

impl From<&MessageMetadata> for ConfirmationState {
    fn from(metadata: &MessageMetadata) -> Self {
        match (metadata.referenced_by_milestone_index, metadata.ledger_inclusion_state) {
            (None, _) => Self::Pending,
            (Some(milestone_index), Some(LedgerInclusionState::Conflicting)) => {
                Self::Conflicting { milestone_index }
            }
            (Some(milestone_index), inclusion) => Self::Confirmed {
                milestone_index,
                inclusion: inclusion.unwrap_or(LedgerInclusionState::NoTransaction),
            },
        }
    }
}

impl ConfirmationState {
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> DerivationPath {
        "m/0'/0'".parse().unwrap()
    }

    fn address() -> Address {
        Address::from_hash([3; 32])
    }

    #[test]
    fn find_addresses_rejects_empty_range() {
        let request = FindAddresses::new(account()).with_range(5..5);
        assert!(matches!(request.validate(), Err(ClientError::InvalidRequest(_))));
        assert!(FindAddresses::new(account()).with_range(0..5).validate().is_ok());
    }

    #[test]
    fn find_addresses_rejects_hardened_overflow() {
        let request = FindAddresses::new(account()).with_range(HARDENED_OFFSET - 1..HARDENED_OFFSET + 1);
        assert!(matches!(request.validate(), Err(ClientError::InvalidPath(_))));
    }

    #[test]
    fn send_needs_outputs_or_data() {
        let empty = SendRequest::new(account());
        assert!(matches!(empty.validate(), Err(ClientError::InvalidRequest(_))));

        let data_only = SendRequest::new(account())
            .with_indexation(IndexationPayload::new("tag", "payload").unwrap());
        assert!(data_only.validate().is_ok());
    }

    #[test]
    fn send_rejects_zero_and_overflowing_amounts() {
        let zero = SendRequest::new(account()).with_output(address(), 0);
        assert!(matches!(zero.validate(), Err(ClientError::InvalidRequest(_))));

        let overflow = SendRequest::new(account())
            .with_output(address(), MAX_SUPPLY)
            .with_output(Address::from_hash([4; 32]), 1);
        assert!(matches!(overflow.validate(), Err(ClientError::InvalidRequest(_))));
    }

    #[test]
    fn send_total_sums_outputs() {
        let request = SendRequest::new(account())
            .with_output(address(), 2)
            .with_output(Address::from_hash([4; 32]), 5);
        assert_eq!(request.total_amount().unwrap(), 7);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn confirmation_from_metadata() {
        let mut metadata = MessageMetadata {
            message_id: MessageId::from_hash([1; 32]),
            parent_message_ids: vec![MessageId::null(), MessageId::null()],
            is_solid: true,
            referenced_by_milestone_index: None,
            ledger_inclusion_state: None,
            should_reattach: None,
        };
        assert_eq!(ConfirmationState::from(&metadata), ConfirmationState::Pending);
        assert!(!ConfirmationState::from(&metadata).is_final());

        metadata.referenced_by_milestone_index = Some(4);
        assert_eq!(
            ConfirmationState::from(&metadata),
            ConfirmationState::Confirmed {
                milestone_index: 4,
                inclusion: LedgerInclusionState::NoTransaction
            }
        );

        metadata.ledger_inclusion_state = Some(LedgerInclusionState::Conflicting);
        assert_eq!(
            ConfirmationState::from(&metadata),
            ConfirmationState::Conflicting { milestone_index: 4 }
        );
    }
}
