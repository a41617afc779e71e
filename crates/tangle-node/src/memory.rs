use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tangle_crypto::{ContentHasher, SigningKey};
use tangle_message::{Message, MilestonePayload, Payload, PowConfig, ProofOfWork, TransactionPayload};
use tangle_types::{
    Address, MessageId, MilestoneInfo, Output, OutputId, TransactionId, HRP_TESTNET,
};
use tracing::{debug, info};

use crate::api::NodeApi;
use crate::error::{NodeError, NodeResult};
use crate::types::{BalanceResponse, LedgerInclusionState, MessageMetadata, NodeInfo};

/// Settings of an [`InMemoryNode`].
#[derive(Clone, Debug)]
pub struct InMemoryNodeConfig {
    /// Minimum proof-of-work score of accepted messages.
    pub min_pow_score: u32,
    /// Seal under-scored messages instead of rejecting them.
    pub remote_pow: bool,
    /// Issue a milestone after every accepted message.
    pub auto_milestone: bool,
    pub network_id: String,
    pub bech32_hrp: String,
}

impl Default for InMemoryNodeConfig {
    fn default() -> Self {
        Self {
            min_pow_score: 0,
            remote_pow: false,
            auto_milestone: true,
            network_id: "tangle-memory".into(),
            bech32_hrp: HRP_TESTNET.into(),
        }
    }
}

struct StoredMessage {
    message: Message,
    bytes: Vec<u8>,
    arrival: u64,
    referenced_by: Option<u32>,
    inclusion: Option<LedgerInclusionState>,
}

#[derive(Default)]
struct Ledger {
    messages: HashMap<MessageId, StoredMessage>,
    children: HashMap<MessageId, Vec<MessageId>>,
    tips: BTreeSet<MessageId>,
    outputs: HashMap<OutputId, Output>,
    address_outputs: HashMap<Address, Vec<OutputId>>,
    milestones: BTreeMap<u32, MilestoneInfo>,
    arrivals: u64,
    minted: u64,
}

impl Ledger {
    fn insert_message(&mut self, id: MessageId, message: Message, bytes: Vec<u8>) {
        for parent in message.parents() {
            self.tips.remove(&parent);
            let children = self.children.entry(parent).or_default();
            if !children.contains(&id) {
                children.push(id);
            }
        }
        self.tips.insert(id);
        self.arrivals += 1;
        self.messages.insert(
            id,
            StoredMessage {
                message,
                bytes,
                arrival: self.arrivals,
                referenced_by: None,
                inclusion: None,
            },
        );
    }

    /// Up to two tips, newest first; a single tip is returned twice.
    fn select_tips(&self) -> Vec<MessageId> {
        let mut tips: Vec<_> = self.tips.iter().copied().collect();
        tips.sort_by_key(|id| std::cmp::Reverse(self.messages.get(id).map_or(0, |m| m.arrival)));
        tips.truncate(2);
        if tips.len() == 1 {
            tips.push(tips[0]);
        }
        tips
    }

    fn create_output(&mut self, output: Output) {
        self.address_outputs
            .entry(output.address)
            .or_default()
            .push(output.output_id);
        self.outputs.insert(output.output_id, output);
    }

    /// Ledger-state checks for a transaction: inputs exist and are unspent,
    /// amounts balance, unlock blocks match the input owners.
    fn check_transaction(&self, tx: &TransactionPayload) -> NodeResult<()> {
        let mut owners = Vec::with_capacity(tx.essence().inputs().len());
        let mut input_total: u64 = 0;
        for input in tx.essence().inputs() {
            let output = self
                .outputs
                .get(input.output_id())
                .ok_or_else(|| NodeError::Rejected(format!("unknown input {}", input.output_id())))?;
            if output.is_spent {
                return Err(NodeError::Rejected(format!(
                    "input {} already spent",
                    input.output_id()
                )));
            }
            input_total = input_total.saturating_add(output.amount);
            owners.push(output.address);
        }
        let output_total = tx.essence().output_total();
        if input_total != output_total {
            return Err(NodeError::Rejected(format!(
                "inputs {input_total} do not balance outputs {output_total}"
            )));
        }
        tx.verify_signatures(&owners)
            .map_err(|e| NodeError::Rejected(e.to_string()))
    }

    /// Apply a confirmed transaction, or report it as conflicting when one of
    /// its inputs was spent meanwhile.
    fn apply_transaction(
        &mut self,
        message_id: MessageId,
        tx: &TransactionPayload,
    ) -> LedgerInclusionState {
        let spendable = tx
            .essence()
            .inputs()
            .iter()
            .all(|i| self.outputs.get(i.output_id()).is_some_and(|o| !o.is_spent));
        let Ok(transaction_id) = tx.id() else {
            return LedgerInclusionState::Conflicting;
        };
        if !spendable {
            return LedgerInclusionState::Conflicting;
        }
        for input in tx.essence().inputs() {
            if let Some(output) = self.outputs.get_mut(input.output_id()) {
                output.is_spent = true;
            }
        }
        for (index, created) in tx.essence().outputs().iter().enumerate() {
            self.create_output(Output {
                output_id: OutputId::new(transaction_id, index as u16),
                message_id,
                address: *created.address(),
                amount: created.amount(),
                is_spent: false,
            });
        }
        LedgerInclusionState::Included
    }

    /// Unreferenced messages in the past cone of `parents`, oldest first.
    fn unreferenced_cone(&self, parents: &[MessageId]) -> Vec<MessageId> {
        let mut stack: Vec<MessageId> = parents.to_vec();
        let mut seen = HashSet::new();
        let mut cone = Vec::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(stored) = self.messages.get(&id) else {
                continue;
            };
            if stored.referenced_by.is_some() {
                continue;
            }
            cone.push(id);
            stack.extend(stored.message.parents());
        }
        cone.sort_by_key(|id| self.messages.get(id).map_or(0, |m| m.arrival));
        cone
    }

    fn latest_milestone(&self) -> u32 {
        self.milestones.keys().next_back().copied().unwrap_or(0)
    }
}

/// A single-process tangle node holding its whole state in memory.
///
/// Validates what it receives the way a full node would (size, parents,
/// proof of work, transaction inputs and signatures) and confirms messages
/// through milestones it issues itself. Confirmed transactions update the
/// ledger; a transaction whose inputs were spent by an earlier confirmed one
/// is marked conflicting.
pub struct InMemoryNode {
    ledger: RwLock<Ledger>,
    config: InMemoryNodeConfig,
    coordinator: SigningKey,
    genesis: MessageId,
}

impl InMemoryNode {
    pub fn new(config: InMemoryNodeConfig) -> Self {
        let coordinator = SigningKey::generate();
        let mut ledger = Ledger::default();
        let genesis = Message::builder()
            .with_parents(MessageId::null(), MessageId::null())
            .with_payload(MilestonePayload::new(1, unix_time(), [0; 32]).sign(&coordinator))
            .build_unsealed()
            .expect("genesis message is well formed");
        let bytes = genesis.to_bytes().expect("genesis message encodes");
        let genesis_id = Message::id_of_bytes(&bytes);
        ledger.insert_message(genesis_id, genesis, bytes);
        if let Some(stored) = ledger.messages.get_mut(&genesis_id) {
            stored.referenced_by = Some(1);
            stored.inclusion = Some(LedgerInclusionState::NoTransaction);
        }
        ledger.milestones.insert(
            1,
            MilestoneInfo {
                message_id: genesis_id,
                index: 1,
                timestamp: unix_time(),
            },
        );
        Self {
            ledger: RwLock::new(ledger),
            config,
            coordinator,
            genesis: genesis_id,
        }
    }

    pub fn config(&self) -> &InMemoryNodeConfig {
        &self.config
    }

    /// Id of the genesis message.
    pub fn genesis(&self) -> MessageId {
        self.genesis
    }

    /// Mint a confirmed output of `amount` to `address`.
    pub fn fund(&self, address: &Address, amount: u64) -> OutputId {
        let mut ledger = self.ledger.write().expect("lock poisoned");
        ledger.minted += 1;
        let transaction_id = TransactionId::from_hash(
            ContentHasher::TRANSACTION.hash_parts(&[b"mint".as_slice(), ledger.minted.to_le_bytes().as_slice()]),
        );
        let output_id = OutputId::new(transaction_id, 0);
        ledger.create_output(Output {
            output_id,
            message_id: self.genesis,
            address: *address,
            amount,
            is_spent: false,
        });
        debug!(address = %address.short_hex(), amount, "funded address");
        output_id
    }

    /// Confirm every unreferenced message approved by the current tips.
    pub fn issue_milestone(&self) -> NodeResult<MilestoneInfo> {
        let mut ledger = self.ledger.write().expect("lock poisoned");
        let index = ledger.latest_milestone() + 1;
        let parents = ledger.select_tips();
        let cone = ledger.unreferenced_cone(&parents);

        let mut root_input = Vec::with_capacity(cone.len() * MessageId::LENGTH);
        for id in &cone {
            root_input.extend_from_slice(id.as_bytes());
        }
        let timestamp = unix_time();
        let payload = MilestonePayload::new(index, timestamp, ContentHasher::raw_hash(&root_input))
            .sign(&self.coordinator);
        let message = Message::builder()
            .with_parents(parents[0], parents[1])
            .with_payload(payload)
            .build_unsealed()?;
        let bytes = message.to_bytes()?;
        let milestone_id = Message::id_of_bytes(&bytes);

        for id in &cone {
            let transaction = ledger.messages.get(id).and_then(|stored| match stored.message.payload() {
                Some(Payload::Transaction(tx)) => Some(tx.as_ref().clone()),
                _ => None,
            });
            let inclusion = match transaction {
                Some(tx) => ledger.apply_transaction(*id, &tx),
                None => LedgerInclusionState::NoTransaction,
            };
            if let Some(stored) = ledger.messages.get_mut(id) {
                stored.referenced_by = Some(index);
                stored.inclusion = Some(inclusion);
            }
        }

        ledger.insert_message(milestone_id, message, bytes);
        if let Some(stored) = ledger.messages.get_mut(&milestone_id) {
            stored.referenced_by = Some(index);
            stored.inclusion = Some(LedgerInclusionState::NoTransaction);
        }
        let info = MilestoneInfo {
            message_id: milestone_id,
            index,
            timestamp,
        };
        ledger.milestones.insert(index, info.clone());
        info!(index, confirmed = cone.len(), "issued milestone");
        Ok(info)
    }

    fn not_found(what: &str, id: impl std::fmt::Display) -> NodeError {
        NodeError::NotFound(format!("{what} {id}"))
    }
}

impl Default for InMemoryNode {
    fn default() -> Self {
        Self::new(InMemoryNodeConfig::default())
    }
}

fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl NodeApi for InMemoryNode {
    fn endpoint(&self) -> &str {
        "memory"
    }

    async fn get_info(&self) -> NodeResult<NodeInfo> {
        let ledger = self.ledger.read().expect("lock poisoned");
        let latest = ledger.latest_milestone();
        Ok(NodeInfo {
            name: "tangle-memory".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            is_healthy: true,
            network_id: self.config.network_id.clone(),
            bech32_hrp: self.config.bech32_hrp.clone(),
            min_pow_score: self.config.min_pow_score,
            latest_milestone_index: latest,
            confirmed_milestone_index: latest,
            features: Vec::new(),
        })
    }

    async fn get_tips(&self) -> NodeResult<Vec<MessageId>> {
        Ok(self.ledger.read().expect("lock poisoned").select_tips())
    }

    async fn get_message(&self, id: &MessageId) -> NodeResult<Message> {
        let ledger = self.ledger.read().expect("lock poisoned");
        ledger
            .messages
            .get(id)
            .map(|m| m.message.clone())
            .ok_or_else(|| Self::not_found("message", id))
    }

    async fn get_message_raw(&self, id: &MessageId) -> NodeResult<Vec<u8>> {
        let ledger = self.ledger.read().expect("lock poisoned");
        ledger
            .messages
            .get(id)
            .map(|m| m.bytes.clone())
            .ok_or_else(|| Self::not_found("message", id))
    }

    async fn get_message_children(&self, id: &MessageId) -> NodeResult<Vec<MessageId>> {
        let ledger = self.ledger.read().expect("lock poisoned");
        if !ledger.messages.contains_key(id) {
            return Err(Self::not_found("message", id));
        }
        Ok(ledger.children.get(id).cloned().unwrap_or_default())
    }

    async fn get_message_metadata(&self, id: &MessageId) -> NodeResult<MessageMetadata> {
        let ledger = self.ledger.read().expect("lock poisoned");
        let stored = ledger
            .messages
            .get(id)
            .ok_or_else(|| Self::not_found("message", id))?;
        Ok(MessageMetadata {
            message_id: *id,
            parent_message_ids: stored.message.parents().to_vec(),
            is_solid: true,
            referenced_by_milestone_index: stored.referenced_by,
            ledger_inclusion_state: stored.inclusion,
            should_reattach: (stored.inclusion == Some(LedgerInclusionState::Conflicting))
                .then_some(true),
        })
    }

    async fn get_address_balance(&self, address: &Address) -> NodeResult<BalanceResponse> {
        let ledger = self.ledger.read().expect("lock poisoned");
        let balance = ledger
            .address_outputs
            .get(address)
            .into_iter()
            .flatten()
            .filter_map(|id| ledger.outputs.get(id))
            .map(Output::unspent_amount)
            .sum();
        Ok(BalanceResponse {
            address: *address,
            balance,
        })
    }

    async fn get_address_outputs(&self, address: &Address) -> NodeResult<Vec<OutputId>> {
        let ledger = self.ledger.read().expect("lock poisoned");
        Ok(ledger.address_outputs.get(address).cloned().unwrap_or_default())
    }

    async fn get_output(&self, id: &OutputId) -> NodeResult<Output> {
        let ledger = self.ledger.read().expect("lock poisoned");
        ledger
            .outputs
            .get(id)
            .cloned()
            .ok_or_else(|| Self::not_found("output", id))
    }

    async fn get_milestone(&self, index: u32) -> NodeResult<MilestoneInfo> {
        let ledger = self.ledger.read().expect("lock poisoned");
        ledger
            .milestones
            .get(&index)
            .cloned()
            .ok_or_else(|| Self::not_found("milestone", index))
    }

    async fn post_message(&self, message: &Message) -> NodeResult<MessageId> {
        let reject = |e: tangle_message::MessageError| NodeError::Rejected(e.to_string());
        message.validate().map_err(reject)?;
        if matches!(message.payload(), Some(Payload::Milestone(_))) {
            return Err(NodeError::Rejected("milestones are issued by the coordinator".into()));
        }

        let mut message = message.clone();
        let mut bytes = message.to_bytes().map_err(reject)?;
        let score = ProofOfWork::score_message_bytes(&bytes).map_err(reject)?;
        if score < self.config.min_pow_score {
            if !self.config.remote_pow {
                return Err(NodeError::Rejected(format!(
                    "proof-of-work score {score} below {}",
                    self.config.min_pow_score
                )));
            }
            let config = PowConfig::default().with_difficulty(self.config.min_pow_score);
            let nonce = ProofOfWork::search(&bytes[..bytes.len() - 8], message.nonce(), &config)
                .map_err(reject)?;
            message = message.with_nonce(nonce);
            bytes = message.to_bytes().map_err(reject)?;
            debug!(nonce, "sealed message for client");
        }
        let id = Message::id_of_bytes(&bytes);

        {
            let mut ledger = self.ledger.write().expect("lock poisoned");
            if ledger.messages.contains_key(&id) {
                return Ok(id);
            }
            for parent in message.parents() {
                if !ledger.messages.contains_key(&parent) {
                    return Err(NodeError::InvalidParent(parent));
                }
            }
            if let Some(Payload::Transaction(tx)) = message.payload() {
                ledger.check_transaction(tx)?;
            }
            let kind = message.payload().map(Payload::kind).unwrap_or("none");
            ledger.insert_message(id, message, bytes);
            info!(message_id = %id.short_hex(), payload = kind, "accepted message");
        }

        if self.config.auto_milestone {
            self.issue_milestone()?;
        }
        Ok(id)
    }
}
