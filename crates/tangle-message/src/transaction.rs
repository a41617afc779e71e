use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tangle_crypto::{AddressDeriver, ContentHasher, Signature, VerifyingKey};
use tangle_types::{Address, DerivationPath, Output, OutputId, Seed, TransactionId};
use tracing::debug;

use crate::error::{MessageError, MessageResult};
use crate::payload::IndexationPayload;

/// Maximum number of inputs in one transaction.
pub const MAX_INPUTS: usize = 127;
/// Maximum number of outputs in one transaction.
pub const MAX_OUTPUTS: usize = 127;
/// Total token supply; no amount or sum of amounts may exceed it.
pub const MAX_SUPPLY: u64 = 2_779_530_283_277_761;

/// Reference to an unspent output consumed by a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtxoInput(OutputId);

impl UtxoInput {
    pub fn new(output_id: OutputId) -> Self {
        Self(output_id)
    }

    pub fn output_id(&self) -> &OutputId {
        &self.0
    }
}

/// An amount locked to an address; spending it needs a signature from the
/// address's key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureLockedOutput {
    address: Address,
    amount: u64,
}

impl SignatureLockedOutput {
    pub fn new(address: Address, amount: u64) -> MessageResult<Self> {
        check_amount(amount)?;
        Ok(Self { address, amount })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    fn sort_key(&self) -> ([u8; 32], [u8; 8]) {
        (*self.address.as_bytes(), self.amount.to_le_bytes())
    }
}

fn check_amount(amount: u64) -> MessageResult<()> {
    if amount == 0 || amount > MAX_SUPPLY {
        return Err(MessageError::InvalidAmount(format!(
            "{amount} outside 1..={MAX_SUPPLY}"
        )));
    }
    Ok(())
}

/// The signed part of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Essence {
    inputs: Vec<UtxoInput>,
    outputs: Vec<SignatureLockedOutput>,
    payload: Option<IndexationPayload>,
}

impl Essence {
    /// Build an essence, sorting inputs and outputs into canonical order.
    pub fn new(
        mut inputs: Vec<UtxoInput>,
        mut outputs: Vec<SignatureLockedOutput>,
        payload: Option<IndexationPayload>,
    ) -> MessageResult<Self> {
        inputs.sort_by_key(|i| i.output_id().to_bytes());
        outputs.sort_by_key(SignatureLockedOutput::sort_key);
        let essence = Self {
            inputs,
            outputs,
            payload,
        };
        essence.validate()?;
        Ok(essence)
    }

    pub fn inputs(&self) -> &[UtxoInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[SignatureLockedOutput] {
        &self.outputs
    }

    pub fn payload(&self) -> Option<&IndexationPayload> {
        self.payload.as_ref()
    }

    /// Sum of all output amounts.
    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    pub fn validate(&self) -> MessageResult<()> {
        if self.inputs.is_empty() || self.inputs.len() > MAX_INPUTS {
            return Err(MessageError::InputCount(self.inputs.len()));
        }
        if self.outputs.is_empty() || self.outputs.len() > MAX_OUTPUTS {
            return Err(MessageError::OutputCount(self.outputs.len()));
        }

        let mut seen = HashSet::with_capacity(self.inputs.len());
        for input in &self.inputs {
            if !seen.insert(*input.output_id()) {
                return Err(MessageError::DuplicateInput(*input.output_id()));
            }
        }

        let mut total: u64 = 0;
        for output in &self.outputs {
            check_amount(output.amount)?;
            total = total
                .checked_add(output.amount)
                .filter(|t| *t <= MAX_SUPPLY)
                .ok_or_else(|| {
                    MessageError::InvalidAmount(format!("output total exceeds {MAX_SUPPLY}"))
                })?;
        }

        let inputs_sorted = self
            .inputs
            .windows(2)
            .all(|w| w[0].output_id().to_bytes() <= w[1].output_id().to_bytes());
        let outputs_sorted = self
            .outputs
            .windows(2)
            .all(|w| w[0].sort_key() <= w[1].sort_key());
        if !inputs_sorted || !outputs_sorted {
            return Err(MessageError::Unsorted);
        }

        if let Some(payload) = &self.payload {
            payload.validate()?;
        }
        Ok(())
    }

    /// Hash signed by every unlock block.
    pub fn hash(&self) -> MessageResult<[u8; 32]> {
        let bytes =
            bincode::serialize(self).map_err(|e| MessageError::Serialization(e.to_string()))?;
        Ok(ContentHasher::ESSENCE.hash(&bytes))
    }
}

/// Proof that an input may be spent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnlockBlock {
    Signature(SignatureUnlock),
    /// Reuses the signature block at the given position.
    Reference(u16),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureUnlock {
    #[serde(with = "tangle_types::serde_hex")]
    pub public_key: [u8; 32],
    pub signature: Signature,
}

/// A signed value transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    essence: Essence,
    unlock_blocks: Vec<UnlockBlock>,
}

impl TransactionPayload {
    pub fn new(essence: Essence, unlock_blocks: Vec<UnlockBlock>) -> MessageResult<Self> {
        let tx = Self {
            essence,
            unlock_blocks,
        };
        tx.validate()?;
        Ok(tx)
    }

    pub fn builder() -> TransactionBuilder {
        TransactionBuilder::new()
    }

    pub fn essence(&self) -> &Essence {
        &self.essence
    }

    pub fn unlock_blocks(&self) -> &[UnlockBlock] {
        &self.unlock_blocks
    }

    /// Content hash of the whole payload; outputs it creates are keyed by it.
    pub fn id(&self) -> MessageResult<TransactionId> {
        let bytes =
            bincode::serialize(self).map_err(|e| MessageError::Serialization(e.to_string()))?;
        Ok(TransactionId::from_hash(ContentHasher::TRANSACTION.hash(&bytes)))
    }

    /// Structural checks that need no ledger state.
    pub fn validate(&self) -> MessageResult<()> {
        self.essence.validate()?;
        if self.unlock_blocks.len() != self.essence.inputs.len() {
            return Err(MessageError::InvalidUnlock {
                index: self.unlock_blocks.len(),
                reason: format!(
                    "{} unlock blocks for {} inputs",
                    self.unlock_blocks.len(),
                    self.essence.inputs.len()
                ),
            });
        }
        for (index, block) in self.unlock_blocks.iter().enumerate() {
            if let UnlockBlock::Reference(target) = block {
                let target = usize::from(*target);
                let points_at_signature = target < index
                    && matches!(self.unlock_blocks[target], UnlockBlock::Signature(_));
                if !points_at_signature {
                    return Err(MessageError::InvalidUnlock {
                        index,
                        reason: format!("reference {target} does not name an earlier signature"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Check every unlock block against the address owning the matching
    /// input. `input_addresses` is aligned with [`Essence::inputs`].
    pub fn verify_signatures(&self, input_addresses: &[Address]) -> MessageResult<()> {
        self.validate()?;
        if input_addresses.len() != self.essence.inputs.len() {
            return Err(MessageError::InputCount(input_addresses.len()));
        }
        let essence_hash = self.essence.hash()?;
        for (index, (block, owner)) in self.unlock_blocks.iter().zip(input_addresses).enumerate() {
            let reason = match block {
                UnlockBlock::Signature(unlock) => {
                    let key = VerifyingKey::from_bytes(&unlock.public_key)?;
                    if key.to_address() != *owner {
                        Some("public key does not match input address".to_string())
                    } else if key.verify(&essence_hash, &unlock.signature).is_err() {
                        Some("signature does not verify".to_string())
                    } else {
                        None
                    }
                }
                UnlockBlock::Reference(target) => {
                    let target = usize::from(*target);
                    (input_addresses[target] != *owner)
                        .then(|| format!("referenced input {target} has a different address"))
                }
            };
            if let Some(reason) = reason {
                return Err(MessageError::InvalidUnlock { index, reason });
            }
        }
        Ok(())
    }
}

/// An output to spend together with the path of the key that owns it.
#[derive(Clone, Debug)]
pub struct InputSigningData {
    pub output: Output,
    pub path: DerivationPath,
}

/// Assembles and signs a [`TransactionPayload`].
#[derive(Default)]
pub struct TransactionBuilder {
    inputs: Vec<InputSigningData>,
    outputs: Vec<SignatureLockedOutput>,
    indexation: Option<IndexationPayload>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: InputSigningData) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = InputSigningData>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn with_output(mut self, output: SignatureLockedOutput) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = SignatureLockedOutput>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    pub fn with_indexation(mut self, indexation: IndexationPayload) -> Self {
        self.indexation = Some(indexation);
        self
    }

    /// Sort, validate and sign. Input and output totals must match.
    pub fn finish(mut self, seed: &Seed) -> MessageResult<TransactionPayload> {
        self.inputs
            .sort_by_key(|i| i.output.output_id.to_bytes());

        let input_total = self
            .inputs
            .iter()
            .try_fold(0u64, |acc, i| acc.checked_add(i.output.amount))
            .ok_or_else(|| MessageError::InvalidAmount("input total overflows".into()))?;
        let output_total = self
            .outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.amount))
            .ok_or_else(|| MessageError::InvalidAmount("output total overflows".into()))?;
        if input_total != output_total {
            return Err(MessageError::AmountMismatch {
                inputs: input_total,
                outputs: output_total,
            });
        }

        let essence = Essence::new(
            self.inputs
                .iter()
                .map(|i| UtxoInput::new(i.output.output_id))
                .collect(),
            self.outputs,
            self.indexation,
        )?;
        let essence_hash = essence.hash()?;

        let mut first_block: HashMap<Address, u16> = HashMap::new();
        let mut unlock_blocks = Vec::with_capacity(self.inputs.len());
        for (position, input) in self.inputs.iter().enumerate() {
            let owner = input.output.address;
            if let Some(&target) = first_block.get(&owner) {
                unlock_blocks.push(UnlockBlock::Reference(target));
                continue;
            }
            let key = AddressDeriver::derive_keypair(seed, &input.path)?;
            if key.address() != owner {
                return Err(MessageError::InputAddressMismatch {
                    output_id: input.output.output_id,
                    owner,
                });
            }
            // Bounded by MAX_INPUTS.
            first_block.insert(owner, position as u16);
            unlock_blocks.push(UnlockBlock::Signature(SignatureUnlock {
                public_key: key.verifying_key().as_bytes(),
                signature: key.sign(&essence_hash),
            }));
        }

        debug!(
            inputs = essence.inputs().len(),
            outputs = essence.outputs().len(),
            total = output_total,
            "signed transaction"
        );
        TransactionPayload::new(essence, unlock_blocks)
    }
}
