use std::ops::ControlFlow;
use std::sync::Arc;

use futures::future::try_join_all;
use tangle_crypto::AddressDeriver;
use tangle_message::{InputSigningData, MAX_INPUTS};
use tangle_node::NodeApi;
use tangle_types::{Address, DerivationPath, Seed, HARDENED_OFFSET};
use tracing::debug;

use crate::error::{WalletError, WalletResult};
use crate::output_index::{AddressOutputs, OutputIndex};

/// Consecutive unused indices tolerated before a scan stops.
pub const DEFAULT_GAP_LIMIT: u32 = 20;
/// Indices derived and queried per round trip.
pub const DEFAULT_BATCH_SIZE: u32 = 10;

/// Where and how far to scan below an account path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    pub account: DerivationPath,
    pub start_index: u32,
    pub gap_limit: u32,
    pub batch_size: u32,
    /// Exclusive upper index.
    pub upper_bound: Option<u32>,
    /// Also scan the internal (change) chain.
    pub include_internal: bool,
}

impl ScanOptions {
    pub fn new(account: DerivationPath) -> Self {
        Self {
            account,
            start_index: 0,
            gap_limit: DEFAULT_GAP_LIMIT,
            batch_size: DEFAULT_BATCH_SIZE,
            upper_bound: None,
            include_internal: true,
        }
    }

    pub fn with_start_index(mut self, start_index: u32) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn with_gap_limit(mut self, gap_limit: u32) -> Self {
        self.gap_limit = gap_limit;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_upper_bound(mut self, upper_bound: u32) -> Self {
        self.upper_bound = Some(upper_bound);
        self
    }

    pub fn public_only(mut self) -> Self {
        self.include_internal = false;
        self
    }

    fn validate(&self) -> WalletResult<()> {
        if self.gap_limit == 0 {
            return Err(WalletError::InvalidOptions("gap limit must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(WalletError::InvalidOptions("batch size must be at least 1".into()));
        }
        if self.start_index >= HARDENED_OFFSET {
            return Err(WalletError::InvalidOptions(format!(
                "start index {} outside the hardened index space",
                self.start_index
            )));
        }
        Ok(())
    }
}

/// One derived address visited by a scan.
#[derive(Clone, Debug)]
pub struct ScannedAddress {
    pub index: u32,
    pub internal: bool,
    pub path: DerivationPath,
    pub outputs: AddressOutputs,
}

/// Why a scan stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanHalt {
    GapLimit,
    UpperBound,
    /// The visitor asked to stop.
    Satisfied,
}

/// Inputs chosen to cover an amount.
#[derive(Clone, Debug, Default)]
pub struct InputSelection {
    pub inputs: Vec<InputSigningData>,
    pub total: u64,
    /// Highest address index an input came from.
    pub last_index: Option<u32>,
}

impl InputSelection {
    /// What is left over after paying `amount`.
    pub fn remainder(&self, amount: u64) -> u64 {
        self.total.saturating_sub(amount)
    }
}

/// Gap-limited scans over the addresses of a seed.
///
/// Addresses are derived in batches; each batch is queried concurrently and
/// then visited in strictly increasing index order, public before internal.
/// An index counts as unused when none of its scanned chains has ever held
/// an output. Node failures fail the whole scan.
#[derive(Clone)]
pub struct BalanceAggregator {
    index: OutputIndex,
}

impl BalanceAggregator {
    pub fn new(node: Arc<dyn NodeApi>) -> Self {
        Self {
            index: OutputIndex::new(node),
        }
    }

    pub fn output_index(&self) -> &OutputIndex {
        &self.index
    }

    /// Visit addresses until the gap limit, the upper bound, or the visitor
    /// stops the scan.
    pub async fn scan<F>(&self, seed: &Seed, options: &ScanOptions, mut visit: F) -> WalletResult<ScanHalt>
    where
        F: FnMut(&ScannedAddress) -> ControlFlow<()>,
    {
        options.validate()?;
        let chains: &[bool] = if options.include_internal {
            &[false, true]
        } else {
            &[false]
        };
        let limit = options
            .upper_bound
            .unwrap_or(HARDENED_OFFSET)
            .min(HARDENED_OFFSET);

        let mut next = options.start_index;
        let mut consecutive_empty = 0u32;
        loop {
            if next >= limit {
                return Ok(ScanHalt::UpperBound);
            }
            let count = options.batch_size.min(limit - next);

            let mut slots: Vec<(u32, bool, Address)> = Vec::with_capacity((count as usize) * chains.len());
            for &internal in chains {
                let chain = options.account.chain(internal);
                let addresses = AddressDeriver::derive_range(seed, &chain, next, count)?;
                slots.extend(
                    addresses
                        .into_iter()
                        .zip(next..)
                        .map(|(address, index)| (index, internal, address)),
                );
            }
            slots.sort_by_key(|&(index, internal, _)| (index, internal));
            debug!(start = next, count, chains = chains.len(), "scanning address batch");

            let found = try_join_all(slots.iter().map(|(_, _, address)| self.index.outputs_for(address))).await?;

            let mut used_at_index = false;
            for (position, ((index, internal, _), outputs)) in slots.into_iter().zip(found).enumerate() {
                used_at_index |= !outputs.is_unused();
                let scanned = ScannedAddress {
                    index,
                    internal,
                    path: options.account.address(internal, index).map_err(tangle_crypto::CryptoError::from)?,
                    outputs,
                };
                if visit(&scanned).is_break() {
                    return Ok(ScanHalt::Satisfied);
                }
                // Last chain of this index: settle the gap counter.
                if (position + 1) % chains.len() == 0 {
                    if used_at_index {
                        consecutive_empty = 0;
                    } else {
                        consecutive_empty += 1;
                    }
                    used_at_index = false;
                    if consecutive_empty >= options.gap_limit {
                        debug!(halted_at = index, "gap limit reached");
                        return Ok(ScanHalt::GapLimit);
                    }
                }
            }
            next += count;
        }
    }

    /// Sum of unspent outputs over every scanned address.
    pub async fn balance(&self, seed: &Seed, options: &ScanOptions) -> WalletResult<u64> {
        let mut total = 0u64;
        self.scan(seed, options, |scanned| {
            total = total.saturating_add(scanned.outputs.balance());
            ControlFlow::Continue(())
        })
        .await?;
        Ok(total)
    }

    /// First public address at or above `options.start_index` holding an
    /// unspent output. `None` when the scan halts without finding one.
    pub async fn first_unspent_address(
        &self,
        seed: &Seed,
        options: &ScanOptions,
    ) -> WalletResult<Option<(Address, u32)>> {
        let options = options.clone().public_only();
        let mut found = None;
        self.scan(seed, &options, |scanned| {
            if scanned.outputs.unspent().next().is_some() {
                found = Some((scanned.outputs.address, scanned.index));
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;
        Ok(found)
    }

    /// Greedily collect unspent outputs in scan order until they cover
    /// `amount`. An amount of zero selects nothing and touches no node.
    pub async fn select_inputs(
        &self,
        seed: &Seed,
        options: &ScanOptions,
        amount: u64,
    ) -> WalletResult<InputSelection> {
        let mut selection = InputSelection::default();
        if amount == 0 {
            return Ok(selection);
        }
        let mut too_many = false;
        self.scan(seed, options, |scanned| {
            for output in scanned.outputs.unspent() {
                if selection.inputs.len() == MAX_INPUTS {
                    too_many = true;
                    return ControlFlow::Break(());
                }
                selection.inputs.push(InputSigningData {
                    output: output.clone(),
                    path: scanned.path.clone(),
                });
                selection.total = selection.total.saturating_add(output.amount);
                selection.last_index = Some(selection.last_index.map_or(scanned.index, |i| i.max(scanned.index)));
                if selection.total >= amount {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        })
        .await?;

        if too_many {
            return Err(WalletError::TooManyInputs { max: MAX_INPUTS });
        }
        if selection.total < amount {
            return Err(WalletError::InsufficientBalance {
                required: amount,
                available: selection.total,
            });
        }
        debug!(
            inputs = selection.inputs.len(),
            total = selection.total,
            amount,
            "selected inputs"
        );
        Ok(selection)
    }
}
