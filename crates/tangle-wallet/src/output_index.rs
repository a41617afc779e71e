use std::sync::Arc;

use futures::future::try_join_all;
use tangle_node::NodeApi;
use tangle_types::{Address, Output, OutputId};
use tracing::debug;

use crate::error::WalletResult;

/// Every output of one address as observed at query time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressOutputs {
    pub address: Address,
    /// Spent and unspent, in output id order.
    pub outputs: Vec<Output>,
}

impl AddressOutputs {
    /// No output was ever locked to the address.
    pub fn is_unused(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn unspent(&self) -> impl Iterator<Item = &Output> {
        self.outputs.iter().filter(|o| !o.is_spent)
    }

    /// Sum of unspent amounts.
    pub fn balance(&self) -> u64 {
        self.outputs.iter().map(Output::unspent_amount).sum()
    }
}

/// Output lookups against a node. Holds no cache; every call re-queries.
#[derive(Clone)]
pub struct OutputIndex {
    node: Arc<dyn NodeApi>,
}

impl OutputIndex {
    pub fn new(node: Arc<dyn NodeApi>) -> Self {
        Self { node }
    }

    /// All outputs of `address`. Details are fetched concurrently; any
    /// failed lookup fails the call.
    pub async fn outputs_for(&self, address: &Address) -> WalletResult<AddressOutputs> {
        let mut ids = self.node.get_address_outputs(address).await?;
        ids.sort();
        let outputs = try_join_all(ids.iter().map(|id| self.output_detail(id))).await?;
        debug!(address = %address.short_hex(), outputs = outputs.len(), "fetched address outputs");
        Ok(AddressOutputs {
            address: *address,
            outputs,
        })
    }

    pub async fn output_detail(&self, output_id: &OutputId) -> WalletResult<Output> {
        Ok(self.node.get_output(output_id).await?)
    }
}
