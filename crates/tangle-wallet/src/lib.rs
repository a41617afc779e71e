//! Output queries and balance scanning for the tangle client.
//!
//! [`OutputIndex`] answers "what outputs does this address hold right now".
//! [`BalanceAggregator`] walks the addresses derived from a seed in batches,
//! stopping after a run of unused indices (the gap limit), and builds balance,
//! unspent-address and input-selection answers on top of that walk.

pub mod aggregator;
pub mod error;
pub mod output_index;

pub use aggregator::{
    BalanceAggregator, InputSelection, ScanHalt, ScanOptions, ScannedAddress, DEFAULT_BATCH_SIZE,
    DEFAULT_GAP_LIMIT,
};
pub use error::{WalletError, WalletResult};
pub use output_index::{AddressOutputs, OutputIndex};
