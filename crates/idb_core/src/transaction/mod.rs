//! Transactions and their scheduling.
//!
//! A transaction runs its requests in issuance order once the scheduler
//! lets it start. Writes snapshot each touched store first so an abort can
//! put it back; upgrade transactions snapshot the whole schema up front.

mod scheduler;
mod state;

pub use state::{Durability, TransactionMode, TransactionOptions, TransactionState};

pub(crate) use scheduler::can_start;
pub(crate) use state::{QueuedOperation, TransactionData, UpgradeState};
