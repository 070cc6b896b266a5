//! Transaction start ordering.
//!
//! Transactions whose scopes overlap run one at a time in creation order.
//! Readonly transactions never block each other. A versionchange
//! transaction overlaps everything in its database.

use super::state::{TransactionData, TransactionMode};
use crate::types::TransactionId;
use std::collections::BTreeMap;

/// Returns true if no earlier unfinished transaction blocks `id`.
///
/// Ids grow in creation order, so the transactions created before `id`
/// are exactly the ones ordered before it in the map.
pub(crate) fn can_start(
    transactions: &BTreeMap<TransactionId, TransactionData>,
    id: TransactionId,
) -> bool {
    let Some(txn) = transactions.get(&id) else {
        return false;
    };
    transactions
        .range(..id)
        .map(|(_, other)| other)
        .filter(|other| !other.is_finished())
        .filter(|other| {
            !(other.mode == TransactionMode::ReadOnly && txn.mode == TransactionMode::ReadOnly)
        })
        .all(|other| !other.overlaps(txn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::state::TransactionState;
    use crate::transaction::Durability;
    use crate::types::{ConnectionId, StoreId};

    fn txn(id: u64, mode: TransactionMode, scope: &[u64]) -> TransactionData {
        TransactionData::new(
            TransactionId(id),
            ConnectionId(1),
            "db".into(),
            mode,
            Durability::Default,
            scope.iter().copied().map(StoreId).collect(),
        )
    }

    fn map(txns: Vec<TransactionData>) -> BTreeMap<TransactionId, TransactionData> {
        txns.into_iter().map(|t| (t.id, t)).collect()
    }

    #[test]
    fn overlapping_writers_wait_for_earlier_ones() {
        let mut txns = map(vec![
            txn(1, TransactionMode::ReadWrite, &[1]),
            txn(2, TransactionMode::ReadWrite, &[1]),
            txn(3, TransactionMode::ReadWrite, &[2]),
        ]);
        assert!(can_start(&txns, TransactionId(1)));
        assert!(!can_start(&txns, TransactionId(2)));
        assert!(can_start(&txns, TransactionId(3)));

        txns.get_mut(&TransactionId(1)).unwrap().state = TransactionState::Finished;
        assert!(can_start(&txns, TransactionId(2)));
    }

    #[test]
    fn readers_share() {
        let txns = map(vec![
            txn(1, TransactionMode::ReadOnly, &[1]),
            txn(2, TransactionMode::ReadOnly, &[1]),
            txn(3, TransactionMode::ReadWrite, &[1]),
            txn(4, TransactionMode::ReadOnly, &[1]),
        ]);
        assert!(can_start(&txns, TransactionId(2)));
        assert!(!can_start(&txns, TransactionId(3)));
        // A reader created after a pending writer waits for it.
        assert!(!can_start(&txns, TransactionId(4)));
    }

    #[test]
    fn upgrades_block_everything() {
        let txns = map(vec![
            txn(1, TransactionMode::VersionChange, &[]),
            txn(2, TransactionMode::ReadOnly, &[9]),
        ]);
        assert!(!can_start(&txns, TransactionId(2)));
    }

    #[test]
    fn unknown_ids_never_start() {
        assert!(!can_start(&BTreeMap::new(), TransactionId(1)));
    }
}
