//! Transaction policy plugins.

use dbft_types::Transaction;

/// Filters the transaction set a primary proposes.
///
/// Plugins compose in registration order, each seeing the previous
/// plugin's output, so ordering is part of node configuration.
pub trait PolicyPlugin: Send + Sync {
    /// Reduce `transactions` to the subset this policy allows in the
    /// next block. Order must be preserved.
    fn filter_for_block(&self, transactions: Vec<Transaction>) -> Vec<Transaction>;
}

/// Caps the number of transactions per block.
#[derive(Debug, Clone, Copy)]
pub struct MaxTransactionsPolicy {
    /// Largest transaction count this policy lets through.
    pub limit: usize,
}

impl PolicyPlugin for MaxTransactionsPolicy {
    fn filter_for_block(&self, mut transactions: Vec<Transaction>) -> Vec<Transaction> {
        transactions.truncate(self.limit);
        transactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbft_types::UInt160;

    fn tx(nonce: u32) -> Transaction {
        Transaction {
            version: 0,
            nonce,
            sender: UInt160::ZERO,
            system_fee: 0,
            network_fee: 0,
            valid_until_block: 0,
            script: vec![],
            witness: None,
        }
    }

    #[test]
    fn test_truncates_in_order() {
        let policy = MaxTransactionsPolicy { limit: 2 };
        let filtered = policy.filter_for_block(vec![tx(1), tx(2), tx(3)]);
        assert_eq!(
            filtered.iter().map(|t| t.nonce).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }
}
