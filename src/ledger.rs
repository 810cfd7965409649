//! In-memory ledger
//!
//! Balances and a transaction log kept in process. Every transfer is keyed by
//! its reason and player, so repeating a call returns the first transaction
//! instead of moving money again.

use crate::common::traits::Ledger;
use crate::common::types::{Amount, LedgerReason, PlayerId, TransactionId};
use crate::errors::LedgerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Deposit,
    Debit,
    Credit,
}

/// One applied transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: TransactionId,
    pub player_id: PlayerId,
    pub kind: EntryKind,
    pub amount: Amount,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: DashMap<PlayerId, Amount>,
    applied: DashMap<String, TransactionId>,
    entries: Mutex<Vec<LedgerEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fund a player outside of any round
    pub fn deposit(&self, player_id: &str, amount: Amount) -> TransactionId {
        *self.balances.entry(player_id.to_string()).or_insert(0) += amount;
        self.record(player_id, EntryKind::Deposit, amount, "deposit".to_string())
    }

    pub fn balance(&self, player_id: &str) -> Amount {
        self.balances.get(player_id).map_or(0, |b| *b)
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().clone()
    }

    /// Entries tagged with a round
    pub fn entries_for_round(&self, round_id: u64) -> Vec<LedgerEntry> {
        let prefix = format!("round:{}:", round_id);
        self.entries
            .lock()
            .iter()
            .filter(|e| e.reason.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn record(&self, player_id: &str, kind: EntryKind, amount: Amount, reason: String) -> TransactionId {
        let transaction_id = TransactionId(Uuid::new_v4().to_string());
        self.entries.lock().push(LedgerEntry {
            transaction_id: transaction_id.clone(),
            player_id: player_id.to_string(),
            kind,
            amount,
            reason,
            timestamp: Utc::now(),
        });
        transaction_id
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn debit(&self, player_id: &str, amount: Amount, reason: &LedgerReason) -> Result<TransactionId, LedgerError> {
        // Holding the key's entry makes check-and-apply one step for concurrent repeats
        let applied = match self.applied.entry(reason.idempotency_key(player_id)) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(vacant) => vacant,
        };

        {
            let mut balance = self.balances.entry(player_id.to_string()).or_insert(0);
            if *balance < amount {
                return Err(LedgerError::InsufficientFunds {
                    player_id: player_id.to_string(),
                    required: amount,
                    available: *balance,
                });
            }
            *balance -= amount;
        }

        let transaction_id = self.record(player_id, EntryKind::Debit, amount, reason.to_string());
        applied.insert(transaction_id.clone());
        tracing::debug!(player_id, amount, %reason, "Ledger debit");
        Ok(transaction_id)
    }

    async fn credit(&self, player_id: &str, amount: Amount, reason: &LedgerReason) -> Result<TransactionId, LedgerError> {
        let applied = match self.applied.entry(reason.idempotency_key(player_id)) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(vacant) => vacant,
        };

        *self.balances.entry(player_id.to_string()).or_insert(0) += amount;
        let transaction_id = self.record(player_id, EntryKind::Credit, amount, reason.to_string());
        applied.insert(transaction_id.clone());
        tracing::debug!(player_id, amount, %reason, "Ledger credit");
        Ok(transaction_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_debit_and_insufficient_funds() {
        let ledger = InMemoryLedger::new();
        ledger.deposit("alice", 15);

        let stake = LedgerReason::Stake { round_id: 1, card_number: 4 };
        ledger.debit("alice", 10, &stake).await.unwrap();
        assert_eq!(ledger.balance("alice"), 5);

        let other = LedgerReason::Stake { round_id: 2, card_number: 4 };
        let err = ledger.debit("alice", 10, &other).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                player_id: "alice".to_string(),
                required: 10,
                available: 5,
            }
        );
        assert_eq!(ledger.balance("alice"), 5);
    }

    #[tokio::test]
    async fn test_repeated_calls_are_idempotent() {
        let ledger = InMemoryLedger::new();
        let payout = LedgerReason::Payout { round_id: 3 };

        let first = ledger.credit("bob", 27, &payout).await.unwrap();
        let second = ledger.credit("bob", 27, &payout).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.balance("bob"), 27);
        assert_eq!(ledger.entries_for_round(3).len(), 1);

        // Same reason for a different player is a different transfer
        ledger.credit("carol", 27, &payout).await.unwrap();
        assert_eq!(ledger.balance("carol"), 27);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_repeats_apply_once() {
        let ledger = std::sync::Arc::new(InMemoryLedger::new());
        ledger.deposit("dawit", 100);
        let payout = LedgerReason::Payout { round_id: 9 };
        let stake = LedgerReason::Stake { round_id: 9, card_number: 1 };

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = std::sync::Arc::clone(&ledger);
            let (payout, stake) = (payout.clone(), stake.clone());
            handles.push(tokio::spawn(async move {
                let credited = ledger.credit("eden", 27, &payout).await.unwrap();
                let debited = ledger.debit("dawit", 10, &stake).await.unwrap();
                (credited, debited)
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(ledger.balance("eden"), 27);
        assert_eq!(ledger.balance("dawit"), 90);
        assert_eq!(ledger.entries_for_round(9).len(), 2);
    }
}
