//! Collaborator interfaces
//!
//! The engine never owns balances or message delivery. It calls into a
//! `Ledger` to move money and a `Notifier` to announce round events; hosts
//! inject whichever implementations they run with.

use crate::common::types::{Amount, LedgerReason, PlayerId, TableId, TransactionId};
use crate::errors::LedgerError;
use crate::games::types::RoundEvent;
use async_trait::async_trait;

/// Balance and transaction store
///
/// Implementations must be idempotent per `(player_id, reason)`: repeating a
/// call that already succeeded returns the original transaction instead of
/// moving money twice. Settlement retries rely on this.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Take `amount` from the player, failing with `InsufficientFunds` if short
    async fn debit(
        &self,
        player_id: &str,
        amount: Amount,
        reason: &LedgerReason,
    ) -> Result<TransactionId, LedgerError>;

    /// Give `amount` to the player (winner, house or refund)
    async fn credit(
        &self,
        player_id: &str,
        amount: Amount,
        reason: &LedgerReason,
    ) -> Result<TransactionId, LedgerError>;
}

/// Recipient of a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyTarget {
    Player(PlayerId),
    Table(TableId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("No subscribers for {0:?}")]
    NoSubscribers(NotifyTarget),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Fire-and-forget event sink
///
/// Must not block; the engine logs a failure and carries on.
pub trait Notifier: Send + Sync {
    fn notify(&self, target: NotifyTarget, event: RoundEvent) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    // Mock implementations for testing
    struct CountingLedger {
        calls: AtomicU64,
    }

    #[async_trait]
    impl Ledger for CountingLedger {
        async fn debit(&self, _player_id: &str, _amount: Amount, reason: &LedgerReason) -> Result<TransactionId, LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransactionId(reason.to_string()))
        }

        async fn credit(&self, _player_id: &str, _amount: Amount, reason: &LedgerReason) -> Result<TransactionId, LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransactionId(reason.to_string()))
        }
    }

    #[tokio::test]
    async fn test_ledger_is_object_safe() {
        let ledger: Box<dyn Ledger> = Box::new(CountingLedger { calls: AtomicU64::new(0) });
        let tx = ledger
            .credit("alice", 5, &LedgerReason::Refund { round_id: 1 })
            .await
            .unwrap();
        assert_eq!(tx.0, "round:1:refund");
    }
}
