//! Settlement System Module
//!
//! Splits a finished round's pool into ledger credits and applies them.
//! A settlement remembers which credits already went through, so a retry
//! after a ledger failure only repeats the missing ones (and the ledger's
//! idempotency key makes even a repeated credit harmless).

use crate::common::traits::Ledger;
use crate::common::types::{Amount, CardNumber, LedgerReason, PlayerId, RoundId, TableId, TransactionId};
use crate::config::BPS_DENOMINATOR;
use crate::errors::SettlementError;
use crate::games::types::{FinishReason, Winner};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Settlement status tracking
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Completed,
    /// A ledger call failed; retry with the same round id
    Unsettled,
    /// Retries exhausted; still listed and retryable by hand
    RequiresManualIntervention,
}

/// What the pool is paying for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementKind {
    WinPayout {
        winner: PlayerId,
        card_number: CardNumber,
        payout: Amount,
    },
    Refund { reason: FinishReason },
}

/// One ledger credit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    pub player_id: PlayerId,
    pub amount: Amount,
    pub reason: LedgerReason,
    /// Set once the ledger confirmed the credit
    pub transaction_id: Option<TransactionId>,
}

impl Transfer {
    fn new(player_id: PlayerId, amount: Amount, reason: LedgerReason) -> Self {
        Self {
            player_id,
            amount,
            reason,
            transaction_id: None,
        }
    }
}

/// Split a pool into `(winner_payout, admin_cut)`.
///
/// The cut is rounded down so the remainder always goes to the winner and
/// `payout + cut == pool` holds for every pool.
pub fn split_pool(pool: Amount, admin_cut_bps: u32) -> (Amount, Amount) {
    let bps = u128::from(admin_cut_bps.min(BPS_DENOMINATOR));
    let cut = (u128::from(pool) * bps / u128::from(BPS_DENOMINATOR)) as Amount;
    (pool - cut, cut)
}

/// Payment plan and progress for one finished round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub round_id: RoundId,
    pub table_id: TableId,
    pub kind: SettlementKind,
    pub transfers: Vec<Transfer>,
    pub status: SettlementStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Settlement {
    fn new(round_id: RoundId, table_id: TableId, kind: SettlementKind, transfers: Vec<Transfer>) -> Self {
        Self {
            round_id,
            table_id,
            kind,
            // Zero credits are skipped rather than sent to the ledger
            transfers: transfers.into_iter().filter(|t| t.amount > 0).collect(),
            status: SettlementStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Winner gets `pool - admin_cut`, house gets `admin_cut`
    pub fn win(
        round_id: RoundId,
        table_id: TableId,
        winner: &Winner,
        admin_cut: Amount,
        house_account: &str,
    ) -> Self {
        let transfers = vec![
            Transfer::new(
                winner.player_id.clone(),
                winner.payout,
                LedgerReason::Payout { round_id },
            ),
            Transfer::new(
                house_account.to_string(),
                admin_cut,
                LedgerReason::AdminCut { round_id },
            ),
        ];
        let kind = SettlementKind::WinPayout {
            winner: winner.player_id.clone(),
            card_number: winner.card_number,
            payout: winner.payout,
        };
        Self::new(round_id, table_id, kind, transfers)
    }

    /// Every participant gets their full stake back
    pub fn refund(
        round_id: RoundId,
        table_id: TableId,
        stakes: impl IntoIterator<Item = (PlayerId, Amount)>,
        reason: FinishReason,
    ) -> Self {
        let transfers = stakes
            .into_iter()
            .map(|(player_id, stake)| Transfer::new(player_id, stake, LedgerReason::Refund { round_id }))
            .collect();
        Self::new(round_id, table_id, SettlementKind::Refund { reason }, transfers)
    }

    pub fn is_complete(&self) -> bool {
        self.status == SettlementStatus::Completed
    }

    /// Sum of all credits in the plan
    pub fn total(&self) -> Amount {
        self.transfers.iter().map(|t| t.amount).sum()
    }

    /// Apply every outstanding credit.
    ///
    /// Stops at the first ledger failure, leaving the settlement `Unsettled`
    /// (or `RequiresManualIntervention` once `max_attempts` is reached).
    pub async fn execute(&mut self, ledger: &dyn Ledger, max_attempts: u32) -> Result<(), SettlementError> {
        self.attempts += 1;

        for transfer in self.transfers.iter_mut().filter(|t| t.transaction_id.is_none()) {
            match ledger.credit(&transfer.player_id, transfer.amount, &transfer.reason).await {
                Ok(transaction_id) => {
                    tracing::debug!(
                        round_id = self.round_id,
                        player_id = %transfer.player_id,
                        amount = transfer.amount,
                        %transaction_id,
                        "Settlement credit applied"
                    );
                    transfer.transaction_id = Some(transaction_id);
                }
                Err(source) => {
                    self.status = if self.attempts >= max_attempts {
                        SettlementStatus::RequiresManualIntervention
                    } else {
                        SettlementStatus::Unsettled
                    };
                    self.last_error = Some(source.to_string());
                    return Err(SettlementError::LedgerFailed {
                        round_id: self.round_id,
                        source,
                    });
                }
            }
        }

        self.status = SettlementStatus::Completed;
        self.last_error = None;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LedgerError;
    use crate::games::types::WinningLine;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Fails the first `failures` credits, then records the rest
    struct FlakyLedger {
        failures: Mutex<u32>,
        credited: Mutex<Vec<(String, Amount, String)>>,
    }

    impl FlakyLedger {
        fn new(failures: u32) -> Self {
            Self {
                failures: Mutex::new(failures),
                credited: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Ledger for FlakyLedger {
        async fn debit(&self, _player_id: &str, _amount: Amount, reason: &LedgerReason) -> Result<TransactionId, LedgerError> {
            Ok(TransactionId(reason.to_string()))
        }

        async fn credit(&self, player_id: &str, amount: Amount, reason: &LedgerReason) -> Result<TransactionId, LedgerError> {
            {
                let mut failures = self.failures.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(LedgerError::Unavailable("connection reset".to_string()));
                }
            }
            self.credited
                .lock()
                .push((player_id.to_string(), amount, reason.to_string()));
            Ok(TransactionId(reason.idempotency_key(player_id)))
        }
    }

    fn winner(payout: Amount) -> Winner {
        Winner {
            player_id: "alice".to_string(),
            card_number: 3,
            line: WinningLine::Row(0),
            payout,
        }
    }

    #[test]
    fn test_split_pool_boundaries() {
        assert_eq!(split_pool(30, 1_000), (27, 3));
        assert_eq!(split_pool(1, 1_000), (1, 0));
        assert_eq!(split_pool(0, 1_000), (0, 0));
        assert_eq!(split_pool(9, 1_000), (9, 0));
        assert_eq!(split_pool(10, 1_000), (9, 1));
        assert_eq!(split_pool(50, 0), (50, 0));
        assert_eq!(split_pool(50, 10_000), (0, 50));
    }

    #[test]
    fn test_split_pool_conserves_every_pool() {
        for bps in [0, 1, 250, 1_000, 3_333, 9_999, 10_000] {
            for pool in [0, 1, 2, 7, 29, 30, 31, 999, 1_000_003, u64::MAX] {
                let (payout, cut) = split_pool(pool, bps);
                assert_eq!(payout + cut, pool, "pool {} bps {}", pool, bps);
            }
        }
    }

    #[test]
    fn test_zero_admin_cut_is_not_sent() {
        let settlement = Settlement::win(1, "t".to_string(), &winner(1), 0, "house");
        assert_eq!(settlement.transfers.len(), 1);
        assert_eq!(settlement.total(), 1);
    }

    #[tokio::test]
    async fn test_win_settlement_credits_winner_and_house() {
        let ledger = FlakyLedger::new(0);
        let mut settlement = Settlement::win(4, "t".to_string(), &winner(27), 3, "house");

        settlement.execute(&ledger, 3).await.expect("settles");

        assert!(settlement.is_complete());
        let credited = ledger.credited.lock().clone();
        assert_eq!(
            credited,
            vec![
                ("alice".to_string(), 27, "round:4:payout".to_string()),
                ("house".to_string(), 3, "round:4:admin-cut".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_only_repeats_missing_credits() {
        let ledger = FlakyLedger::new(1);
        let mut settlement = Settlement::refund(
            8,
            "t".to_string(),
            vec![("a".to_string(), 10), ("b".to_string(), 10)],
            FinishReason::Exhausted,
        );

        let first = settlement.execute(&ledger, 3).await;
        assert!(matches!(first, Err(SettlementError::LedgerFailed { round_id: 8, .. })));
        assert_eq!(settlement.status, SettlementStatus::Unsettled);
        assert!(settlement.last_error.is_some());

        settlement.execute(&ledger, 3).await.expect("second attempt settles");
        assert!(settlement.is_complete());
        assert_eq!(settlement.attempts, 2);
        assert_eq!(ledger.credited.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_escalates_after_max_attempts() {
        let ledger = FlakyLedger::new(10);
        let mut settlement = Settlement::refund(
            2,
            "t".to_string(),
            vec![("a".to_string(), 10)],
            FinishReason::Aborted,
        );

        assert!(settlement.execute(&ledger, 2).await.is_err());
        assert_eq!(settlement.status, SettlementStatus::Unsettled);
        assert!(settlement.execute(&ledger, 2).await.is_err());
        assert_eq!(settlement.status, SettlementStatus::RequiresManualIntervention);
    }
}
