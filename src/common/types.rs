//! Shared type definitions for the bingo round engine
//!
//! Canonical identifiers and money types used by the engine and its
//! collaborators, so every layer agrees on the same shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Player identity as handed over by the chat layer (e.g. a Telegram user id)
pub type PlayerId = String;

/// Game table identity (one chat/group runs one table)
pub type TableId = String;

/// Engine-wide monotonic round identifier
pub type RoundId = u64;

/// Card ("cartela") number chosen by the player
pub type CardNumber = u32;

/// Money in the smallest indivisible unit (whole birr)
pub type Amount = u64;

/// Identifier returned by the ledger for every applied transfer
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the engine moves money.
///
/// The reason doubles as the idempotency key: a ledger must treat two calls
/// with the same player and the same key as one transfer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerReason {
    /// Entry stake for one card
    Stake { round_id: RoundId, card_number: CardNumber },
    /// Stake handed back because registration could not be completed
    StakeReturn { round_id: RoundId, card_number: CardNumber },
    /// Winner payout (pool minus admin cut)
    Payout { round_id: RoundId },
    /// House share of the pool
    AdminCut { round_id: RoundId },
    /// Full stake refund after exhaustion or abort
    Refund { round_id: RoundId },
}

impl LedgerReason {
    pub fn round_id(&self) -> RoundId {
        match self {
            LedgerReason::Stake { round_id, .. }
            | LedgerReason::StakeReturn { round_id, .. }
            | LedgerReason::Payout { round_id }
            | LedgerReason::AdminCut { round_id }
            | LedgerReason::Refund { round_id } => *round_id,
        }
    }

    /// Stable key, unique per (reason, player)
    pub fn idempotency_key(&self, player_id: &str) -> String {
        format!("{}:{}", self, player_id)
    }
}

impl fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerReason::Stake { round_id, card_number } => {
                write!(f, "round:{}:stake:card:{}", round_id, card_number)
            }
            LedgerReason::StakeReturn { round_id, card_number } => {
                write!(f, "round:{}:stake-return:card:{}", round_id, card_number)
            }
            LedgerReason::Payout { round_id } => write!(f, "round:{}:payout", round_id),
            LedgerReason::AdminCut { round_id } => write!(f, "round:{}:admin-cut", round_id),
            LedgerReason::Refund { round_id } => write!(f, "round:{}:refund", round_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_is_stable_per_player() {
        let reason = LedgerReason::Payout { round_id: 7 };
        assert_eq!(reason.idempotency_key("alice"), "round:7:payout:alice");
        assert_eq!(reason.idempotency_key("alice"), reason.clone().idempotency_key("alice"));
        assert_ne!(reason.idempotency_key("alice"), reason.idempotency_key("bob"));
    }

    #[test]
    fn test_reason_round_id() {
        let reason = LedgerReason::Stake { round_id: 3, card_number: 12 };
        assert_eq!(reason.round_id(), 3);
        assert_eq!(reason.to_string(), "round:3:stake:card:12");
    }
}
