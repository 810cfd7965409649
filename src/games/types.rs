use crate::common::types::{Amount, CardNumber, PlayerId, RoundId, TableId};
use crate::games::settlement::SettlementStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Round lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Pending,
    Active,
    Finished,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundStatus::Pending => write!(f, "pending"),
            RoundStatus::Active => write!(f, "active"),
            RoundStatus::Finished => write!(f, "finished"),
        }
    }
}

/// How a round reached `Finished`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Won,
    Exhausted,
    Aborted,
}

/// Win rule evaluated against a card's marks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WinPattern {
    /// Any complete row, column or diagonal
    #[default]
    AnyLine,
    FourCorners,
    FullCard,
}

/// The line that completed a card
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "line", content = "index", rename_all = "snake_case")]
pub enum WinningLine {
    Row(u8),
    Column(u8),
    Diagonal,
    AntiDiagonal,
    FourCorners,
    FullCard,
}

/// Which card a player wants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardSelection {
    /// Pre-printed cartela derived from its number
    Catalogue { card_number: CardNumber },
    /// Explicit 25-cell grid, row-major, free centre as 0
    Custom {
        card_number: CardNumber,
        numbers: Vec<u8>,
    },
}

impl CardSelection {
    pub fn catalogue(card_number: CardNumber) -> Self {
        CardSelection::Catalogue { card_number }
    }

    pub fn card_number(&self) -> CardNumber {
        match self {
            CardSelection::Catalogue { card_number } | CardSelection::Custom { card_number, .. } => {
                *card_number
            }
        }
    }
}

/// Declared winner of a round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Winner {
    pub player_id: PlayerId,
    pub card_number: CardNumber,
    pub line: WinningLine,
    /// Credited to the winner: pool minus admin cut
    pub payout: Amount,
}

/// Result of one `draw_next`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DrawOutcome {
    /// Number called, nobody completed the pattern yet
    Called { round_id: RoundId, number: u8 },
    /// Number called and it completed a card
    Won {
        round_id: RoundId,
        number: u8,
        winner: Winner,
    },
    /// No numbers left and no winner; the round is refunded
    Exhausted { round_id: RoundId },
}

impl DrawOutcome {
    pub fn round_id(&self) -> RoundId {
        match self {
            DrawOutcome::Called { round_id, .. }
            | DrawOutcome::Won { round_id, .. }
            | DrawOutcome::Exhausted { round_id } => *round_id,
        }
    }

    pub fn number(&self) -> Option<u8> {
        match self {
            DrawOutcome::Called { number, .. } | DrawOutcome::Won { number, .. } => Some(*number),
            DrawOutcome::Exhausted { .. } => None,
        }
    }

    pub fn winner(&self) -> Option<&Winner> {
        match self {
            DrawOutcome::Won { winner, .. } => Some(winner),
            _ => None,
        }
    }

    pub fn has_winner(&self) -> bool {
        self.winner().is_some()
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, DrawOutcome::Called { .. })
    }
}

/// Point-in-time snapshot of a round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundSummary {
    pub table_id: TableId,
    pub round_id: RoundId,
    pub status: RoundStatus,
    pub participant_count: usize,
    pub pool: Amount,
    pub admin_cut: Amount,
    pub called_numbers: Vec<u8>,
    pub winner: Option<Winner>,
    pub finish_reason: Option<FinishReason>,
    /// Hex sha256 of the draw seed, published when the round opens
    pub seed_commitment: String,
    /// Hex draw seed, revealed once the round is finished
    pub revealed_seed: Option<String>,
    pub settlement: Option<SettlementStatus>,
}

/// One of a player's cards with its marks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardView {
    pub table_id: TableId,
    pub round_id: RoundId,
    pub card_number: CardNumber,
    pub numbers: Vec<u8>,
    pub marked: Vec<u8>,
}

/// Summary and every seated card, read under one lock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSnapshot {
    pub summary: RoundSummary,
    pub cards: BTreeMap<PlayerId, Vec<CardView>>,
}

/// All-time standing of one player
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub wins: u64,
    pub total_earnings: Amount,
}

/// Events pushed to the notifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoundEvent {
    RoundOpened {
        table_id: TableId,
        round_id: RoundId,
        seed_commitment: String,
    },
    PlayerJoined {
        table_id: TableId,
        round_id: RoundId,
        player_id: PlayerId,
        card_number: CardNumber,
    },
    RoundStarted {
        table_id: TableId,
        round_id: RoundId,
        participant_count: usize,
        pool: Amount,
    },
    NumberCalled {
        table_id: TableId,
        round_id: RoundId,
        number: u8,
        call: String,
        call_index: usize,
    },
    RoundWon {
        table_id: TableId,
        round_id: RoundId,
        winner: Winner,
    },
    RoundRefunded {
        table_id: TableId,
        round_id: RoundId,
        reason: FinishReason,
    },
    SettlementFailed {
        table_id: TableId,
        round_id: RoundId,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_outcome_helpers() {
        let called = DrawOutcome::Called { round_id: 1, number: 42 };
        assert_eq!(called.number(), Some(42));
        assert!(!called.is_finished());
        assert!(!called.has_winner());

        let exhausted = DrawOutcome::Exhausted { round_id: 1 };
        assert_eq!(exhausted.number(), None);
        assert!(exhausted.is_finished());
    }

    #[test]
    fn test_card_selection_serialization() {
        let selection = CardSelection::catalogue(17);
        let json = serde_json::to_value(&selection).unwrap();
        assert_eq!(json["type"], "catalogue");
        assert_eq!(json["card_number"], 17);
        assert_eq!(selection.card_number(), 17);
    }

    #[test]
    fn test_event_tagging() {
        let event = RoundEvent::NumberCalled {
            table_id: "t".to_string(),
            round_id: 2,
            number: 7,
            call: "B-7".to_string(),
            call_index: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "number_called");
    }
}
