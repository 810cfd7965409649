//! Error types for the bingo round engine
//!
//! Every failure is a typed variant so callers can branch on it. Validation
//! and state errors leave the round untouched; settlement errors leave the
//! round finished but unsettled until a retry succeeds.

use crate::common::types::{Amount, CardNumber, PlayerId, RoundId, TableId};
use crate::config::ConfigValidationError;
use crate::games::types::RoundStatus;

/// Root error type for all engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Coarse classification of an [`EngineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    State,
    Ledger,
    Settlement,
    Configuration,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::State(_) => ErrorKind::State,
            EngineError::Ledger(_) => ErrorKind::Ledger,
            EngineError::Settlement(_) => ErrorKind::Settlement,
            EngineError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

/// Rejected registrations (bad card grid, duplicate card, bad stake)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid card grid: {0}")]
    InvalidGrid(String),

    #[error("Card {0} is already registered in this round")]
    DuplicateCard(CardNumber),

    #[error("Player {player_id} already holds {limit} card(s) in this round")]
    CardLimitReached { player_id: PlayerId, limit: usize },

    #[error("Stake {amount} is below the minimum of {minimum}")]
    InvalidStake { amount: Amount, minimum: Amount },

    #[error("Stake {amount} would overflow the round pool of {pool}")]
    PoolOverflow { amount: Amount, pool: Amount },
}

/// Wrong-phase calls
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("No round on table {0}")]
    NoRound(TableId),

    #[error("Round {0} has already been started")]
    AlreadyStarted(RoundId),

    #[error("Round {round_id} is not active (status: {status})")]
    NotActive { round_id: RoundId, status: RoundStatus },

    #[error("Not enough players: {actual} registered, {required} required")]
    NotEnoughPlayers { required: usize, actual: usize },

    #[error("Registration for round {0} is closed")]
    RegistrationClosed(RoundId),

    #[error("Round {0} is already finished")]
    AlreadyFinished(RoundId),
}

/// Failures reported by the ledger collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient funds for {player_id}: required {required}, available {available}")]
    InsufficientFunds {
        player_id: PlayerId,
        required: Amount,
        available: Amount,
    },

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Payout/refund could not be completed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("Settlement of round {round_id} incomplete: {source}")]
    LedgerFailed {
        round_id: RoundId,
        #[source]
        source: LedgerError,
    },

    #[error("Round {0} has no pending settlement")]
    NotPending(RoundId),
}

/// Every number in the domain has been called
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Draw domain exhausted")]
pub struct DrawExhausted;

/// Seed handling and draw replay failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    #[error(transparent)]
    Exhausted(#[from] DrawExhausted),

    #[error("Invalid draw seed: {0}")]
    InvalidSeed(String),
}

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Validation(#[from] ConfigValidationError),
}

// Convenience type alias for Results
pub type EngineResult<T> = Result<T, EngineError>;

impl From<ConfigValidationError> for EngineError {
    fn from(e: ConfigValidationError) -> Self {
        EngineError::Configuration(ConfigurationError::Validation(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let error: EngineError = ValidationError::DuplicateCard(12).into();
        assert!(error.to_string().contains("Validation error"));
        assert!(error.to_string().contains("Card 12"));
    }

    #[test]
    fn test_error_kind() {
        let error: EngineError = StateError::NotActive {
            round_id: 4,
            status: RoundStatus::Finished,
        }
        .into();
        assert_eq!(error.kind(), ErrorKind::State);
        assert!(error.to_string().contains("finished"));
    }

    #[test]
    fn test_settlement_error_source() {
        let error = SettlementError::LedgerFailed {
            round_id: 9,
            source: LedgerError::Unavailable("timeout".to_string()),
        };
        assert!(error.source().is_some());
        assert!(error.to_string().contains("round 9"));
    }

    #[test]
    fn test_config_validation_conversion() {
        let error: EngineError =
            ConfigValidationError::InvalidValue("min_players must be > 0".to_string()).into();
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }
}
