//! Configuration management with validation and defaults
//!
//! Round policy, settlement retry behaviour, draw scheduling and logging
//! live here. Every section has a `Default`, and `validate` rejects
//! combinations the engine cannot honour.

use crate::common::types::Amount;
use crate::games::types::WinPattern;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Basis points in a whole pool
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Top-level engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BingoConfig {
    pub round: RoundConfig,
    pub settlement: SettlementConfig,
    pub schedule: ScheduleConfig,
    pub monitoring: MonitoringConfig,
}

/// Per-round policy
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Participants required before a round may start
    pub min_players: usize,
    /// Cards a single player may hold in one round; the stake is paid per card
    pub max_cards_per_player: usize,
    pub min_stake: Amount,
    /// House share of the pool in basis points (1000 = 10%)
    pub admin_cut_bps: u32,
    pub win_pattern: WinPattern,
    /// Ledger account credited with the admin cut
    pub house_account: String,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_cards_per_player: 1,
            min_stake: 10,
            admin_cut_bps: 1_000,
            win_pattern: WinPattern::AnyLine,
            house_account: "house".to_string(),
        }
    }
}

/// Settlement retry behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Attempts before a settlement is escalated for manual intervention
    pub max_attempts: u32,
    pub retry_interval_ms: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_interval_ms: 5_000,
        }
    }
}

/// Timer settings used by the host that drives draws
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub draw_interval_ms: u64,
    /// Registration window before the host starts a round
    pub registration_window_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            draw_interval_ms: 3_000,
            registration_window_ms: 30_000,
        }
    }
}

/// Logging and metrics
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Default `EnvFilter` directive for this level
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            log_level: LogLevel::Info,
        }
    }
}

impl BingoConfig {
    /// Fast rounds for local testing: one player suffices, short timers
    pub fn quick_play() -> Self {
        Self {
            round: RoundConfig {
                min_players: 1,
                min_stake: 1,
                ..Default::default()
            },
            settlement: SettlementConfig {
                max_attempts: 3,
                retry_interval_ms: 200,
            },
            schedule: ScheduleConfig {
                draw_interval_ms: 100,
                registration_window_ms: 0,
            },
            monitoring: MonitoringConfig {
                log_level: LogLevel::Debug,
                ..Default::default()
            },
        }
    }

    /// Settings for a live group table
    pub fn production() -> Self {
        Self {
            round: RoundConfig {
                min_players: 3,
                ..Default::default()
            },
            settlement: SettlementConfig {
                max_attempts: 10,
                retry_interval_ms: 15_000,
            },
            schedule: ScheduleConfig {
                draw_interval_ms: 5_000,
                registration_window_ms: 60_000,
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.round.min_players == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "min_players must be > 0".to_string(),
            ));
        }

        if self.round.max_cards_per_player == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "max_cards_per_player must be > 0".to_string(),
            ));
        }

        if self.round.min_stake == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "min_stake must be > 0".to_string(),
            ));
        }

        if self.round.admin_cut_bps > BPS_DENOMINATOR {
            return Err(ConfigValidationError::InvalidValue(format!(
                "admin_cut_bps must be <= {}",
                BPS_DENOMINATOR
            )));
        }

        if self.round.house_account.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "round.house_account".to_string(),
            ));
        }

        if self.settlement.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "settlement.max_attempts must be > 0".to_string(),
            ));
        }

        if self.schedule.draw_interval_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "draw_interval_ms must be > 0".to_string(),
            ));
        }

        if self.settlement.retry_interval_ms == 0 {
            return Err(ConfigValidationError::LogicalInconsistency(
                "settlement retries need a non-zero interval".to_string(),
            ));
        }

        Ok(())
    }

    pub fn draw_interval(&self) -> Duration {
        Duration::from_millis(self.schedule.draw_interval_ms)
    }

    pub fn registration_window(&self) -> Duration {
        Duration::from_millis(self.schedule.registration_window_ms)
    }

    pub fn settlement_retry_interval(&self) -> Duration {
        Duration::from_millis(self.settlement.retry_interval_ms)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    InvalidValue(String),
    LogicalInconsistency(String),
    MissingRequired(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValidationError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
            ConfigValidationError::LogicalInconsistency(msg) => write!(f, "Configuration logical inconsistency: {}", msg),
            ConfigValidationError::MissingRequired(msg) => write!(f, "Missing required configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BingoConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(BingoConfig::quick_play().validate().is_ok());
        assert!(BingoConfig::production().validate().is_ok());
    }

    #[test]
    fn test_admin_cut_above_whole_pool_rejected() {
        let mut config = BingoConfig::default();
        config.round.admin_cut_bps = 10_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_house_account_rejected() {
        let mut config = BingoConfig::default();
        config.round.house_account = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_duration_conversions() {
        let config = BingoConfig::default();
        assert_eq!(config.draw_interval(), Duration::from_millis(3_000));
        assert_eq!(config.settlement_retry_interval(), Duration::from_millis(5_000));
    }
}
