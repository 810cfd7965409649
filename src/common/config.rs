//! Configuration loading for the bingo engine
//!
//! Reads an optional TOML file, applies `BINGO_*` environment overrides and
//! validates the result.

use crate::config::BingoConfig;
use crate::errors::{ConfigurationError, EngineResult};
use crate::games::types::WinPattern;
use std::env;
use std::path::Path;
use std::str::FromStr;

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> EngineResult<BingoConfig> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit variable lookup
    pub fn load_with(&self, lookup: impl Fn(&str) -> Option<String>) -> EngineResult<BingoConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => BingoConfig::default(),
        };

        apply_overrides_from(&mut config, lookup)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> EngineResult<BingoConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    /// Write a configuration out as TOML
    pub fn save(&self, config: &BingoConfig, path: &str) -> EngineResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

fn parse_var<T: FromStr>(field: &str, value: String, reason: &str) -> Result<T, ConfigurationError> {
    value.parse().map_err(|_| ConfigurationError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}

/// Apply `BINGO_*` overrides found through `lookup`
pub fn apply_overrides_from(
    config: &mut BingoConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigurationError> {
    // Round policy
    if let Some(value) = lookup("BINGO_MIN_PLAYERS") {
        config.round.min_players = parse_var("BINGO_MIN_PLAYERS", value, "Invalid player count")?;
    }
    if let Some(value) = lookup("BINGO_MAX_CARDS_PER_PLAYER") {
        config.round.max_cards_per_player =
            parse_var("BINGO_MAX_CARDS_PER_PLAYER", value, "Invalid card count")?;
    }
    if let Some(value) = lookup("BINGO_MIN_STAKE") {
        config.round.min_stake = parse_var("BINGO_MIN_STAKE", value, "Invalid amount")?;
    }
    if let Some(value) = lookup("BINGO_ADMIN_CUT_BPS") {
        config.round.admin_cut_bps = parse_var("BINGO_ADMIN_CUT_BPS", value, "Invalid basis points")?;
    }
    if let Some(value) = lookup("BINGO_HOUSE_ACCOUNT") {
        config.round.house_account = value;
    }
    if let Some(value) = lookup("BINGO_WIN_PATTERN") {
        config.round.win_pattern = match value.to_ascii_lowercase().as_str() {
            "any_line" | "line" => WinPattern::AnyLine,
            "four_corners" | "corners" => WinPattern::FourCorners,
            "full_card" | "full" => WinPattern::FullCard,
            _ => {
                return Err(ConfigurationError::InvalidValue {
                    field: "BINGO_WIN_PATTERN".to_string(),
                    value,
                    reason: "Expected any_line, four_corners or full_card".to_string(),
                })
            }
        };
    }

    // Scheduling
    if let Some(value) = lookup("BINGO_DRAW_INTERVAL_MS") {
        config.schedule.draw_interval_ms = parse_var("BINGO_DRAW_INTERVAL_MS", value, "Invalid interval")?;
    }

    // Settlement
    if let Some(value) = lookup("BINGO_SETTLEMENT_MAX_ATTEMPTS") {
        config.settlement.max_attempts =
            parse_var("BINGO_SETTLEMENT_MAX_ATTEMPTS", value, "Invalid attempt count")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_load_defaults_without_file() {
        let config = ConfigLoader::new().load_with(|_| None).unwrap();
        assert_eq!(config.round.min_players, 2);
        assert_eq!(config.round.admin_cut_bps, 1_000);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[round]\nmin_players = 3\nmin_stake = 20\nwin_pattern = \"four_corners\"\n\n[schedule]\ndraw_interval_ms = 500"
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_path(file.path())
            .load_with(|_| None)
            .unwrap();
        assert_eq!(config.round.min_players, 3);
        assert_eq!(config.round.min_stake, 20);
        assert_eq!(config.round.win_pattern, WinPattern::FourCorners);
        assert_eq!(config.schedule.draw_interval_ms, 500);
        // Untouched sections keep their defaults
        assert_eq!(config.settlement.max_attempts, 5);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bingo.toml");
        let path = path.to_str().unwrap();

        let loader = ConfigLoader::new();
        loader.save(&BingoConfig::production(), path).unwrap();
        let config = ConfigLoader::new().with_path(path).load_with(|_| None).unwrap();
        assert_eq!(config.round.min_players, 3);
    }

    #[test]
    fn test_env_overrides() {
        let env = vars(&[
            ("BINGO_MIN_PLAYERS", "4"),
            ("BINGO_ADMIN_CUT_BPS", "500"),
            ("BINGO_HOUSE_ACCOUNT", "arada-house"),
            ("BINGO_WIN_PATTERN", "full_card"),
        ]);
        let config = ConfigLoader::new().load_with(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.round.min_players, 4);
        assert_eq!(config.round.admin_cut_bps, 500);
        assert_eq!(config.round.house_account, "arada-house");
        assert_eq!(config.round.win_pattern, WinPattern::FullCard);
    }

    #[test]
    fn test_invalid_override_reports_field() {
        let env = vars(&[("BINGO_MIN_STAKE", "ten")]);
        let err = ConfigLoader::new().load_with(|k| env.get(k).cloned()).unwrap_err();
        match err {
            EngineError::Configuration(ConfigurationError::InvalidValue { field, value, .. }) => {
                assert_eq!(field, "BINGO_MIN_STAKE");
                assert_eq!(value, "ten");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_overrides_are_validated() {
        let env = vars(&[("BINGO_ADMIN_CUT_BPS", "20000")]);
        assert!(ConfigLoader::new().load_with(|k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn test_missing_file_fails_to_load() {
        let err = ConfigLoader::new()
            .with_path("/definitely/not/here.toml")
            .load_with(|_| None)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Configuration(ConfigurationError::LoadFailed(_))
        ));
    }
}
