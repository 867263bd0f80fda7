//! Process-wide settings consulted by the lag-compensation gate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{HistoryDepth, NetworkRole, TIC_RATE};

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A history ring must retain at least one tick.
    #[error("history depth must retain at least one tick")]
    ZeroHistoryDepth,
    /// The simulation must advance at least one tick per second.
    #[error("tic rate must be at least one tick per second")]
    ZeroTicRate,
    /// The settings document could not be parsed.
    #[error("could not parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Lag-compensation toggle and history window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagCompensationConfig {
    /// Master switch for backwards reconciliation.
    pub enabled: bool,
    /// Number of past ticks retained per tracked entity.
    pub history_depth: HistoryDepth,
}

impl Default for LagCompensationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_depth: HistoryDepth::DEFAULT,
        }
    }
}

/// Settings of the simulation process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Network role the process runs under.
    pub role: NetworkRole,
    /// Simulation ticks per second.
    pub tic_rate: u32,
    /// Lag-compensation settings.
    pub lag_compensation: LagCompensationConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            role: NetworkRole::Server,
            tic_rate: TIC_RATE,
            lag_compensation: LagCompensationConfig::default(),
        }
    }
}

impl ServerSettings {
    /// Parses and validates settings from a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects settings the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tic_rate == 0 {
            return Err(ConfigError::ZeroTicRate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = ServerSettings::from_toml_str("").expect("defaults parse");
        assert_eq!(settings, ServerSettings::default());
        assert_eq!(settings.tic_rate, 35);
        assert!(settings.lag_compensation.enabled);
    }

    #[test]
    fn parses_role_and_window() {
        let settings = ServerSettings::from_toml_str(
            r#"
            role = "client"
            tic_rate = 70

            [lag_compensation]
            enabled = false
            history_depth = 16
            "#,
        )
        .expect("settings parse");

        assert_eq!(settings.role, NetworkRole::Client);
        assert_eq!(settings.tic_rate, 70);
        assert!(!settings.lag_compensation.enabled);
        assert_eq!(settings.lag_compensation.history_depth.get(), 16);
    }

    #[test]
    fn zero_history_depth_is_rejected() {
        let result = ServerSettings::from_toml_str(
            r#"
            [lag_compensation]
            history_depth = 0
            "#,
        );
        assert!(result.is_err(), "zero depth must not parse");
    }

    #[test]
    fn zero_tic_rate_is_rejected() {
        let result = ServerSettings::from_toml_str("tic_rate = 0");
        assert!(matches!(result, Err(ConfigError::ZeroTicRate)));
    }

    #[test]
    fn settings_round_trip_through_bincode() {
        let settings = ServerSettings {
            role: NetworkRole::DemoPlayback,
            tic_rate: 35,
            lag_compensation: LagCompensationConfig {
                enabled: false,
                history_depth: HistoryDepth::new(8).expect("non-zero depth"),
            },
        };
        let bytes = bincode::serialize(&settings).expect("serialize");
        let restored: ServerSettings = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, settings);
    }
}
