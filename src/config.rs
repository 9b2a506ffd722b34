//! Configuration management for Landau
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. Every section falls back to its defaults, so
//! a partial file only needs to name the values it changes.

mod defaults;

use crate::error::{LandauError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable pointing at an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "LANDAU_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote command simulation
    pub commands: CommandsConfig,

    /// Charging simulation
    pub charging: ChargingConfig,

    /// Initial vehicle state
    pub vehicle: VehicleConfig,

    /// Where JSON state files are kept
    pub persistence: PersistenceConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Timezone for schedule operations
    pub timezone: String,
}

/// Simulated latency and reliability of remote commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Probability (0..=1) that a command succeeds
    pub success_rate: f64,

    /// Lower bound of the simulated execution delay
    pub min_delay_ms: u64,

    /// Upper bound of the simulated execution delay
    pub max_delay_ms: u64,

    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

/// Battery and charger model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargingConfig {
    /// Usable battery capacity in kWh
    pub battery_capacity_kwh: f64,

    /// Peak rate of fast (Supercharger) locations
    pub max_charging_rate_kw: f64,

    /// Rate of destination (L2) chargers
    pub slow_charging_rate_kw: f64,

    pub fast_charger_voltage: f64,

    pub slow_charger_voltage: f64,

    /// Energy price used for session cost
    pub price_per_kwh: f64,

    /// Wall-clock time between simulation ticks
    pub tick_interval_ms: u64,

    /// Charging time represented by one tick
    pub simulated_seconds_per_tick: f64,

    /// Charge limit used until the user sets one
    pub default_charge_limit: u8,

    /// Number of finished sessions kept
    pub history_limit: usize,

    /// How long stop waits for the loop to exit
    pub stop_join_timeout_ms: u64,

    /// Always charge at this location instead of picking one at random
    pub location: Option<String>,

    /// Fixed RNG seed for location and station availability
    pub seed: Option<u64>,
}

/// Initial vehicle state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Named scenario used when no cached state exists
    pub scenario: String,

    /// Ignore the cached vehicle state on startup
    pub ignore_cache: bool,
}

/// File persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory holding the JSON state files
    pub data_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Console-specific level, falls back to `level`
    pub console_level: Option<String>,

    /// File-specific level, falls back to `level`
    pub file_level: Option<String>,

    /// Path to log file (or directory)
    pub file: String,

    /// Log format (structured or simple)
    pub format: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `LANDAU_CONFIG` or the default locations
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(LandauError::config(format!(
                    "{} points to a missing file: {}",
                    CONFIG_ENV_VAR,
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        let default_paths = [
            "landau_config.yaml",
            "/data/landau_config.yaml",
            "/etc/landau/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let commands = &self.commands;
        if !(0.0..=1.0).contains(&commands.success_rate) {
            return Err(LandauError::validation(
                "commands.success_rate",
                "Must be between 0 and 1",
            ));
        }
        if commands.min_delay_ms > commands.max_delay_ms {
            return Err(LandauError::validation(
                "commands.min_delay_ms",
                "Must not exceed commands.max_delay_ms",
            ));
        }

        let charging = &self.charging;
        let positive = [
            ("charging.battery_capacity_kwh", charging.battery_capacity_kwh),
            ("charging.max_charging_rate_kw", charging.max_charging_rate_kw),
            ("charging.slow_charging_rate_kw", charging.slow_charging_rate_kw),
            ("charging.fast_charger_voltage", charging.fast_charger_voltage),
            ("charging.slow_charger_voltage", charging.slow_charger_voltage),
            (
                "charging.simulated_seconds_per_tick",
                charging.simulated_seconds_per_tick,
            ),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(LandauError::validation(field, "Must be positive"));
            }
        }
        if !(charging.price_per_kwh.is_finite() && charging.price_per_kwh >= 0.0) {
            return Err(LandauError::validation(
                "charging.price_per_kwh",
                "Must not be negative",
            ));
        }
        if charging.tick_interval_ms == 0 {
            return Err(LandauError::validation(
                "charging.tick_interval_ms",
                "Must be greater than 0",
            ));
        }
        if !(1..=100).contains(&charging.default_charge_limit) {
            return Err(LandauError::validation(
                "charging.default_charge_limit",
                "Must be between 1 and 100",
            ));
        }
        if charging.history_limit == 0 {
            return Err(LandauError::validation(
                "charging.history_limit",
                "Must be greater than 0",
            ));
        }

        if self.persistence.data_dir.trim().is_empty() {
            return Err(LandauError::validation(
                "persistence.data_dir",
                "Cannot be empty",
            ));
        }

        if self.web.port == 0 {
            return Err(LandauError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(LandauError::validation(
                "timezone",
                "Unknown IANA timezone",
            ));
        }

        Ok(())
    }

    /// Parsed schedule timezone, UTC when the name is not recognised
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.commands.success_rate, 0.95);
        assert_eq!(config.commands.min_delay_ms, 1000);
        assert_eq!(config.commands.max_delay_ms, 3000);
        assert_eq!(config.charging.battery_capacity_kwh, 82.0);
        assert_eq!(config.charging.default_charge_limit, 80);
        assert_eq!(config.charging.history_limit, 50);
        assert_eq!(config.vehicle.scenario, "normal");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.commands.success_rate = 1.5;
        assert!(config.validate().is_err());

        config = Config::default();
        config.commands.min_delay_ms = 5000;
        assert!(config.validate().is_err());

        config = Config::default();
        config.charging.fast_charger_voltage = 0.0;
        assert!(matches!(
            config.validate(),
            Err(LandauError::Validation { ref field, .. }) if field == "charging.fast_charger_voltage"
        ));

        config = Config::default();
        config.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "commands:\n  success_rate: 1.0\ntimezone: Europe/Amsterdam\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.commands.success_rate, 1.0);
        assert_eq!(config.commands.max_delay_ms, 3000);
        assert_eq!(config.tz(), chrono_tz::Europe::Amsterdam);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.web.port, deserialized.web.port);
        assert_eq!(
            config.charging.stop_join_timeout_ms,
            deserialized.charging.stop_join_timeout_ms
        );
    }
}
