use seatlock_core::{HoldPolicy, SeatLimits, MAX_HOLD_SECONDS};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub holds: HoldsConfig,
    pub events: EventsConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HoldsConfig {
    pub hold_seconds: u64,
    #[serde(default = "default_refresh_seconds")]
    pub refresh_seconds: u64,
    pub max_seats_per_user: usize,
}

fn default_refresh_seconds() -> u64 { 60 }

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    pub min_seats: u32,
    pub max_seats: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    /// Keys examined per SCAN round trip
    pub count: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { count: 100 }
    }
}

impl HoldsConfig {
    pub fn policy(&self) -> HoldPolicy {
        HoldPolicy {
            hold_seconds: self.hold_seconds,
            refresh_seconds: self.refresh_seconds,
            max_seats_per_user: self.max_seats_per_user,
        }
    }
}

impl EventsConfig {
    pub fn limits(&self) -> SeatLimits {
        SeatLimits {
            min_seats: self.min_seats,
            max_seats: self.max_seats,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Layered load from `dir`: `default`, then `{RUN_MODE}`, then `local`,
    /// then `SEATLOCK__*` environment variables.
    pub fn load_from(dir: &str) -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name(&format!("{}/default", dir)))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("{}/{}", dir, run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name(&format!("{}/local", dir)).required(false))
            // Eg. `SEATLOCK__REDIS__URL=redis://cache:6379` sets `redis.url`
            .add_source(config::Environment::with_prefix("SEATLOCK").prefix_separator("__").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.holds.hold_seconds == 0 || self.holds.refresh_seconds == 0 {
            return Err(config::ConfigError::Message("holds durations must be at least one second".into()));
        }
        if self.holds.hold_seconds > MAX_HOLD_SECONDS || self.holds.refresh_seconds > MAX_HOLD_SECONDS {
            return Err(config::ConfigError::Message(format!(
                "holds durations must not exceed {} seconds",
                MAX_HOLD_SECONDS
            )));
        }
        if self.holds.max_seats_per_user == 0 {
            return Err(config::ConfigError::Message("holds.max_seats_per_user must be positive".into()));
        }
        if self.events.min_seats > self.events.max_seats {
            return Err(config::ConfigError::Message("events.min_seats exceeds events.max_seats".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let dir = format!("{}/../config", env!("CARGO_MANIFEST_DIR"));
        let config = Config::load_from(&dir).expect("default config should load");

        assert_eq!(config.holds.policy(), HoldPolicy::default());
        assert_eq!(config.events.limits(), SeatLimits::default());
        assert!(config.scan.count > 0);
        assert!(config.redis.url.starts_with("redis://"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_durations() {
        let dir = format!("{}/../config", env!("CARGO_MANIFEST_DIR"));
        let mut config = Config::load_from(&dir).expect("default config should load");

        config.holds.hold_seconds = u64::MAX;
        assert!(config.validate().is_err());

        config.holds.hold_seconds = MAX_HOLD_SECONDS;
        config.holds.refresh_seconds = MAX_HOLD_SECONDS + 1;
        assert!(config.validate().is_err());

        config.holds.refresh_seconds = 0;
        assert!(config.validate().is_err());

        config.holds.refresh_seconds = 60;
        assert!(config.validate().is_ok());
    }
}
