use std::env;
use std::time::Duration;

use serde::Deserialize;
use tessera_core::ReservationPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub reservation: ReservationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub group_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationConfig {
    #[serde(default = "default_seat_hold")]
    pub seat_hold_seconds: u64,
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_seat_hold() -> u64 {
    900
}

fn default_stale_after() -> u64 {
    900
}

fn default_sweep_interval() -> u64 {
    60
}

impl ReservationConfig {
    pub fn policy(&self) -> ReservationPolicy {
        ReservationPolicy {
            seat_hold: Duration::from_secs(self.seat_hold_seconds),
            stale_after: Duration::from_secs(self.stale_after_seconds),
            sweep_interval: Duration::from_secs(self.sweep_interval_seconds),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Layer the per-environment file on top; it may be absent
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides stay out of version control
            .add_source(config::File::with_name("config/local").required(false))
            // Environment wins last: TESSERA_SERVER__PORT=9090 etc.
            .add_source(config::Environment::with_prefix("TESSERA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_settings_become_a_policy() {
        let settings = ReservationConfig {
            seat_hold_seconds: 120,
            stale_after_seconds: 300,
            sweep_interval_seconds: 5,
        };
        let policy = settings.policy();
        assert_eq!(policy.seat_hold, Duration::from_secs(120));
        assert_eq!(policy.stale_after, Duration::from_secs(300));
        assert_eq!(policy.sweep_interval, Duration::from_secs(5));
    }
}
