use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// How long an unpaid booking keeps its seat.
    pub booking_hold_seconds: u64,
    pub hold_sweep_interval_seconds: u64,
    /// Probability that the mock gateway approves a well-formed card.
    #[serde(default = "default_success_rate")]
    pub payment_success_rate: f64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_success_rate() -> f64 { 0.5 }
fn default_rate_limit() -> i64 { 100 }
fn default_currency() -> String { "USD".to_string() }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            booking_hold_seconds: 900,
            hold_sweep_interval_seconds: 60,
            payment_success_rate: default_success_rate(),
            rate_limit_per_minute: default_rate_limit(),
            default_currency: default_currency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

fn default_bcrypt_cost() -> u32 { 12 }

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Random demo flights created at startup for the memory backend.
    #[serde(default)]
    pub seed_demo_flights: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `SKYWAY__SERVER__PORT=8080` sets `server.port`
            .add_source(config::Environment::with_prefix("SKYWAY").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let toml = r#"
            [server]
            port = 8080

            [database]
            backend = "memory"

            [auth]
            jwt_secret = "secret"
            jwt_expiration_seconds = 60

            [business_rules]
            booking_hold_seconds = 300
            hold_sweep_interval_seconds = 30
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.backend, StorageBackend::Memory);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.redis.url.is_none());
        assert!(config.kafka.brokers.is_none());
        assert_eq!(config.auth.bcrypt_cost, 12);
        assert_eq!(config.business_rules.payment_success_rate, 0.5);
        assert_eq!(config.business_rules.default_currency, "USD");
    }
}
