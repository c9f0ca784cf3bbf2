//! Configuration for the status API and the accumulation jobs
//!
//! Both layer an optional TOML file under environment variables. Jobs read
//! `config/accumulation.toml` and `ACCUM_*` variables, with `__` separating
//! nested keys (`ACCUM_PAYERS__ANTHEM__PUBLIC_KEY_PATH`). The API reads
//! `API_*` variables (`API_POOL__MAX_CONNECTIONS`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use domain_accumulation::{ResponseCodeTable, ResponseOutcome};
use infra_db::DatabaseConfig;
use infra_transfer::RetryPolicy;

/// Default location of the jobs configuration file, relative to the working directory
pub const JOBS_CONFIG_FILE: &str = "config/accumulation";

/// Connection pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
            max_lifetime_secs: 30 * 60,
            idle_timeout_secs: 10 * 60,
        }
    }
}

impl PoolConfig {
    /// Pool settings for `url`; the minimum is capped at the maximum
    pub fn database_config(&self, url: &str) -> DatabaseConfig {
        DatabaseConfig::new(url)
            .max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .max_lifetime(Duration::from_secs(self.max_lifetime_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
    }
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// Database URL
    pub database_url: String,
    pub pool: PoolConfig,
    /// Log level
    pub log_level: String,
    /// `text` or `json`
    pub log_format: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            database_url: "postgres://localhost/accumulation".to_string(),
            pool: PoolConfig::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `API_*` environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("API")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn database_config(&self) -> DatabaseConfig {
        self.pool.database_config(&self.database_url)
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Retry and store settings shared by every payer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Root of the exchange point (an SFTP-mounted directory)
    pub exchange_root: PathBuf,
    /// Object storage URL for backup copies; backups are skipped when unset
    pub backup_url: Option<String>,
    /// Name of the environment variable holding the backup bearer token
    pub backup_token_env: Option<String>,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_timeout_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            exchange_root: PathBuf::from("/var/lib/accumulation/exchange"),
            backup_url: None,
            backup_token_env: None,
            max_attempts: policy.max_attempts,
            base_delay_ms: millis(policy.base_delay),
            max_delay_ms: millis(policy.max_delay),
            attempt_timeout_ms: millis(policy.attempt_timeout),
        }
    }
}

impl TransferConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Per-payer exchange settings
#[derive(Debug, Clone, Deserialize)]
pub struct PayerConfig {
    /// Armored payer public key used for outbound files
    pub public_key_path: PathBuf,
    /// Armored, passphrase-locked private key used for response files
    pub private_key_path: PathBuf,
    /// Environment variable the secret store injects the passphrase into
    pub passphrase_env: String,
    #[serde(default = "default_outbound_dir")]
    pub outbound_dir: String,
    #[serde(default = "default_inbound_dir")]
    pub inbound_dir: String,
    /// Extra or replacement response codes, e.g. `{ "XX" = "rejected" }`
    #[serde(default)]
    pub response_codes: HashMap<String, ResponseOutcome>,
}

fn default_outbound_dir() -> String {
    "outbound".to_string()
}

fn default_inbound_dir() -> String {
    "inbound".to_string()
}

impl PayerConfig {
    pub fn response_code_overrides(&self) -> ResponseCodeTable {
        ResponseCodeTable::from_pairs(self.response_codes.iter().map(|(code, outcome)| (code, *outcome)))
    }
}

/// Configuration for `accumulation-jobs`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub database_url: String,
    pub pool: PoolConfig,
    pub log_level: String,
    /// `text` or `json`
    pub log_format: String,
    /// Business timezone used for the default report date
    pub timezone: String,
    pub transfer: TransferConfig,
    /// Keyed by payer code, case-insensitive
    pub payers: HashMap<String, PayerConfig>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/accumulation".to_string(),
            pool: PoolConfig::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            timezone: "America/New_York".to_string(),
            transfer: TransferConfig::default(),
            payers: HashMap::new(),
        }
    }
}

impl JobsConfig {
    /// Loads `config/accumulation.toml` (if present) overlaid with `ACCUM_*` variables
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(JOBS_CONFIG_FILE)
    }

    /// Loads from an explicit file stem; the file is optional
    pub fn load_from(file: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("ACCUM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn database_config(&self) -> DatabaseConfig {
        self.pool.database_config(&self.database_url)
    }

    pub fn tz(&self) -> Result<Tz, String> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| format!("invalid timezone {}: {e}", self.timezone))
    }

    /// Today's date in the business timezone
    pub fn default_report_date(&self) -> Result<NaiveDate, String> {
        Ok(Utc::now().with_timezone(&self.tz()?).date_naive())
    }

    pub fn payer(&self, code: &str) -> Option<&PayerConfig> {
        self.payers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(code))
            .map(|(_, payer)| payer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_jobs_defaults() {
        let config = JobsConfig::default();
        assert_eq!(config.transfer.max_attempts, 3);
        assert_eq!(config.transfer.retry_policy(), RetryPolicy::default());
        assert_eq!(config.tz().unwrap(), chrono_tz::America::New_York);
    }

    #[test]
    fn test_invalid_timezone() {
        let config = JobsConfig {
            timezone: "Mars/Olympus".to_string(),
            ..JobsConfig::default()
        };
        assert!(config.default_report_date().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
database_url = "postgres://db/accum"
timezone = "America/Chicago"

[pool]
max_connections = 4
min_connections = 8
idle_timeout_secs = 60

[transfer]
exchange_root = "/mnt/exchange"
max_attempts = 5

[payers.anthem]
public_key_path = "/keys/anthem.pub"
private_key_path = "/keys/anthem.key"
passphrase_env = "ANTHEM_KEY_PASSPHRASE"

[payers.anthem.response_codes]
ZZ = "refunded"
"#
        )
        .unwrap();
        let stem = file.path().with_extension("");

        let config = JobsConfig::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(config.database_url, "postgres://db/accum");
        assert_eq!(config.transfer.max_attempts, 5);
        assert_eq!(config.transfer.base_delay_ms, 500);

        let database = config.database_config();
        assert_eq!(database.url, "postgres://db/accum");
        assert_eq!(database.max_connections, 4);
        assert_eq!(database.min_connections, 4);
        assert_eq!(database.idle_timeout, Duration::from_secs(60));
        assert_eq!(database.connect_timeout, Duration::from_secs(30));

        let anthem = config.payer("ANTHEM").unwrap();
        assert_eq!(anthem.outbound_dir, "outbound");
        assert_eq!(anthem.passphrase_env, "ANTHEM_KEY_PASSPHRASE");
        assert_eq!(
            anthem.response_code_overrides().resolve("zz"),
            Some(ResponseOutcome::Refunded)
        );
    }

    #[test]
    fn test_api_server_addr() {
        let config = ApiConfig {
            port: 9000,
            ..ApiConfig::default()
        };
        assert_eq!(config.server_addr(), "0.0.0.0:9000");
    }
}
