use serde::{Deserialize, Serialize};
use slurk_execution::lifecycle::{DEFAULT_CHALLENGE_COUNT, DEFAULT_STARTING_BALANCE};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;
use url::Url;

/// Server configuration as read from YAML. Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Games older than this many hours are deleted by the sweeper.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Chat webhook that receives one status line per sweep.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_starting_balance")]
    pub starting_balance: u64,
    #[serde(default = "default_challenges_per_game")]
    pub challenges_per_game: usize,
    /// Credit winning bets when the host settles a round.
    #[serde(default)]
    pub apply_payouts: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// Browser origins allowed by CORS. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_retention_hours() -> u64 {
    12
}

fn default_sweep_interval_secs() -> u64 {
    600
}

fn default_starting_balance() -> u64 {
    DEFAULT_STARTING_BALANCE
}

fn default_challenges_per_game() -> usize {
    DEFAULT_CHALLENGE_COUNT
}

fn default_broadcast_capacity() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            retention_hours: default_retention_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
            webhook_url: None,
            starting_balance: default_starting_balance(),
            challenges_per_game: default_challenges_per_game(),
            apply_payouts: false,
            seed: None,
            broadcast_capacity: default_broadcast_capacity(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{field} is invalid: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("{field} must be a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("{field} URL scheme must be http or https: {value}")]
    InvalidUrlScheme { field: &'static str, value: String },
}

/// Configuration after validation, in the types the server uses.
#[derive(Clone, Debug)]
pub struct ValidatedConfig {
    pub bind: SocketAddr,
    pub log_level: Level,
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub webhook_url: Option<Url>,
    pub starting_balance: u64,
    pub challenges_per_game: usize,
    pub apply_payouts: bool,
    pub seed: Option<u64>,
    pub broadcast_capacity: usize,
    pub allowed_origins: Vec<String>,
}

fn ensure_nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::InvalidUrlScheme {
            field,
            value: value.to_string(),
        }),
    }
}

impl ServerConfig {
    /// Read a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Apply `SLURK_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("SLURK_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("SLURK_PORT") {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "SLURK_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(level) = lookup("SLURK_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = lookup("SLURK_WEBHOOK_URL") {
            let url = url.trim().to_string();
            self.webhook_url = (!url.is_empty()).then_some(url);
        }
        Ok(())
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let host = IpAddr::from_str(self.host.trim()).map_err(|_| ConfigError::InvalidValue {
            field: "host",
            value: self.host.clone(),
        })?;
        let log_level =
            Level::from_str(self.log_level.trim()).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;
        ensure_nonzero("retention_hours", self.retention_hours)?;
        ensure_nonzero("sweep_interval_secs", self.sweep_interval_secs)?;
        ensure_nonzero("challenges_per_game", self.challenges_per_game as u64)?;
        ensure_nonzero("broadcast_capacity", self.broadcast_capacity as u64)?;
        let webhook_url = self
            .webhook_url
            .as_deref()
            .map(|value| parse_url("webhook_url", value))
            .transpose()?;

        Ok(ValidatedConfig {
            bind: SocketAddr::new(host, self.port),
            log_level,
            retention: Duration::from_secs(self.retention_hours.saturating_mul(60 * 60)),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            webhook_url,
            starting_balance: self.starting_balance,
            challenges_per_game: self.challenges_per_game,
            apply_payouts: self.apply_payouts,
            seed: self.seed,
            broadcast_capacity: self.broadcast_capacity,
            allowed_origins: self.allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = ServerConfig::default().validate().unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.retention, Duration::from_secs(12 * 60 * 60));
        assert_eq!(config.starting_balance, 50);
        assert!(!config.apply_payouts);
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn test_loads_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "port: 9000\napply_payouts: true\nwebhook_url: https://chat.example.com/hook\nallowed_origins:\n  - http://localhost:3000"
        )
        .unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.apply_payouts);
        assert_eq!(config.retention_hours, 12);
        assert_eq!(config.host, "127.0.0.1");

        let validated = config.validate().unwrap();
        assert_eq!(
            validated.webhook_url.unwrap().as_str(),
            "https://chat.example.com/hook"
        );
        assert_eq!(validated.allowed_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_rejects_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            ServerConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "port: [not a port").unwrap();
        assert!(matches!(
            ServerConfig::load(&bad),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let config = ServerConfig {
            retention_hours: 0,
            ..ServerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retention_hours"), "unexpected error: {err}");

        let config = ServerConfig {
            webhook_url: Some("ftp://chat.example.com".into()),
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrlScheme { .. })
        ));

        let config = ServerConfig {
            log_level: "loud".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel { .. })
        ));

        let config = ServerConfig {
            host: "localhost:80".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "host", .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SLURK_HOST", "0.0.0.0"),
            ("SLURK_PORT", "7000"),
            ("SLURK_WEBHOOK_URL", " "),
        ]
        .into_iter()
        .collect();
        let mut config = ServerConfig {
            webhook_url: Some("https://chat.example.com/hook".into()),
            ..ServerConfig::default()
        };
        config
            .apply_overrides(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7000);
        assert!(config.webhook_url.is_none());

        let mut config = ServerConfig::default();
        let result = config.apply_overrides(|key| (key == "SLURK_PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
