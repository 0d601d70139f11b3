// Application configuration
//
// JSON file with every field optional, plus a couple of environment overrides
// for deployment. Missing file → defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "sleek.json";
pub const ENV_DATABASE: &str = "SLEEK_DB";
pub const ENV_SERVER_ADDR: &str = "SLEEK_SERVER_ADDR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cashback_rate must be within [0, 1], got {0}")]
    InvalidCashbackRate(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_cluster")]
    pub cluster: String,
    /// Identity presented to the wallet during authorization
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_uri")]
    pub app_uri: String,
    #[serde(default = "default_cashback_rate")]
    pub cashback_rate: f64,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    #[serde(default = "default_program_id")]
    pub program_id: String,
    #[serde(default = "default_treasury")]
    pub treasury: String,
    #[serde(default = "default_bonk_mint")]
    pub bonk_mint: String,
}

fn default_cluster() -> String {
    "devnet".to_string()
}

fn default_app_name() -> String {
    "Sleek App".to_string()
}

fn default_app_uri() -> String {
    "https://sleek.app".to_string()
}

fn default_cashback_rate() -> f64 {
    crate::cashback::DEFAULT_CASHBACK_RATE
}

fn default_database_path() -> PathBuf {
    PathBuf::from("sleek.db")
}

fn default_server_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_program_id() -> String {
    crate::payment::DEFAULT_PROGRAM_ID.to_string()
}

fn default_treasury() -> String {
    crate::payment::DEFAULT_TREASURY.to_string()
}

fn default_bonk_mint() -> String {
    crate::payment::BONK_MINT.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cluster: default_cluster(),
            app_name: default_app_name(),
            app_uri: default_app_uri(),
            cashback_rate: default_cashback_rate(),
            database_path: default_database_path(),
            server_addr: default_server_addr(),
            program_id: default_program_id(),
            treasury: default_treasury(),
            bonk_mint: default_bonk_mint(),
        }
    }
}

impl Config {
    /// Load from `path`, or from `sleek.json` in the working directory if it
    /// exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(db) = std::env::var(ENV_DATABASE) {
            if !db.is_empty() {
                self.database_path = PathBuf::from(db);
            }
        }
        if let Ok(addr) = std::env::var(ENV_SERVER_ADDR) {
            if !addr.is_empty() {
                self.server_addr = addr;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.cashback_rate) {
            return Err(ConfigError::InvalidCashbackRate(self.cashback_rate));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cluster, "devnet");
        assert_eq!(config.cashback_rate, 0.10);
        assert_eq!(config.database_path, PathBuf::from("sleek.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "cluster": "mainnet-beta", "cashback_rate": 0.05 }}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.cluster, "mainnet-beta");
        assert_eq!(config.cashback_rate, 0.05);
        assert_eq!(config.app_name, "Sleek App");
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let config = Config {
            cashback_rate: 1.5,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCashbackRate(_))
        ));
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = Config::from_file(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
