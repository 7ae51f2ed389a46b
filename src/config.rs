use serde::Serialize;
use std::env;
use std::path::PathBuf;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

pub const DATABASE_PATH_VAR: &str = "FITLOG_DATABASE_PATH";
pub const MAX_CONNECTIONS_VAR: &str = "FITLOG_MAX_CONNECTIONS";
pub const LOG_FILTER_VAR: &str = "FITLOG_LOG";

const DEFAULT_DATABASE_PATH: &str = "fitlog.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for {key}: {value:?}")]
  Invalid { key: &'static str, value: String },
}

impl Serialize for ConfigError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
  pub database_path: PathBuf,
  pub max_connections: u32,
  /// Used when RUST_LOG is unset
  pub log_filter: String,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
      max_connections: DEFAULT_MAX_CONNECTIONS,
      log_filter: DEFAULT_LOG_FILTER.to_string(),
    }
  }
}

impl AppConfig {
  /// Read configuration from the environment, falling back to defaults
  pub fn from_env() -> Result<Self, ConfigError> {
    let defaults = Self::default();

    let database_path = non_empty_var(DATABASE_PATH_VAR)
      .map(PathBuf::from)
      .unwrap_or(defaults.database_path);

    let max_connections = match non_empty_var(MAX_CONNECTIONS_VAR) {
      Some(raw) => match raw.parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => {
          return Err(ConfigError::Invalid {
            key: MAX_CONNECTIONS_VAR,
            value: raw,
          })
        }
      },
      None => defaults.max_connections,
    };

    let log_filter = non_empty_var(LOG_FILTER_VAR).unwrap_or(defaults.log_filter);

    Ok(Self {
      database_path,
      max_connections,
      log_filter,
    })
  }
}

fn non_empty_var(key: &str) -> Option<String> {
  env::var(key).ok().filter(|v| !v.trim().is_empty())
}
