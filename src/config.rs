//! Runtime configuration, read from `.env` (via dotenvy) and the process
//! environment. Every setting has a default so a bare `cargo run` works.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_MIN_PASSWORD_LEN: usize = 5;
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?} (expected pretty or json)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub dir: Option<PathBuf>, // daily rolling file when set
}

#[derive(Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub media_root: PathBuf,
    pub jwt_secret: String,
    /// True when no secret was configured and one was generated for this process.
    pub ephemeral_secret: bool,
    pub token_ttl_secs: i64,
    pub bcrypt_cost: u32,
    pub min_password_len: usize,
    pub max_upload_bytes: usize,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            db_path: PathBuf::from("recipe_data"),
            media_root: PathBuf::from("media"),
            jwt_secret: Uuid::new_v4().simple().to_string(),
            ephemeral_secret: true,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            log: LogConfig {
                format: LogFormat::Pretty,
                dir: None,
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let (jwt_secret, ephemeral_secret) = match env::var("RECIPE_JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => (secret, false),
            _ => (defaults.jwt_secret, true),
        };

        Ok(Self {
            bind_addr: try_load("RECIPE_BIND_ADDR", defaults.bind_addr)?,
            db_path: env::var_os("RECIPE_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            media_root: env::var_os("RECIPE_MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            jwt_secret,
            ephemeral_secret,
            token_ttl_secs: try_load("RECIPE_TOKEN_TTL_SECS", defaults.token_ttl_secs)?,
            bcrypt_cost: try_load("RECIPE_BCRYPT_COST", defaults.bcrypt_cost)?,
            min_password_len: try_load("RECIPE_MIN_PASSWORD_LEN", defaults.min_password_len)?,
            max_upload_bytes: try_load("RECIPE_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            log: LogConfig {
                format: try_load("RECIPE_LOG_FORMAT", defaults.log.format)?,
                dir: env::var_os("RECIPE_LOG_DIR").map(PathBuf::from),
            },
        })
    }
}

fn try_load<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.min_password_len, 5);
        assert!(config.ephemeral_secret);
        assert!(!config.jwt_secret.is_empty());
    }
}
