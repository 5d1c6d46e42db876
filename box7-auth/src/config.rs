use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::MAX_SESSION_TTL;

/// Origins allowed to read credentialed responses when none are configured.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "https://box7-react-68938d4bd5ee.herokuapp.com",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
];

const DEFAULT_SESSION_TTL: &str = "24h";

#[derive(Debug, Parser)]
#[command(
    name = "box7-auth",
    version,
    about = "Session and JWT authentication routes for the Box7 web client"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, short = 'u', value_name = "FILE")]
    pub users_file: Option<PathBuf>,

    /// May be repeated; replaces the built-in allow-list.
    #[arg(long = "allowed-origin", value_name = "ORIGIN")]
    pub allowed_origins: Vec<String>,

    /// Session and access-token lifetime, e.g. `24h` or `30m`.
    #[arg(long, value_name = "DURATION")]
    pub session_ttl: Option<String>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub users_file: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
    pub session_ttl: Duration,
    pub jwt_secret: Option<String>,
    pub cookie_secure: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind", &self.bind)
            .field("users_file", &self.users_file)
            .field("allowed_origins", &self.allowed_origins)
            .field("session_ttl", &self.session_ttl)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid boolean value for env var {key}: {value}")]
    InvalidEnvBool { key: String, value: String },
    #[error("invalid session ttl {value}: {source}")]
    InvalidTtl {
        value: String,
        source: humantime::DurationError,
    },
    #[error("session ttl {value} exceeds the maximum of {max}")]
    TtlTooLong { value: String, max: String },
    #[error("env var {key} is not valid unicode")]
    NotUnicode { key: String },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    users_file: Option<PathBuf>,
    allowed_origins: Option<Vec<String>>,
    session_ttl: Option<String>,
    jwt_secret: Option<String>,
    cookie_secure: Option<bool>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;

        let bind = cli
            .bind
            .or(from_file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));
        let users_file = cli.users_file.or(from_file.users_file);
        let allowed_origins = if cli.allowed_origins.is_empty() {
            from_file.allowed_origins.unwrap_or_else(default_origins)
        } else {
            cli.allowed_origins
        };
        let session_ttl = parse_ttl(
            cli.session_ttl
                .or(from_file.session_ttl)
                .as_deref()
                .unwrap_or(DEFAULT_SESSION_TTL),
        )?;
        let jwt_secret = read_env_string("BOX7_JWT_SECRET")?
            .or(from_file.jwt_secret)
            .filter(|secret| !secret.is_empty());
        let cookie_secure = read_env_bool("BOX7_COOKIE_SECURE")?
            .or(from_file.cookie_secure)
            .unwrap_or(false);

        Ok(Self {
            bind,
            users_file,
            allowed_origins,
            session_ttl,
            jwt_secret,
            cookie_secure,
        })
    }
}

pub fn default_origins() -> Vec<String> {
    DEFAULT_ALLOWED_ORIGINS
        .iter()
        .map(|origin| String::from(*origin))
        .collect()
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn parse_ttl(raw: &str) -> Result<Duration, ConfigError> {
    let ttl = humantime::parse_duration(raw.trim()).map_err(|source| ConfigError::InvalidTtl {
        value: String::from(raw),
        source,
    })?;
    if ttl > MAX_SESSION_TTL {
        return Err(ConfigError::TtlTooLong {
            value: String::from(raw),
            max: humantime::format_duration(MAX_SESSION_TTL).to_string(),
        });
    }
    Ok(ttl)
}

fn read_env_string(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode {
            key: String::from(key),
        }),
    }
}

fn read_env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match read_env_string(key)? {
        Some(value) => parse_bool_value(key, &value).map(Some),
        None => Ok(None),
    }
}

fn parse_bool_value(key: &str, raw: &str) -> Result<bool, ConfigError> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvBool {
            key: String::from(key),
            value: String::from(raw),
        }),
    }
}
