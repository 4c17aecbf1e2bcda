use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::sentiment::DEFAULT_TRAILING_DAYS;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_REMOTE_POLL_SECS: u64 = 30;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("{name} must be a number, got {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub remote_url: Option<String>,
    pub remote_auth: Option<String>,
    pub remote_timeout: Duration,
    /// Zero turns remote polling off.
    pub remote_poll: Duration,
    pub user: Option<String>,

    pub anthropic_api_key: Option<String>,
    pub model: String,
    pub sentiment_url: Option<String>,
    pub sentiment_days: u32,
}

impl Config {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Ok(Config {
            remote_url: non_empty("GOODDAYS_REMOTE_URL"),
            remote_auth: non_empty("GOODDAYS_REMOTE_AUTH"),
            remote_timeout: Duration::from_secs(parse_or(
                "GOODDAYS_REMOTE_TIMEOUT_SECS",
                non_empty("GOODDAYS_REMOTE_TIMEOUT_SECS"),
                DEFAULT_REMOTE_TIMEOUT_SECS,
            )?),
            remote_poll: Duration::from_secs(parse_or(
                "GOODDAYS_REMOTE_POLL_SECS",
                non_empty("GOODDAYS_REMOTE_POLL_SECS"),
                DEFAULT_REMOTE_POLL_SECS,
            )?),
            user: non_empty("GOODDAYS_USER"),

            anthropic_api_key: non_empty("ANTHROPIC_API_KEY"),
            model: non_empty("GOODDAYS_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            sentiment_url: non_empty("GOODDAYS_SENTIMENT_URL"),
            sentiment_days: parse_or(
                "GOODDAYS_SENTIMENT_DAYS",
                non_empty("GOODDAYS_SENTIMENT_DAYS"),
                DEFAULT_TRAILING_DAYS,
            )?,
        })
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(ConfigError { name, value }),
        },
        None => Ok(default),
    }
}
