//! Process-wide settings, read once from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{DEFAULT_EVENT_HEADER, DEFAULT_REQUIRED_USER_AGENT};
use crate::error::{CodeCastError, Result};

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8888";
pub const DEFAULT_CONFIG_DIR: &str = "/etc/code-cast";
pub const DEFAULT_RATE_LIMIT_MAX: usize = 2;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_address: String,
    /// Directory holding `config.json`
    pub config_dir: PathBuf,
    pub required_user_agent: String,
    pub event_header: String,
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
    /// Enables rolling file logs when set
    pub log_directory: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            required_user_agent: DEFAULT_REQUIRED_USER_AGENT.to_string(),
            event_header: DEFAULT_EVENT_HEADER.to_string(),
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            log_directory: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from any variable source, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Settings::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let rate_limit_max = match var("RATE_LIMIT_MAX") {
            Some(v) => parse_number("RATE_LIMIT_MAX", &v)?,
            None => defaults.rate_limit_max,
        };
        let rate_limit_window = match var("RATE_LIMIT_WINDOW_SECS") {
            Some(v) => Duration::from_secs(parse_number("RATE_LIMIT_WINDOW_SECS", &v)?),
            None => defaults.rate_limit_window,
        };

        Ok(Self {
            bind_address: var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            config_dir: var("CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_dir),
            required_user_agent: var("REQUIRED_USER_AGENT")
                .unwrap_or(defaults.required_user_agent),
            event_header: var("EVENT_HEADER").unwrap_or(defaults.event_header),
            rate_limit_max,
            rate_limit_window,
            log_directory: var("LOG_DIRECTORY").map(PathBuf::from),
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| CodeCastError::InvalidSetting {
            name,
            message: format!("'{}': {}", value, e),
        })
}
