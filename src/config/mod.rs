//! Application configuration management

use std::time::Duration;

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::cli::CliOptions;
use crate::refresh_mode::RefreshMode;

pub const HOST_ENV: &str = "JELLYFIN_HOST";
pub const API_KEY_ENV: &str = "JELLYFIN_API_KEY";
pub const USER_ID_ENV: &str = "JELLYFIN_USER_ID";
pub const INTERVAL_ENV: &str = "REFRESH_INTERVAL";
pub const RUN_ONCE_ENV: &str = "RUN_ONCE";
pub const DEBUG_ENV: &str = "DEBUG";

/// Item types refreshed when no `--item-types` flag is given.
pub const DEFAULT_ITEM_TYPES: &[&str] = &["Season"];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error(
        "Jellyfin host is required. Provide it via --host argument or JELLYFIN_HOST environment variable."
    )]
    MissingHost,

    #[error(
        "Jellyfin API key is required. Provide it via --api-key argument or JELLYFIN_API_KEY environment variable."
    )]
    MissingApiKey,

    #[error("Invalid Jellyfin host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Interval must be greater than 0 minutes when not running once")]
    InvalidInterval,

    #[error("Delay must be a finite, non-negative number of seconds (got {0})")]
    InvalidDelay(f64),

    #[error("Timeout must be at least 1 second")]
    InvalidTimeout,
}

/// Per-request refresh options sent with every `POST /Items/{id}/Refresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshOptions {
    pub mode: RefreshMode,
    pub replace_all_metadata: bool,
    pub replace_all_images: bool,
    pub regenerate_trickplay: bool,
}

/// Configuration resolved from CLI arguments and the environment.
///
/// Immutable once built; shared read-only for the lifetime of the process.
#[derive(Clone)]
pub struct Config {
    /// Server base URL, always with scheme and without trailing slash
    pub host: String,

    pub api_key: String,

    /// When set, items are listed through the user's view of the library
    pub user_id: Option<String>,

    /// Items per logged batch (logical grouping only)
    pub batch_size: usize,

    /// Minimum spacing between two refresh requests
    pub delay: Duration,

    pub refresh: RefreshOptions,

    /// `None` means every item type is refreshed
    pub item_types: Option<Vec<String>>,

    /// Retry passes over failed items after the main pass
    pub max_retries: u32,

    pub request_timeout: Duration,

    pub run_once: bool,

    pub interval_minutes: u64,

    /// Dump requests and responses
    pub debug: bool,
}

// Hand-written so the API key never reaches the logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("api_key", &"***MASKED***")
            .field("user_id", &self.user_id)
            .field("batch_size", &self.batch_size)
            .field("delay", &self.delay)
            .field("refresh", &self.refresh)
            .field("item_types", &self.item_types)
            .field("max_retries", &self.max_retries)
            .field("request_timeout", &self.request_timeout)
            .field("run_once", &self.run_once)
            .field("interval_minutes", &self.interval_minutes)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Config {
    /// Merge parsed CLI options with environment lookups and validate the result.
    ///
    /// CLI values win for host, API key and user id. `RUN_ONCE` and `DEBUG`
    /// switch on by presence alone. A positive `REFRESH_INTERVAL` replaces
    /// `--interval`.
    pub fn resolve<F>(cli: CliOptions, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = non_empty(cli.host)
            .or_else(|| non_empty(env(HOST_ENV)))
            .ok_or(ConfigError::MissingHost)?;
        let api_key = non_empty(cli.api_key)
            .or_else(|| non_empty(env(API_KEY_ENV)))
            .ok_or(ConfigError::MissingApiKey)?;
        let user_id = non_empty(cli.user_id).or_else(|| non_empty(env(USER_ID_ENV)));

        let host = normalize_host(&host)?;

        if cli.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }

        let delay =
            Duration::try_from_secs_f64(cli.delay).map_err(|_| ConfigError::InvalidDelay(cli.delay))?;

        if cli.timeout == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let run_once = cli.run_once || env_flag(&env, RUN_ONCE_ENV);
        let debug = debug_requested(cli.debug, &env);

        let mut interval_minutes = cli.interval;
        if let Some(raw) = env(INTERVAL_ENV).filter(|v| !v.trim().is_empty()) {
            match raw.trim().parse::<u64>() {
                Ok(minutes) if minutes > 0 => interval_minutes = minutes,
                _ => warn!(
                    value = %raw,
                    fallback = interval_minutes,
                    "Invalid {INTERVAL_ENV} in environment variables. Using default."
                ),
            }
        }
        if !run_once && interval_minutes == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        Ok(Self {
            host,
            api_key,
            user_id,
            batch_size: cli.batch_size,
            delay,
            refresh: RefreshOptions {
                mode: cli.refresh_mode,
                replace_all_metadata: cli.replace_all_metadata,
                replace_all_images: cli.replace_all_images,
                regenerate_trickplay: cli.regenerate_trickplay,
            },
            item_types: parse_item_types(cli.item_types.as_deref()),
            max_retries: cli.max_retries,
            request_timeout: Duration::from_secs(cli.timeout),
            run_once,
            interval_minutes,
            debug,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

/// `--debug`, or `DEBUG` present in the environment.
pub fn debug_requested<F>(cli_debug: bool, env: &F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    cli_debug || env_flag(env, DEBUG_ENV)
}

/// True when `key` is present in the environment, whatever its value.
fn env_flag<F>(env: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    env(key).is_some()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Add `http://` when no scheme is given and strip trailing slashes.
pub fn normalize_host(raw: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let normalized = with_scheme.trim_end_matches('/').to_string();

    let url = Url::parse(&normalized).map_err(|e| ConfigError::InvalidHost {
        host: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidHost {
            host: raw.to_string(),
            reason: "missing host name".to_string(),
        });
    }

    Ok(normalized)
}

/// `None` selects the default types; an empty or all-blank list disables filtering.
pub fn parse_item_types(raw: Option<&str>) -> Option<Vec<String>> {
    match raw {
        None => Some(DEFAULT_ITEM_TYPES.iter().map(|t| t.to_string()).collect()),
        Some(list) => {
            let types: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            if types.is_empty() { None } else { Some(types) }
        }
    }
}
