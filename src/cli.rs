//! Command-line flags.
//!
//! Only parsing lives here; merging with the environment and validation
//! happen in [`crate::config::Config::resolve`].

use std::ffi::OsString;

use clap::Parser;

use crate::refresh_mode::RefreshMode;

/// Extra arguments appended to the command line, mostly for container entry points.
pub const ADDITIONAL_ARGS_ENV: &str = "ADDITIONAL_ARGS";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "remeta",
    version,
    about = "Refresh metadata for Jellyfin items"
)]
pub struct CliOptions {
    /// Jellyfin server URL
    #[arg(long)]
    pub host: Option<String>,

    /// Jellyfin API key
    #[arg(long)]
    pub api_key: Option<String>,

    /// List items as seen by this user
    #[arg(long)]
    pub user_id: Option<String>,

    /// Number of items grouped per logged batch
    #[arg(long, default_value_t = 20)]
    pub batch_size: usize,

    /// Delay between API requests in seconds
    #[arg(long, default_value_t = 1.0)]
    pub delay: f64,

    /// Metadata refresh mode
    #[arg(long, value_enum, default_value_t = RefreshMode::FullRefresh)]
    pub refresh_mode: RefreshMode,

    /// Replace all metadata
    #[arg(long)]
    pub replace_all_metadata: bool,

    /// Replace all images
    #[arg(long)]
    pub replace_all_images: bool,

    /// Regenerate trickplay images
    #[arg(long)]
    pub regenerate_trickplay: bool,

    /// Comma-separated list of item types to refresh (default: Season, empty for all)
    #[arg(long)]
    pub item_types: Option<String>,

    /// Retry passes over items that failed to refresh
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Per-request timeout in seconds (at least 1)
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug mode with request/response dumps
    #[arg(short, long)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Run once and exit (default is to run periodically)
    #[arg(long)]
    pub run_once: bool,

    /// Interval in minutes between refresh runs
    #[arg(long, default_value_t = 30)]
    pub interval: u64,
}

impl CliOptions {
    /// Parse `args` (program name first) with `additional` split on whitespace
    /// and appended after them.
    pub fn parse_with_additional<I, T>(args: I, additional: Option<&str>) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let mut argv: Vec<OsString> = args.into_iter().map(Into::into).collect();
        if let Some(extra) = additional {
            argv.extend(extra.split_whitespace().map(OsString::from));
        }
        Self::try_parse_from(argv)
    }

    pub fn from_env_args() -> Result<Self, clap::Error> {
        let additional = std::env::var(ADDITIONAL_ARGS_ENV).ok();
        Self::parse_with_additional(std::env::args_os(), additional.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = CliOptions::parse_with_additional(["remeta"], None).unwrap();
        assert_eq!(opts.batch_size, 20);
        assert_eq!(opts.delay, 1.0);
        assert_eq!(opts.refresh_mode, RefreshMode::FullRefresh);
        assert_eq!(opts.interval, 30);
        assert_eq!(opts.max_retries, 3);
        assert!(opts.item_types.is_none());
        assert!(!opts.run_once);
    }

    #[test]
    fn test_additional_args_are_appended() {
        let opts = CliOptions::parse_with_additional(
            ["remeta", "--host", "jf.local"],
            Some("  --run-once --refresh-mode Default\t--replace-all-images "),
        )
        .unwrap();
        assert_eq!(opts.host.as_deref(), Some("jf.local"));
        assert!(opts.run_once);
        assert!(opts.replace_all_images);
        assert_eq!(opts.refresh_mode, RefreshMode::Default);
    }

    #[test]
    fn test_short_flags() {
        let opts = CliOptions::parse_with_additional(["remeta", "-v", "-d"], None).unwrap();
        assert!(opts.verbose);
        assert!(opts.debug);
    }

    #[test]
    fn test_rejects_unknown_refresh_mode() {
        let result = CliOptions::parse_with_additional(["remeta", "--refresh-mode", "Deep"], None);
        assert!(result.is_err());
    }
}
