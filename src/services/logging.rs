//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the filter is derived from the
//! verbose/debug switches.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Console logging options known before the full [`Config`](crate::config::Config) is resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSettings {
    pub verbose: bool,
    pub json: bool,
}

impl LogSettings {
    pub fn default_filter(&self) -> &'static str {
        if self.verbose {
            "remeta=debug"
        } else {
            "remeta=info"
        }
    }
}

/// Install the global subscriber. Call once, before any other logging.
pub fn init(settings: LogSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.default_filter()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if settings.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.context("Failed to initialize logging")
}
