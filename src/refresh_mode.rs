//! Server-side refresh depth for metadata and images.

use std::fmt;

use clap::ValueEnum;

/// How deeply Jellyfin re-scans an item when a refresh is requested.
///
/// The variant names are sent verbatim as `metadataRefreshMode` and
/// `imageRefreshMode` query values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RefreshMode {
    #[value(name = "None")]
    None,
    #[value(name = "ValidationOnly")]
    ValidationOnly,
    #[value(name = "Default")]
    Default,
    #[default]
    #[value(name = "FullRefresh")]
    FullRefresh,
}

impl RefreshMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshMode::None => "None",
            RefreshMode::ValidationOnly => "ValidationOnly",
            RefreshMode::Default => "Default",
            RefreshMode::FullRefresh => "FullRefresh",
        }
    }
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
