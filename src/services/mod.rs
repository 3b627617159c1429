//! External service integrations

pub mod http_dump;
pub mod jellyfin;
pub mod logging;
pub mod pacing;

pub use jellyfin::{ClientError, Item, JellyfinClient, MediaServer, ServerInfo};
pub use logging::LogSettings;
pub use pacing::Pacer;
