//! remeta - periodic metadata refresher for Jellyfin
//!
//! Lists library items through the Jellyfin API and asks the server to
//! refresh each one, pacing requests, then sleeps and repeats.

pub mod cli;
pub mod config;
pub mod jobs;
pub mod refresh_mode;
pub mod services;
