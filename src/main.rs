//! remeta - refresh Jellyfin metadata on a schedule
//!
//! Configuration comes from CLI flags, the environment and an optional `.env`
//! file. Exit code is non-zero when configuration is invalid or when a
//! `--run-once` pass had failures.

use std::process::ExitCode;

use anyhow::Context;
use tracing::{debug, error, warn};

use remeta::cli::CliOptions;
use remeta::config::{self, Config};
use remeta::jobs::{self, RunOutcome};
use remeta::services::{JellyfinClient, LogSettings, logging};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Before anything reads the environment; never overrides real variables
    dotenvy::dotenv().ok();

    let cli = match CliOptions::from_env_args() {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    let env = |key: &str| std::env::var(key).ok();
    let debug_mode = config::debug_requested(cli.debug, &env);

    let log_settings = LogSettings {
        verbose: cli.verbose || debug_mode,
        json: cli.log_json,
    };
    if let Err(e) = logging::init(log_settings) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }
    if debug_mode {
        debug!("Debug mode enabled - request/response dumps will be shown");
    }

    match run(cli, env).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run<F>(cli: CliOptions, env: F) -> anyhow::Result<ExitCode>
where
    F: Fn(&str) -> Option<String>,
{
    let config = Config::resolve(cli, env)?;
    debug!(config = ?config, "Configuration loaded");

    let client = JellyfinClient::new(&config).context("Failed to create Jellyfin client")?;

    if let Err(e) = client.verify_connection().await {
        warn!(error = %e, "Could not verify connection to Jellyfin server");
        warn!(
            "Will attempt to proceed anyway, but this may indicate a problem with the server URL or network connection."
        );
    }

    let code = match jobs::run(&client, &config, shutdown_signal()).await {
        RunOutcome::Completed { success: true } | RunOutcome::Interrupted => ExitCode::SUCCESS,
        RunOutcome::Completed { success: false } => ExitCode::FAILURE,
    };
    Ok(code)
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
