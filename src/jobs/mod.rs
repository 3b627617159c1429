//! Refresh scheduling: a single pass, or passes repeated at a fixed interval.

pub mod refresh;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;

use tracing::{error, info};

use crate::config::Config;
use crate::services::jellyfin::MediaServer;

pub use refresh::{PassReport, run_pass};

/// How the scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Run-once pass finished; `success` is false if listing or any item failed.
    Completed { success: bool },
    /// Shutdown was requested.
    Interrupted,
}

/// Run passes until done (run-once) or until `shutdown` resolves.
///
/// Shutdown cancels whatever is in flight, including a pass in progress.
pub async fn run<S, F>(server: &S, config: &Config, shutdown: F) -> RunOutcome
where
    S: MediaServer + ?Sized,
    F: Future<Output = ()>,
{
    tokio::select! {
        outcome = run_loop(server, config) => outcome,
        _ = shutdown => {
            info!("Received shutdown signal. Exiting...");
            RunOutcome::Interrupted
        }
    }
}

async fn run_loop<S>(server: &S, config: &Config) -> RunOutcome
where
    S: MediaServer + ?Sized,
{
    if config.run_once {
        let success = run_refresh(server, config).await;
        return RunOutcome::Completed { success };
    }

    info!(
        interval_minutes = config.interval_minutes,
        "Running in periodic mode. Will refresh metadata every {} minutes.",
        config.interval_minutes
    );

    loop {
        run_refresh(server, config).await;

        info!(
            "Waiting {} minutes until the next refresh...",
            config.interval_minutes
        );
        tokio::time::sleep(config.interval()).await;
    }
}

/// One pass with its summary logged. Returns whether it fully succeeded.
async fn run_refresh<S>(server: &S, config: &Config) -> bool
where
    S: MediaServer + ?Sized,
{
    match run_pass(server, config).await {
        Ok(report) => {
            report.log_summary();
            report.is_success()
        }
        Err(e) => {
            match e.hint() {
                Some(hint) => error!(error = %e, hint, "Error getting items"),
                None => error!(error = %e, "Error getting items"),
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;
    use crate::jobs::testing::{FakeServer, item, test_config};

    #[tokio::test(start_paused = true)]
    async fn test_run_once_performs_exactly_one_pass() {
        let server = FakeServer::new(vec![item("1", "Season"), item("2", "Season")]);
        let config = test_config(&["--run-once", "--delay", "1"]);

        let outcome = run(&server, &config, std::future::pending()).await;

        assert_eq!(outcome, RunOutcome::Completed { success: true });
        assert_eq!(server.list_calls().len(), 1);
        assert_eq!(server.refreshed_ids(), vec!["1", "2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_reports_item_failures() {
        let server = FakeServer::new(vec![item("1", "Season")]).failing("1", usize::MAX);
        let config = test_config(&["--run-once", "--delay", "0", "--max-retries", "1"]);

        let outcome = run(&server, &config, std::future::pending()).await;

        assert_eq!(outcome, RunOutcome::Completed { success: false });
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_reports_listing_failure() {
        let server = FakeServer::new(vec![]).failing_list();
        let config = test_config(&["--run-once"]);

        let outcome = run(&server, &config, std::future::pending()).await;

        assert_eq!(outcome, RunOutcome::Completed { success: false });
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_passes_are_spaced_by_interval() {
        let notify = Arc::new(Notify::new());
        let server = FakeServer::new(vec![item("1", "Season"), item("2", "Season")])
            .with_refresh_duration(Duration::from_secs(1))
            .notify_after_lists(4, notify.clone());
        let config = test_config(&["--interval", "2", "--delay", "3"]);

        let outcome = run(&server, &config, async move { notify.notified().await }).await;

        assert_eq!(outcome, RunOutcome::Interrupted);
        let lists = server.list_calls();
        assert_eq!(lists.len(), 4);
        for pair in lists.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(120));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_loop_survives_listing_failures() {
        let notify = Arc::new(Notify::new());
        let server = FakeServer::new(vec![])
            .failing_list()
            .notify_after_lists(3, notify.clone());
        let config = test_config(&["--interval", "1"]);

        let outcome = run(&server, &config, async move { notify.notified().await }).await;

        assert_eq!(outcome, RunOutcome::Interrupted);
        assert_eq!(server.list_calls().len(), 3);
    }
}
