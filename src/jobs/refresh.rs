//! One refresh pass: list, filter, refresh in paced batches, retry failures.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::services::jellyfin::{ClientError, Item, MediaServer};
use crate::services::pacing::Pacer;

/// Outcome counts of a single pass.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub succeeded: usize,
    pub skipped: usize,
    /// Items still failing after every retry pass.
    pub failed: Vec<Item>,
    pub elapsed: Duration,
}

impl PassReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn log_summary(&self) {
        info!(
            "Metadata refresh completed in {:.2} seconds",
            self.elapsed.as_secs_f64()
        );
        info!(count = self.succeeded, "Successfully refreshed items");
        if self.skipped > 0 {
            info!(count = self.skipped, "Skipped items");
        }
        if self.failed.is_empty() {
            info!("All items were refreshed successfully!");
        } else {
            warn!(count = self.failed.len(), "Failed to refresh items");
        }
    }
}

/// True when `item_type` is allowed by the filter (`None` allows everything).
pub fn matches_filter(item_type: &str, filter: Option<&[String]>) -> bool {
    match filter {
        None => true,
        Some(types) => types.iter().any(|t| t.eq_ignore_ascii_case(item_type)),
    }
}

/// Run one full pass against `server`.
///
/// A listing failure aborts the pass. Refresh failures are counted and retried,
/// never propagated.
pub async fn run_pass<S>(server: &S, config: &Config) -> Result<PassReport, ClientError>
where
    S: MediaServer + ?Sized,
{
    let started = Instant::now();
    info!("Starting metadata refresh process");

    let filter = config.item_types.as_deref();
    let listed = server.list_items(config.user_id.as_deref(), filter).await?;

    let mut report = PassReport::default();
    let mut items = Vec::with_capacity(listed.len());
    for item in listed {
        if matches_filter(&item.item_type, filter) {
            items.push(item);
        } else {
            debug!(
                item_id = %item.id,
                item_type = %item.item_type,
                name = %item.name,
                "Skipping item not in target item types"
            );
            report.skipped += 1;
        }
    }

    if items.is_empty() {
        warn!(
            item_types = ?filter,
            "No items found to refresh. Check your server connection and user permissions."
        );
        report.elapsed = started.elapsed();
        return Ok(report);
    }

    let total = items.len();
    info!(count = total, item_types = ?filter, "Found items to refresh");
    if config.debug {
        log_type_distribution(&items);
    }

    let mut pacer = Pacer::new(config.delay);
    let batch_count = total.div_ceil(config.batch_size);
    let mut failed = Vec::new();
    let mut position = 0usize;

    for (batch_index, batch) in items.chunks(config.batch_size).enumerate() {
        info!(
            batch = batch_index + 1,
            batches = batch_count,
            size = batch.len(),
            "Processing batch"
        );

        for item in batch {
            position += 1;
            info!(
                "[{}/{}] Refreshing {}: {} (ID: {})",
                position,
                total,
                item.item_type,
                item.display_name(),
                item.id
            );

            match pacer.run(server.refresh_item(&item.id, &config.refresh)).await {
                Ok(()) => {
                    report.succeeded += 1;
                    info!("Successfully refreshed {}", item.display_name());
                }
                Err(e) => {
                    log_refresh_failure(item, &e);
                    warn!("Failed to refresh {}, will retry later", item.display_name());
                    failed.push(item.clone());
                }
            }
        }
    }

    if !failed.is_empty() && config.max_retries > 0 {
        info!(count = failed.len(), "Retrying failed items...");

        for attempt in 1..=config.max_retries {
            info!("Retry attempt {}/{}", attempt, config.max_retries);
            let mut still_failed = Vec::new();

            for item in failed {
                info!(
                    "Retrying {}: {} (ID: {})",
                    item.item_type,
                    item.display_name(),
                    item.id
                );
                match pacer.run(server.refresh_item(&item.id, &config.refresh)).await {
                    Ok(()) => {
                        report.succeeded += 1;
                        info!("Successfully refreshed {} on retry", item.display_name());
                    }
                    Err(e) => {
                        log_refresh_failure(&item, &e);
                        still_failed.push(item);
                    }
                }
            }

            failed = still_failed;
            if failed.is_empty() {
                info!("All retries successful!");
                break;
            }
        }
    }

    if !failed.is_empty() {
        warn!(
            "Failed to refresh {} items after {} retries:",
            failed.len(),
            config.max_retries
        );
        for item in &failed {
            warn!("  - {}: {} (ID: {})", item.item_type, item.display_name(), item.id);
        }
    }

    report.failed = failed;
    report.elapsed = started.elapsed();
    Ok(report)
}

fn log_refresh_failure(item: &Item, error: &ClientError) {
    match error.hint() {
        Some(hint) => warn!(item_id = %item.id, error = %error, hint, "Refresh request failed"),
        None => warn!(item_id = %item.id, error = %error, "Refresh request failed"),
    }
}

fn log_type_distribution(items: &[Item]) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(item.item_type.as_str()).or_default() += 1;
    }
    debug!("Item type distribution:");
    for (item_type, count) in counts {
        debug!("  - {}: {} items", item_type, count);
    }
}
