//! Fixed spacing between consecutive refresh requests.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// Keeps at least `delay` between the end of one request and the start of the next.
///
/// The first request of a pacer goes out immediately.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    last_finished: Option<Instant>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_finished: None,
        }
    }

    /// Wait for the spacing to elapse, run `request`, and remember when it finished.
    pub async fn run<F: Future>(&mut self, request: F) -> F::Output {
        if let Some(last) = self.last_finished {
            let ready_at = last + self.delay;
            if ready_at > Instant::now() {
                trace!(delay_ms = self.delay.as_millis() as u64, "Pacing next request");
                sleep_until(ready_at).await;
            }
        }
        let output = request.await;
        self.last_finished = Some(Instant::now());
        output
    }
}
