//! In-memory [`MediaServer`] for job tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::cli::CliOptions;
use crate::config::{Config, RefreshOptions};
use crate::services::jellyfin::{ClientError, Item, MediaServer};

pub fn item(id: &str, item_type: &str) -> Item {
    Item {
        id: id.to_string(),
        name: format!("Item {id}"),
        item_type: item_type.to_string(),
        series_name: None,
    }
}

/// Config with a dummy host and key plus the given extra flags.
pub fn test_config(args: &[&str]) -> Config {
    let mut argv = vec!["remeta", "--host", "jf.test", "--api-key", "key"];
    argv.extend_from_slice(args);
    let cli = CliOptions::parse_with_additional(argv, None).unwrap();
    Config::resolve(cli, |_| None).unwrap()
}

#[derive(Debug, Clone, Copy)]
pub struct RefreshCall {
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Default)]
struct State {
    refreshed: Vec<(String, RefreshCall)>,
    list_calls: Vec<Instant>,
    last_list_args: Option<(Option<String>, Option<Vec<String>>)>,
    remaining_failures: HashMap<String, usize>,
}

#[derive(Default)]
pub struct FakeServer {
    items: Vec<Item>,
    fail_list: bool,
    refresh_duration: Duration,
    notify_after_lists: Option<(usize, Arc<Notify>)>,
    state: Mutex<State>,
}

impl FakeServer {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn with_refresh_duration(mut self, duration: Duration) -> Self {
        self.refresh_duration = duration;
        self
    }

    /// Fail the next `times` refreshes of `id`.
    pub fn failing(self, id: &str, times: usize) -> Self {
        self.state
            .lock()
            .remaining_failures
            .insert(id.to_string(), times);
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// Signal `notify` once `lists` listings have been served.
    pub fn notify_after_lists(mut self, lists: usize, notify: Arc<Notify>) -> Self {
        self.notify_after_lists = Some((lists, notify));
        self
    }

    pub fn refreshed_ids(&self) -> Vec<String> {
        let state = self.state.lock();
        state.refreshed.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn refresh_calls(&self) -> Vec<RefreshCall> {
        let state = self.state.lock();
        state.refreshed.iter().map(|(_, call)| *call).collect()
    }

    pub fn list_calls(&self) -> Vec<Instant> {
        self.state.lock().list_calls.clone()
    }

    pub fn last_list_args(&self) -> Option<(Option<String>, Option<Vec<String>>)> {
        self.state.lock().last_list_args.clone()
    }
}

#[async_trait]
impl MediaServer for FakeServer {
    async fn list_items(
        &self,
        user_id: Option<&str>,
        item_types: Option<&[String]>,
    ) -> Result<Vec<Item>, ClientError> {
        let served = {
            let mut state = self.state.lock();
            state.list_calls.push(Instant::now());
            state.last_list_args = Some((user_id.map(str::to_string), item_types.map(<[String]>::to_vec)));
            state.list_calls.len()
        };

        if let Some((after, notify)) = &self.notify_after_lists {
            if served >= *after {
                notify.notify_one();
            }
        }

        if self.fail_list {
            return Err(ClientError::Http {
                method: Method::GET,
                url: "http://jf.test/Items".to_string(),
                status: StatusCode::SERVICE_UNAVAILABLE,
            });
        }
        Ok(self.items.clone())
    }

    async fn refresh_item(
        &self,
        item_id: &str,
        _options: &RefreshOptions,
    ) -> Result<(), ClientError> {
        let started = Instant::now();
        if !self.refresh_duration.is_zero() {
            tokio::time::sleep(self.refresh_duration).await;
        }
        let finished = Instant::now();

        let mut state = self.state.lock();
        state
            .refreshed
            .push((item_id.to_string(), RefreshCall { started, finished }));

        match state.remaining_failures.get_mut(item_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ClientError::Http {
                    method: Method::POST,
                    url: format!("http://jf.test/Items/{item_id}/Refresh"),
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                })
            }
            _ => Ok(()),
        }
    }
}
