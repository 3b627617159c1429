//! Jellyfin API client
//!
//! Covers the three endpoints the refresher needs:
//! - `GET /System/Info/Public` to check the server is reachable
//! - `GET /Items` (or `/Users/{id}/Items`) to enumerate the library, page by page
//! - `POST /Items/{id}/Refresh` to queue a metadata/image refresh
//!
//! Authentication uses the `X-Emby-Token` header.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::http_dump::{self, Exchange, Outcome, TOKEN_HEADER};
use crate::config::{Config, RefreshOptions};

/// Items requested per page when listing.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

const ITEM_FIELDS: &str = "Path,ProviderIds,SeriesName";

static BASE_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<base href="([^"]+)""#).expect("valid base href regex"));

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{method} {url} returned HTTP {status}")]
    Http {
        method: Method,
        url: String,
        status: StatusCode,
    },

    #[error("Network error calling {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse JSON response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "Received HTML instead of JSON from {url}; the request is being redirected to an authentication page ({})",
        .login_url.as_deref().unwrap_or("login URL unknown")
    )]
    AuthRedirect {
        url: String,
        login_url: Option<String>,
    },

    #[error("API key is not a valid header value")]
    InvalidApiKey,

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    /// Operator-facing hint for common failure causes.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ClientError::Http { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                Some("Authentication error (401). Check your API key.")
            }
            ClientError::Http { status, .. } if *status == StatusCode::NOT_FOUND => {
                Some("Item not found (404).")
            }
            ClientError::Http { status, .. } if *status == StatusCode::BAD_REQUEST => {
                Some("Bad request (400). This might be due to invalid parameters.")
            }
            ClientError::Network { source, .. } if source.is_timeout() => {
                Some("Request timed out. The server might be busy.")
            }
            ClientError::Network { source, .. } if source.is_connect() => {
                Some("Connection failed. Check your network connection and server URL.")
            }
            ClientError::AuthRedirect { .. } => {
                Some("Check your API key or reverse proxy authentication configuration.")
            }
            _ => None,
        }
    }
}

/// A library item as returned by the items endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    pub id: String,
    #[serde(default = "unknown")]
    pub name: String,
    #[serde(rename = "Type", default = "unknown")]
    pub item_type: String,
    #[serde(default)]
    pub series_name: Option<String>,
}

fn unknown() -> String {
    "Unknown".to_string()
}

impl Item {
    /// `Series - Name` when the item belongs to a series, else just the name.
    pub fn display_name(&self) -> String {
        match self.series_name.as_deref().filter(|s| !s.is_empty()) {
            Some(series) => format!("{} - {}", series, self.name),
            None => self.name.clone(),
        }
    }
}

/// One page of `GET /Items`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsPage {
    #[serde(default)]
    pub items: Vec<Item>,
    pub total_record_count: Option<usize>,
}

/// Subset of `GET /System/Info/Public`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerInfo {
    pub server_name: Option<String>,
    pub version: Option<String>,
}

/// The operations a refresh pass needs from a media server.
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Every item visible to `user_id` (or the whole library), optionally
    /// restricted to `item_types`. Follows pagination to the end.
    async fn list_items(
        &self,
        user_id: Option<&str>,
        item_types: Option<&[String]>,
    ) -> Result<Vec<Item>, ClientError>;

    /// Queue a refresh of one item.
    async fn refresh_item(&self, item_id: &str, options: &RefreshOptions)
    -> Result<(), ClientError>;
}

/// reqwest-backed [`MediaServer`].
pub struct JellyfinClient {
    client: Client,
    base_url: Url,
    token: HeaderValue,
    page_size: usize,
    debug: bool,
}

impl JellyfinClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(&config.host).map_err(|_| ClientError::InvalidUrl(config.host.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.host.clone()));
        }

        let mut token =
            HeaderValue::from_str(&config.api_key).map_err(|_| ClientError::InvalidApiKey)?;
        token.set_sensitive(true);

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::Build)?;

        info!(host = %config.host, "Initialized Jellyfin client");

        Ok(Self {
            client,
            base_url,
            token,
            page_size: DEFAULT_PAGE_SIZE,
            debug: config.debug,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Check the server answers its public info endpoint.
    pub async fn verify_connection(&self) -> Result<ServerInfo, ClientError> {
        let url = self.endpoint(&["System", "Info", "Public"])?;
        let body = self.send(Method::GET, url.clone(), Vec::new(), false).await?;
        let info: ServerInfo = decode_json(&url, &body)?;

        info!(
            server_name = info.server_name.as_deref().unwrap_or("Unknown"),
            version = info.version.as_deref().unwrap_or("Unknown"),
            "Successfully connected to Jellyfin server"
        );
        Ok(info)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issue one request and return the body of a 2xx response.
    async fn send(
        &self,
        method: Method,
        url: Url,
        params: Vec<(String, String)>,
        authenticated: bool,
    ) -> Result<String, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if authenticated {
            headers.insert(TOKEN_HEADER, self.token.clone());
        }

        let url_str = url.to_string();
        let exchange = Exchange {
            method: method.as_str(),
            url: &url_str,
            params: &params,
            headers: &headers,
        };

        let response = match self
            .client
            .request(method.clone(), url)
            .headers(headers.clone())
            .query(&params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(source) => {
                if self.debug {
                    http_dump::dump(&exchange, &Outcome::Error(&source));
                }
                return Err(ClientError::Network {
                    url: url_str,
                    source,
                });
            }
        };

        let status = response.status();
        let response_headers = response.headers().clone();
        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => {
                if self.debug {
                    http_dump::dump(&exchange, &Outcome::Error(&source));
                }
                return Err(ClientError::Network {
                    url: url_str,
                    source,
                });
            }
        };

        if self.debug {
            http_dump::dump(
                &exchange,
                &Outcome::Response {
                    status,
                    headers: &response_headers,
                    body: &body,
                },
            );
        }

        if !status.is_success() {
            return Err(ClientError::Http {
                method,
                url: url_str,
                status,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl MediaServer for JellyfinClient {
    async fn list_items(
        &self,
        user_id: Option<&str>,
        item_types: Option<&[String]>,
    ) -> Result<Vec<Item>, ClientError> {
        let url = match user_id {
            Some(user_id) => self.endpoint(&["Users", user_id, "Items"])?,
            None => self.endpoint(&["Items"])?,
        };

        let include_types = item_types
            .filter(|types| !types.is_empty())
            .map(|types| types.join(","));
        if let Some(types) = &include_types {
            debug!(item_types = %types, "Filtering by item types");
        }

        let mut items = Vec::new();
        let mut start_index = 0usize;

        loop {
            let mut params = vec![
                ("Recursive".to_string(), "true".to_string()),
                ("Fields".to_string(), ITEM_FIELDS.to_string()),
                ("StartIndex".to_string(), start_index.to_string()),
                ("Limit".to_string(), self.page_size.to_string()),
            ];
            if let Some(types) = &include_types {
                params.push(("IncludeItemTypes".to_string(), types.clone()));
            }

            let body = self.send(Method::GET, url.clone(), params, true).await?;
            let page = decode_items_page(&url, &body)?;

            let received = page.items.len();
            items.extend(page.items);
            start_index += received;

            debug!(
                received,
                collected = items.len(),
                total = ?page.total_record_count,
                "Fetched items page"
            );

            let exhausted = match page.total_record_count {
                Some(total) => start_index >= total,
                None => received < self.page_size,
            };
            if received == 0 || exhausted {
                break;
            }
        }

        Ok(items)
    }

    async fn refresh_item(
        &self,
        item_id: &str,
        options: &RefreshOptions,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&["Items", item_id, "Refresh"])?;
        let params = refresh_params(options);

        debug!(item_id = %item_id, ?params, "Refreshing item");
        self.send(Method::POST, url, params, true).await?;
        debug!(item_id = %item_id, "Successfully refreshed item");
        Ok(())
    }
}

/// Query parameters for `POST /Items/{id}/Refresh`.
pub fn refresh_params(options: &RefreshOptions) -> Vec<(String, String)> {
    let mode = options.mode.as_str().to_string();
    vec![
        ("metadataRefreshMode".to_string(), mode.clone()),
        ("imageRefreshMode".to_string(), mode),
        (
            "replaceAllMetadata".to_string(),
            options.replace_all_metadata.to_string(),
        ),
        (
            "replaceAllImages".to_string(),
            options.replace_all_images.to_string(),
        ),
        (
            "regenerateTrickplay".to_string(),
            options.regenerate_trickplay.to_string(),
        ),
    ]
}

fn looks_like_html(body: &str) -> bool {
    let trimmed = body.trim_start();
    trimmed.starts_with("<!DOCTYPE html") || trimmed.starts_with("<!doctype html") || body.contains("<html")
}

fn decode_items_page(url: &Url, body: &str) -> Result<ItemsPage, ClientError> {
    if body.trim().is_empty() {
        warn!(url = %url, "Received empty response from server");
        return Ok(ItemsPage::default());
    }
    decode_json(url, body)
}

fn decode_json<T: for<'de> Deserialize<'de>>(url: &Url, body: &str) -> Result<T, ClientError> {
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(_) if looks_like_html(body) => Err(ClientError::AuthRedirect {
            url: url.to_string(),
            login_url: BASE_HREF
                .captures(body)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string()),
        }),
        Err(source) => Err(ClientError::Decode {
            url: url.to_string(),
            source,
        }),
    }
}
