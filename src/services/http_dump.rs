//! Request/response dumps for `--debug`.

use std::fmt::{self, Write as _};

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

pub const TOKEN_HEADER: &str = "x-emby-token";
pub const MASK: &str = "***MASKED***";
const BODY_PREVIEW_CHARS: usize = 1000;
const RULE: &str = "================================================================================";

/// The request half of a dump.
#[derive(Debug)]
pub struct Exchange<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub params: &'a [(String, String)],
    pub headers: &'a HeaderMap,
}

/// What came back, if anything.
pub enum Outcome<'a> {
    Response {
        status: StatusCode,
        headers: &'a HeaderMap,
        body: &'a str,
    },
    Error(&'a dyn fmt::Display),
}

/// Log the exchange at debug level.
pub fn dump(exchange: &Exchange<'_>, outcome: &Outcome<'_>) {
    debug!("\n{}", render(exchange, outcome));
}

pub fn render(exchange: &Exchange<'_>, outcome: &Outcome<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}\nREQUEST/RESPONSE DUMP\n{RULE}");
    let _ = writeln!(out, "REQUEST: {} {}", exchange.method, exchange.url);

    if !exchange.params.is_empty() {
        let params: Map<String, JsonValue> = exchange
            .params
            .iter()
            .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
            .collect();
        let _ = writeln!(out, "PARAMS:\n{}", pretty(&JsonValue::Object(params)));
    }

    if !exchange.headers.is_empty() {
        let _ = writeln!(out, "HEADERS:\n{}", pretty(&headers_json(exchange.headers, true)));
    }

    match outcome {
        Outcome::Response {
            status,
            headers,
            body,
        } => {
            let _ = writeln!(out, "RESPONSE STATUS: {}", status.as_u16());
            let _ = writeln!(out, "RESPONSE HEADERS:\n{}", pretty(&headers_json(headers, false)));
            if body.is_empty() {
                let _ = writeln!(out, "RESPONSE BODY: <empty>");
            } else if let Ok(json) = serde_json::from_str::<JsonValue>(body) {
                let _ = writeln!(out, "RESPONSE BODY (JSON):\n{}", pretty(&json));
            } else {
                let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
                let _ = writeln!(out, "RESPONSE BODY (TEXT):\n{preview}");
                if body.chars().nth(BODY_PREVIEW_CHARS).is_some() {
                    let _ = writeln!(out, "... (truncated)");
                }
            }
        }
        Outcome::Error(err) => {
            let _ = writeln!(out, "ERROR: {err}");
        }
    }

    out.push_str(RULE);
    out
}

fn headers_json(headers: &HeaderMap, mask_token: bool) -> JsonValue {
    let map: Map<String, JsonValue> = headers
        .iter()
        .map(|(name, value)| {
            let shown = if mask_token && name.as_str().eq_ignore_ascii_case(TOKEN_HEADER) {
                MASK.to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), JsonValue::String(shown))
        })
        .collect();
    JsonValue::Object(map)
}

fn pretty(value: &JsonValue) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
