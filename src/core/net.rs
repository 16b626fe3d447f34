// src/core/net.rs

// HTTP GET via a shared blocking client. One client per run; workers clone it
// (reqwest clients are cheap handles over a shared pool).

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;

use crate::config::consts::USER_AGENT;
use crate::error::ScrapeError;

pub fn build_client(timeout: Duration) -> Result<Client, ScrapeError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(|e| ScrapeError::network("<client>", e.to_string()))
}

/// Fetch one page and return the body as a String.
///
/// Status mapping: 404 → `NotFound` (common for delisted cards), any other
/// non-2xx → `Network`; transport failures (connect, timeout) → `Network`.
pub fn http_get(client: &Client, url: &str) -> Result<String, ScrapeError> {
    let resp = client
        .get(url)
        .send()
        .map_err(|e| transport_error(url, &e))?;

    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ScrapeError::not_found(url));
    }
    if !status.is_success() {
        return Err(ScrapeError::network(url, format!("HTTP {status}")));
    }

    resp.text().map_err(|e| transport_error(url, &e))
}

fn transport_error(url: &str, e: &reqwest::Error) -> ScrapeError {
    let reason = if e.is_timeout() {
        s!("timed out")
    } else if e.is_connect() {
        format!("connect failed: {e}")
    } else {
        e.to_string()
    };
    ScrapeError::network(url, reason)
}
