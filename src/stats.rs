//! Server load statistics feed and fastest-server selection

use crate::error::{Result, SwitchError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Load entry for a single server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ServerLoad {
    /// Current utilization percentage
    pub percent: u8,
}

/// Mapping of server identifier to current load.
///
/// A `BTreeMap` so iteration order is the lexicographic key order; the
/// selection tie-break below is therefore deterministic and explicit.
pub type LoadReport = BTreeMap<String, ServerLoad>;

/// A selected server and its load at selection time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub server: String,
    pub percent: u8,
}

/// Client for the remote statistics endpoint
#[derive(Debug)]
pub struct StatsFeed {
    http: reqwest::Client,
    url: String,
}

/// Request timeout for the feed; the payload is a single small JSON document
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

impl StatsFeed {
    /// Create a feed client for the given URL
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| SwitchError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(StatsFeed {
            http,
            url: url.into(),
        })
    }

    /// Fetch and decode the current load report.
    ///
    /// Performs a single GET; there is no retry at this layer. Connection or
    /// status failures are transport errors, a payload that does not decode
    /// into server-to-percent entries is a decode error.
    pub async fn fetch(&self) -> Result<LoadReport> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SwitchError::Transport(format!("Failed to reach {}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SwitchError::Transport(format!(
                "{} returned {status}",
                self.url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SwitchError::Transport(format!("Failed to read response body: {e}")))?;

        let report: LoadReport = serde_json::from_str(&body)?;
        Ok(report)
    }
}

/// Upper bound on usable load; a server at or above this is never selected
const LOAD_CEILING: u8 = 100;

/// Pick the least-loaded server from the report.
///
/// Single pass with a strictly-less comparison, so ties keep the first entry
/// in iteration order, which for a [`LoadReport`] is the lexicographically
/// smallest identifier. Returns `None` for an empty report and when every
/// server is at full load.
pub fn fastest(report: &LoadReport) -> Option<Selection> {
    let mut floor = LOAD_CEILING;
    let mut best = None;

    for (server, load) in report {
        if load.percent < floor {
            floor = load.percent;
            best = Some(Selection {
                server: server.clone(),
                percent: load.percent,
            });
        }
    }

    best
}
