//! HTTP client for the live-stats feed.

use crate::entities::League;
use crate::feed::FeedGame;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use time::Date;
use time::macros::format_description;

/// Errors from the live-stats feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// HTTP request error
    #[error("feed request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The feed answered but without the requested league
    #[error("feed response missing league {0}")]
    MissingLeague(League),

    /// Date formatting error
    #[error("date formatting error: {0}")]
    DateFormat(#[from] time::error::Format),
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    data: HashMap<String, Vec<FeedGame>>,
}

/// Read-side client for `GET {base}/live/{date}/{league}`.
pub struct FeedClient {
    base_url: String,
    api_token: String,
    http_client: reqwest::Client,
}

impl FeedClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Fetch the games of one league on one date.
    ///
    /// A `304 Not Modified` means no games for the day and yields an empty
    /// list rather than an error.
    pub async fn live_games(&self, date: Date, league: League) -> Result<Vec<FeedGame>, FeedError> {
        let date_str = date.format(format_description!("[year]-[month]-[day]"))?;
        let url = format!("{}/live/{}/{}", self.base_url, date_str, league);

        let response = self
            .http_client
            .get(&url)
            .query(&[("RSC_token", self.api_token.as_str())])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(Vec::new());
        }

        let envelope: FeedEnvelope = response.error_for_status()?.json().await?;
        envelope
            .data
            .get(league.as_str())
            .cloned()
            .ok_or(FeedError::MissingLeague(league))
    }
}
