//! MatchesPoller processor.
//!
//! The pub/sub bus gives no delivery guarantee, so a `parlay_resolved`
//! message lost to a crash would strand its match forever. The poller is
//! the failsafe: every cycle it finds unresolved matches whose league has
//! nothing left to wait for and re-emits a synthetic `match_check` trigger
//! into the settlement engine.

use crate::entities::matches::Match;
use crate::events::{EventPublisher, MatchCheck};
use sqlx::PgPool;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;
use tracing::{error, info};

/// Default poll cycle.
pub const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(300);

/// Delay after a failed cycle, to avoid rapid failure loops.
const ERROR_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(30);

/// MatchesPoller periodically re-triggers match settlement checks.
pub struct MatchesPoller {
    pool: PgPool,
    publisher: EventPublisher,
    interval: std::time::Duration,
}

impl MatchesPoller {
    pub fn new(pool: PgPool, publisher: EventPublisher, interval: std::time::Duration) -> Self {
        Self {
            pool,
            publisher,
            interval,
        }
    }

    /// Run the MatchesPoller until shutdown is signaled.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("MatchesPoller started");

        loop {
            let delay = match self.poll_once().await {
                Ok(0) => self.interval,
                Ok(count) => {
                    info!(matches = count, "Sent match_check triggers");
                    self.interval
                }
                Err(e) => {
                    error!(error = %e, "Polling cycle failed");
                    ERROR_RETRY_DELAY
                }
            };

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("MatchesPoller received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("MatchesPoller shutdown complete");
    }

    /// One polling cycle: find candidates, emit one trigger per match.
    async fn poll_once(&self) -> Result<usize, sqlx::Error> {
        let matches = Match::stale_unresolved(&self.pool).await?;
        if matches.is_empty() {
            return Ok(0);
        }

        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        for m in &matches {
            self.publisher
                .publish(&MatchCheck {
                    match_id: m.id,
                    league: m.league,
                    triggered_by: "poller".to_string(),
                    timestamp: timestamp.clone(),
                })
                .await;
        }

        Ok(matches.len())
    }
}
