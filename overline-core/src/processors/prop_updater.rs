//! PropStatusUpdater processor.
//!
//! The PropStatusUpdater is responsible for:
//! - Receiving `stats_updated {league}` events (global and per-league channels)
//! - Fetching the live feed for the league's games from yesterday and today
//! - Running the sport's `StatsExtractor` over each game's player boxes
//! - Writing `current_value`/`status` onto the matching prop rows
//! - Marking props of absent players `did_not_play` once a game completes
//! - Emitting `prop_updated {id}` for every row actually changed
//!
//! Each game runs in its own transaction with a short retry schedule on
//! transient pool errors, so one stuck game cannot block the rest of the
//! slate.

use crate::entities::League;
use crate::entities::prop::{Prop, PropStatus};
use crate::events::{EventPublisher, EventSubscriber, Notice, PropUpdated, StatsUpdated};
use crate::feed::{FeedClient, FeedError, FeedGame, StatsExtractor, extractor_for};
use crate::utils::retry::{MAX_RETRIES, is_transient, retry_delay};
use kanau::processor::Processor;
use sqlx::PgPool;
use thiserror::Error;
use time::macros::offset;
use time::{Date, OffsetDateTime, UtcOffset};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// The feed keys game days by US Eastern dates.
const EASTERN_OFFSET: UtcOffset = offset!(-5);

/// Errors that can occur while updating prop statuses.
#[derive(Debug, Error)]
pub enum PropUpdateError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Live feed error
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
}

/// PropStatusUpdater turns live game stats into prop value/status changes.
pub struct PropStatusUpdater {
    pool: PgPool,
    publisher: EventPublisher,
    feed: FeedClient,
}

impl PropStatusUpdater {
    pub fn new(pool: PgPool, publisher: EventPublisher, feed: FeedClient) -> Self {
        Self {
            pool,
            publisher,
            feed,
        }
    }

    /// Run the PropStatusUpdater until shutdown is signaled.
    pub async fn run(self, mut subscriber: EventSubscriber, mut shutdown_rx: watch::Receiver<bool>) {
        info!("PropStatusUpdater started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("PropStatusUpdater received shutdown signal");
                        break;
                    }
                }

                notice = subscriber.recv() => {
                    let Some(league) = league_from_notice(&notice) else {
                        error!(channel = %notice.channel, "Received stats update without league");
                        continue;
                    };

                    if let Err(e) = self.process(StatsUpdated { league }).await {
                        error!(%league, error = %e, "Failed to process stats update");
                    }
                }
            }
        }

        info!("PropStatusUpdater shutdown complete");
    }

    /// Process every game of one league in its own retried transaction.
    async fn process_game(
        &self,
        league: League,
        extractor: &dyn StatsExtractor,
        game: &FeedGame,
    ) -> Result<Vec<i64>, PropUpdateError> {
        let mut attempt = 0;
        loop {
            match self.try_process_game(league, extractor, game).await {
                Ok(updated) => return Ok(updated),
                Err(PropUpdateError::Database(e))
                    if is_transient(&e) && attempt < MAX_RETRIES =>
                {
                    warn!(
                        game_id = %game.game_id,
                        attempt,
                        error = %e,
                        "Transient database error, retrying game"
                    );
                    tokio::time::sleep(retry_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_process_game(
        &self,
        league: League,
        extractor: &dyn StatsExtractor,
        game: &FeedGame,
    ) -> Result<Vec<i64>, PropUpdateError> {
        let lines = extractor.extract(game);
        let mut tx = self.pool.begin().await?;

        let mut players_with_stats: Vec<i64> = Vec::new();
        let mut updated = Vec::new();

        for line in &lines {
            if !players_with_stats.contains(&line.player_id) {
                players_with_stats.push(line.player_id);
            }

            let Some(prop) = Prop::find_for_stat_line_tx(
                &mut tx,
                line.player_id,
                &line.stat_name,
                league,
                &game.game_id,
            )
            .await?
            else {
                continue;
            };

            if prop.status == PropStatus::DidNotPlay {
                continue;
            }

            // Terminal statuses stay put; the value may still refresh.
            let next_status = if prop.status == PropStatus::NotResolved {
                if game.status.is_final() || line.value > prop.line {
                    PropStatus::Resolved
                } else {
                    PropStatus::NotResolved
                }
            } else {
                prop.status
            };

            if Prop::apply_value_tx(&mut tx, prop.id, line.value, next_status).await? {
                updated.push(prop.id);
            }
        }

        if game.status.is_final() {
            let absent =
                Prop::mark_absent_players_dnp_tx(&mut tx, league, &game.game_id, &players_with_stats)
                    .await?;
            if !absent.is_empty() {
                debug!(
                    game_id = %game.game_id,
                    count = absent.len(),
                    "Marked props of absent players did_not_play"
                );
            }
            updated.extend(absent);
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Fetch one date's games, logging failures as an empty slate.
    async fn games_for_date(&self, date: Date, league: League) -> Vec<FeedGame> {
        match self.feed.live_games(date, league).await {
            Ok(games) => games,
            Err(e) => {
                warn!(%league, %date, error = %e, "Failed to fetch feed games");
                Vec::new()
            }
        }
    }
}

impl Processor<StatsUpdated> for PropStatusUpdater {
    type Output = ();
    type Error = PropUpdateError;

    async fn process(&self, event: StatsUpdated) -> Result<(), PropUpdateError> {
        let league = event.league;
        let (yesterday, today) = feed_dates();

        let (mut games, today_games) = tokio::join!(
            self.games_for_date(yesterday, league),
            self.games_for_date(today, league),
        );
        games.extend(today_games);
        debug!(%league, games = games.len(), "Fetched feed games");

        let extractor = extractor_for(league);
        let mut total_updated = 0usize;

        for game in &games {
            match self.process_game(league, extractor, game).await {
                Ok(updated) => {
                    total_updated += updated.len();
                    for id in updated {
                        self.publisher.publish(&PropUpdated { id }).await;
                    }
                }
                Err(e) => {
                    error!(
                        game_id = %game.game_id,
                        %league,
                        error = %e,
                        "Failed to process game, skipping"
                    );
                }
            }
        }

        info!(%league, props_updated = total_updated, "Stats update processed");
        Ok(())
    }
}

/// The league addressed by a `stats_updated` notice, from the per-league
/// channel suffix or the payload body.
fn league_from_notice(notice: &Notice) -> Option<League> {
    if let Some(suffix) = notice
        .channel
        .strip_prefix("stats_updated_")
    {
        if let Ok(league) = suffix.parse() {
            return Some(league);
        }
    }
    notice
        .decode::<StatsUpdated>()
        .ok()
        .map(|event| event.league)
}

/// Yesterday and today as the feed sees them.
fn feed_dates() -> (Date, Date) {
    let today = OffsetDateTime::now_utc().to_offset(EASTERN_OFFSET).date();
    (today.previous_day().unwrap_or(today), today)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn league_comes_from_channel_suffix() {
        let notice = Notice {
            channel: "stats_updated_NBA".to_string(),
            payload: String::new(),
        };
        assert_eq!(league_from_notice(&notice), Some(League::Nba));
    }

    #[test]
    fn league_falls_back_to_payload() {
        let notice = Notice {
            channel: "stats_updated".to_string(),
            payload: r#"{"league": "MLB"}"#.to_string(),
        };
        assert_eq!(league_from_notice(&notice), Some(League::Mlb));
    }

    #[test]
    fn garbage_notice_has_no_league() {
        let notice = Notice {
            channel: "stats_updated".to_string(),
            payload: "{}".to_string(),
        };
        assert_eq!(league_from_notice(&notice), None);
    }
}
