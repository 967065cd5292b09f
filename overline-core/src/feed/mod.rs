//! Live-stats feed consumption.
//!
//! The feed itself is an external collaborator: a JSON API returning
//! per-game, per-player numeric statistics keyed by stat name. This module
//! holds the read-side client and the per-sport extractors that turn a raw
//! game payload into `(player_id, stat_name, value)` lines matching the
//! `stat_name` values the prop rows were generated with.

pub mod client;
pub mod extract;

pub use client::{FeedClient, FeedError};
pub use extract::{StatLine, StatsExtractor, extractor_for};

use serde::Deserialize;

/// One game as returned by the live feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedGame {
    #[serde(rename = "game_ID")]
    pub game_id: String,
    pub status: GameStatus,
    /// Per-team player boxes; shape is sport-specific, so it stays raw JSON
    /// until the sport's extractor interprets it.
    #[serde(default)]
    pub player_box: serde_json::Value,
}

/// Feed-reported game status. The feed vocabulary is open-ended; only
/// completion matters to settlement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct GameStatus(pub String);

impl GameStatus {
    /// Whether the game is over and its stats are final.
    pub fn is_final(&self) -> bool {
        matches!(self.0.as_str(), "completed" | "final")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_status_finality() {
        assert!(GameStatus("completed".to_string()).is_final());
        assert!(GameStatus("final".to_string()).is_final());
        assert!(!GameStatus("in_progress".to_string()).is_final());
        assert!(!GameStatus("scheduled".to_string()).is_final());
    }

    #[test]
    fn feed_game_deserializes() {
        let game: FeedGame = serde_json::from_str(
            r#"{"game_ID": "20250101-BOS-LAL", "status": "in_progress",
                "player_box": {"home_team": {}, "away_team": {}}}"#,
        )
        .unwrap();
        assert_eq!(game.game_id, "20250101-BOS-LAL");
        assert!(!game.status.is_final());
    }
}
