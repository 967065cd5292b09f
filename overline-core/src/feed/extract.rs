//! Per-sport stat extraction.
//!
//! Each sport reads its own player-box shape and emits canonical stat
//! names — the same names the prop generator writes into `props.stat_name`.
//! Sports are selected once through a static registry keyed by league
//! rather than looked up dynamically per event.

use crate::entities::League;
use crate::feed::FeedGame;
use serde_json::Value;

/// One extracted per-player statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct StatLine {
    pub player_id: i64,
    pub stat_name: String,
    pub value: f64,
}

/// Sport-specific interpretation of a feed game's player boxes.
pub trait StatsExtractor: Send + Sync {
    fn sport(&self) -> &'static str;

    /// Extract every tracked stat line from a game payload.
    fn extract(&self, game: &FeedGame) -> Vec<StatLine>;
}

/// The extractor responsible for a league.
pub fn extractor_for(league: League) -> &'static dyn StatsExtractor {
    match league {
        League::Mlb => &BaseballExtractor,
        League::Nba | League::Ncaabb => &BasketballExtractor,
        League::Nfl | League::Ncaafb => &FootballExtractor,
    }
}

const TEAMS: [&str; 2] = ["home_team", "away_team"];

/// Feed-key -> canonical stat name pairs tracked for basketball.
const BASKETBALL_FIELDS: &[(&str, &str)] = &[
    ("points", "points"),
    ("total_rebounds", "rebounds"),
    ("assists", "assists"),
    ("three_points_made", "three_points_made"),
    ("three_points_attempted", "three_points_attempted"),
    ("blocks", "blocks"),
    ("steals", "steals"),
    ("turnovers", "turnovers"),
];

const FOOTBALL_FIELDS: &[(&str, &str)] = &[
    ("passing_yards", "passing_yards"),
    ("rushing_yards", "rushing_yards"),
    ("receiving_yards", "receiving_yards"),
    ("receptions", "receptions"),
    ("completions", "completions"),
    ("passing_attempts", "passing_attempts"),
    ("rushing_attempts", "rushing_attempts"),
    ("passing_touchdowns", "passing_touchdowns"),
    ("rushing_touchdowns", "rushing_touchdowns"),
    ("receiving_touchdowns", "receiving_touchdowns"),
    ("passing_interceptions", "passing_interceptions"),
    ("field_goals_made", "field_goals_made"),
];

const BASEBALL_BATTING_FIELDS: &[(&str, &str)] = &[
    ("hits", "hits"),
    ("runs", "runs"),
    ("rbis", "rbis"),
    ("home_runs", "home_runs"),
    ("doubles", "doubles"),
    ("triples", "triples"),
    ("strikeouts", "strikeouts"),
    ("stolen_bases", "stolen_bases"),
];

/// Pitching shares feed keys with batting (e.g. `strikeouts`), so the
/// canonical names carry the `pitching_` prefix where the prop generator
/// distinguishes them.
const BASEBALL_PITCHING_FIELDS: &[(&str, &str)] = &[
    ("strikeouts", "pitching_strikeouts"),
    ("walks", "pitching_walks"),
    ("earned_runs", "earned_runs"),
    ("hits_allowed", "hits_allowed"),
    ("pitches_thrown", "pitches_thrown"),
];

pub struct BasketballExtractor;
pub struct FootballExtractor;
pub struct BaseballExtractor;

impl StatsExtractor for BasketballExtractor {
    fn sport(&self) -> &'static str {
        "basketball"
    }

    fn extract(&self, game: &FeedGame) -> Vec<StatLine> {
        extract_flat_boxes(&game.player_box, BASKETBALL_FIELDS)
    }
}

impl StatsExtractor for FootballExtractor {
    fn sport(&self) -> &'static str {
        "football"
    }

    fn extract(&self, game: &FeedGame) -> Vec<StatLine> {
        extract_flat_boxes(&game.player_box, FOOTBALL_FIELDS)
    }
}

impl StatsExtractor for BaseballExtractor {
    fn sport(&self) -> &'static str {
        "baseball"
    }

    fn extract(&self, game: &FeedGame) -> Vec<StatLine> {
        let mut lines = Vec::new();
        for team in TEAMS {
            let Some(team_box) = game.player_box.get(team) else {
                continue;
            };
            if let Some(batting) = team_box.get("batting") {
                extract_players(batting, BASEBALL_BATTING_FIELDS, &mut lines);
            }
            if let Some(pitching) = team_box.get("pitching") {
                extract_players(pitching, BASEBALL_PITCHING_FIELDS, &mut lines);
            }
        }
        lines
    }
}

/// Basketball/football shape: `player_box.{team} = {player_id: {stat: value}}`.
fn extract_flat_boxes(player_box: &Value, fields: &[(&str, &str)]) -> Vec<StatLine> {
    let mut lines = Vec::new();
    for team in TEAMS {
        if let Some(team_box) = player_box.get(team) {
            extract_players(team_box, fields, &mut lines);
        }
    }
    lines
}

fn extract_players(players: &Value, fields: &[(&str, &str)], out: &mut Vec<StatLine>) {
    let Some(players) = players.as_object() else {
        return;
    };
    for (player_key, stats) in players {
        let Ok(player_id) = player_key.parse::<i64>() else {
            continue;
        };
        for (feed_key, stat_name) in fields {
            if let Some(value) = stats.get(*feed_key).and_then(Value::as_f64) {
                out.push(StatLine {
                    player_id,
                    stat_name: (*stat_name).to_string(),
                    value,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::GameStatus;
    use serde_json::json;

    fn game(player_box: Value) -> FeedGame {
        FeedGame {
            game_id: "g1".to_string(),
            status: GameStatus("completed".to_string()),
            player_box,
        }
    }

    #[test]
    fn basketball_extracts_tracked_stats_with_canonical_names() {
        let game = game(json!({
            "home_team": {
                "2544": {"points": 31, "total_rebounds": 8, "minutes": "36:20"},
            },
            "away_team": {
                "201939": {"points": 27, "three_points_made": 6},
            },
        }));

        let mut lines = BasketballExtractor.extract(&game);
        lines.sort_by_key(|l| (l.player_id, l.stat_name.clone()));

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].player_id, 2544);
        assert_eq!(lines[0].stat_name, "points");
        assert_eq!(lines[0].value, 31.0);
        // feed's total_rebounds arrives under the prop name
        assert_eq!(lines[1].stat_name, "rebounds");
        assert_eq!(lines[1].value, 8.0);
    }

    #[test]
    fn baseball_prefixes_pitching_stats() {
        let game = game(json!({
            "home_team": {
                "batting": {"660271": {"hits": 2, "strikeouts": 1}},
                "pitching": {"477132": {"strikeouts": 9, "walks": 2}},
            },
            "away_team": {},
        }));

        let lines = BaseballExtractor.extract(&game);
        let batter_k = lines
            .iter()
            .find(|l| l.player_id == 660271 && l.stat_name == "strikeouts")
            .unwrap();
        assert_eq!(batter_k.value, 1.0);
        let pitcher_k = lines
            .iter()
            .find(|l| l.player_id == 477132 && l.stat_name == "pitching_strikeouts")
            .unwrap();
        assert_eq!(pitcher_k.value, 9.0);
    }

    #[test]
    fn non_numeric_player_keys_are_skipped() {
        let game = game(json!({
            "home_team": {"totals": {"points": 110}},
            "away_team": {},
        }));
        assert!(BasketballExtractor.extract(&game).is_empty());
    }

    #[test]
    fn registry_routes_college_leagues_to_pro_sports() {
        assert_eq!(extractor_for(League::Ncaabb).sport(), "basketball");
        assert_eq!(extractor_for(League::Ncaafb).sport(), "football");
        assert_eq!(extractor_for(League::Mlb).sport(), "baseball");
    }
}
