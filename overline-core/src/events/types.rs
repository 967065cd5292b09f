//! Message payload definitions.
//!
//! Field names are the wire format consumed by the other stages and by the
//! external cache/notification services, so the camelCase renames here are
//! load-bearing.

use crate::entities::League;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A payload tied to the channel it is published on.
pub trait BusMessage: Serialize {
    const CHANNEL: &'static str;

    fn channel(&self) -> &'static str {
        Self::CHANNEL
    }
}

/// Per-league variant of the `stats_updated` channel.
pub fn stats_updated_channel(league: League) -> String {
    format!("{}_{}", StatsUpdated::CHANNEL, league)
}

/// Live stats changed for a league. Produced by the (external) feed poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsUpdated {
    pub league: League,
}

impl BusMessage for StatsUpdated {
    const CHANNEL: &'static str = "stats_updated";
}

/// A prop row's value or status actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropUpdated {
    pub id: i64,
}

impl BusMessage for PropUpdated {
    const CHANNEL: &'static str = "prop_updated";
}

/// A pick's status moved (or its prop was touched while still open).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickResolved {
    pub id: i64,
}

impl BusMessage for PickResolved {
    const CHANNEL: &'static str = "pick_resolved";
}

/// A parlay settled and its owner's balance was credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParlayResolved {
    #[serde(rename = "parlayId")]
    pub parlay_id: i64,
}

impl BusMessage for ParlayResolved {
    const CHANNEL: &'static str = "parlay_resolved";
}

/// Synthetic re-check trigger from the matches poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCheck {
    #[serde(rename = "matchId")]
    pub match_id: i64,
    pub league: League,
    pub triggered_by: String,
    pub timestamp: String,
}

impl BusMessage for MatchCheck {
    const CHANNEL: &'static str = "match_check";
}

/// Cache-invalidation notice for the (external) query-cache layer.
///
/// Each key is a heterogeneous JSON array such as `["parlay", 3]`, mirroring
/// the cache layer's key tuples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidateQueries {
    pub keys: Vec<serde_json::Value>,
}

impl BusMessage for InvalidateQueries {
    const CHANNEL: &'static str = "invalidate_queries";
}

/// Push-notification request for the (external) delivery service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "receiverIdsList")]
    pub receiver_ids: Vec<Uuid>,
    pub event: String,
    pub data: serde_json::Value,
}

impl BusMessage for Notification {
    const CHANNEL: &'static str = "notification";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parlay_resolved_uses_camel_case_id() {
        let msg = ParlayResolved { parlay_id: 42 };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"parlayId": 42}));
    }

    #[test]
    fn match_check_wire_format() {
        let msg = MatchCheck {
            match_id: 5,
            league: League::Nba,
            triggered_by: "poller".to_string(),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "matchId": 5,
                "league": "NBA",
                "triggered_by": "poller",
                "timestamp": "2025-01-01T00:00:00Z",
            })
        );
    }

    #[test]
    fn notification_wire_format() {
        let user = Uuid::nil();
        let msg = Notification {
            receiver_ids: vec![user],
            event: "match-parlay-resolved".to_string(),
            data: json!({"matchId": 1, "parlayId": 2}),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["receiverIdsList"][0], json!(user.to_string()));
        assert_eq!(value["event"], json!("match-parlay-resolved"));
    }

    #[test]
    fn per_league_channel_names() {
        assert_eq!(stats_updated_channel(League::Nba), "stats_updated_NBA");
        assert_eq!(stats_updated_channel(League::Mlb), "stats_updated_MLB");
    }
}
