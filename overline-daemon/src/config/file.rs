//! TOML file configuration structures.
//!
//! These structs directly map to the `overline-config.toml` file format.

use overline_core::entities::League;
use serde::{Deserialize, Serialize};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub feed: FeedConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
}

/// Live-stats feed section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the stats feed API.
    pub base_url: String,
    /// Feed API token, appended to every request.
    pub api_token: String,
}

/// Settlement tuning section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Leagues this deployment settles.
    #[serde(default = "default_leagues")]
    pub leagues: Vec<League>,
    /// Seconds between matches-poller cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            leagues: default_leagues(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_leagues() -> Vec<League> {
    League::ALL.to_vec()
}

fn default_poll_interval_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[feed]
base_url = "https://feeds.example.com"
api_token = "token123"

[settlement]
leagues = ["NBA", "MLB"]
poll_interval_secs = 120
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.feed.base_url, "https://feeds.example.com");
        assert_eq!(config.settlement.leagues, vec![League::Nba, League::Mlb]);
        assert_eq!(config.settlement.poll_interval_secs, 120);
    }

    #[test]
    fn test_settlement_section_is_optional() {
        let toml_str = r#"
[feed]
base_url = "https://feeds.example.com"
api_token = "token123"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.settlement.leagues.len(), 5);
        assert_eq!(config.settlement.poll_interval_secs, 300);
    }
}
