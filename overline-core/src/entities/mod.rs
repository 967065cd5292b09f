pub mod battle_pass;
pub mod matches;
pub mod parlay;
pub mod pick;
pub mod prop;
pub mod user;

/// League a game, prop, or match belongs to.
///
/// Stored as the `league` Postgres enum and carried verbatim in feed URLs
/// and event payloads, so variants keep their uppercase wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "league")]
pub enum League {
    #[sqlx(rename = "MLB")]
    #[serde(rename = "MLB")]
    Mlb,
    #[sqlx(rename = "NBA")]
    #[serde(rename = "NBA")]
    Nba,
    #[sqlx(rename = "NFL")]
    #[serde(rename = "NFL")]
    Nfl,
    #[sqlx(rename = "NCAAFB")]
    #[serde(rename = "NCAAFB")]
    Ncaafb,
    #[sqlx(rename = "NCAABB")]
    #[serde(rename = "NCAABB")]
    Ncaabb,
}

impl League {
    pub const ALL: [League; 5] = [
        League::Mlb,
        League::Nba,
        League::Nfl,
        League::Ncaafb,
        League::Ncaabb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            League::Mlb => "MLB",
            League::Nba => "NBA",
            League::Nfl => "NFL",
            League::Ncaafb => "NCAAFB",
            League::Ncaabb => "NCAABB",
        }
    }
}

impl std::fmt::Display for League {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for League {
    type Err = UnknownLeague;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MLB" => Ok(League::Mlb),
            "NBA" => Ok(League::Nba),
            "NFL" => Ok(League::Nfl),
            "NCAAFB" => Ok(League::Ncaafb),
            "NCAABB" => Ok(League::Ncaabb),
            _ => Err(UnknownLeague(s.to_string())),
        }
    }
}

/// Error for a league string outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown league: {0}")]
pub struct UnknownLeague(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn league_round_trips_through_wire_form() {
        for league in League::ALL {
            assert_eq!(league.as_str().parse::<League>(), Ok(league));
        }
        assert!("XFL".parse::<League>().is_err());
    }
}
