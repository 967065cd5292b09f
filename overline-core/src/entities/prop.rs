use crate::entities::League;
use sqlx::PgConnection;

/// A statistical over/under line offered on a player's in-game performance.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Prop {
    pub id: i64,
    pub player_id: i64,
    pub league: League,
    pub game_id: String,
    pub stat_name: String,
    pub line: f64,
    pub current_value: Option<f64>,
    pub status: PropStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "prop_status", rename_all = "snake_case")]
pub enum PropStatus {
    NotResolved,
    Resolved,
    DidNotPlay,
}

/// The value/line/status subset both settlement stages work from.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PropSnapshot {
    pub id: i64,
    pub line: f64,
    pub current_value: Option<f64>,
    pub status: PropStatus,
}

impl Prop {
    /// Look up the prop matching one extracted stat line.
    pub async fn find_for_stat_line_tx(
        conn: &mut PgConnection,
        player_id: i64,
        stat_name: &str,
        league: League,
        game_id: &str,
    ) -> Result<Option<PropSnapshot>, sqlx::Error> {
        sqlx::query_as::<_, PropSnapshot>(
            r#"
            SELECT id, line, current_value, status
            FROM props
            WHERE player_id = $1 AND stat_name = $2 AND league = $3 AND game_id = $4
            "#,
        )
        .bind(player_id)
        .bind(stat_name)
        .bind(league)
        .bind(game_id)
        .fetch_optional(conn)
        .await
    }

    /// Write a new value/status pair onto a prop row.
    ///
    /// The update is a no-op (and returns `false`) when neither field would
    /// change, so callers emit `prop_updated` only for real changes.
    pub async fn apply_value_tx(
        conn: &mut PgConnection,
        id: i64,
        current_value: f64,
        status: PropStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE props
            SET current_value = $2, status = $3
            WHERE id = $1
              AND (current_value IS DISTINCT FROM $2 OR status IS DISTINCT FROM $3)
            "#,
        )
        .bind(id)
        .bind(current_value)
        .bind(status)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark every still-open prop of a completed game whose player produced
    /// no stats as `did_not_play` (value 0). Returns the affected prop ids.
    pub async fn mark_absent_players_dnp_tx(
        conn: &mut PgConnection,
        league: League,
        game_id: &str,
        players_with_stats: &[i64],
    ) -> Result<Vec<i64>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (i64,)>(
            r#"
            UPDATE props
            SET status = 'did_not_play', current_value = 0
            WHERE league = $1 AND game_id = $2
              AND status = 'not_resolved'
              AND player_id <> ALL($3)
            RETURNING id
            "#,
        )
        .bind(league)
        .bind(game_id)
        .bind(players_with_stats)
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Load the fields the pick resolver needs.
    pub async fn snapshot_tx(
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<Option<PropSnapshot>, sqlx::Error> {
        sqlx::query_as::<_, PropSnapshot>(
            r#"
            SELECT id, line, current_value, status
            FROM props
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Count props of a league still open on games that have not started.
    ///
    /// This is the guard that keeps a match from settling while games it
    /// depends on are still live or upcoming.
    pub async fn count_open_for_league_tx(
        conn: &mut PgConnection,
        league: League,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM props p
            JOIN games g ON p.game_id = g.game_id
            WHERE g.league = $1
              AND p.status = 'not_resolved'
              AND g.start_time > NOW()
            "#,
        )
        .bind(league)
        .fetch_one(conn)
        .await?;
        Ok(count)
    }
}
