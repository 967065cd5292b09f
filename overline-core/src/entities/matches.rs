use crate::entities::League;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use sqlx::PgPool;
use uuid::Uuid;

/// A head-to-head session between two users, settled by comparing the
/// balances their parlays produced.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Match {
    pub id: i64,
    #[sqlx(rename = "type")]
    pub match_type: MatchType,
    pub league: League,
    pub resolved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "match_type", rename_all = "snake_case")]
pub enum MatchType {
    Casual,
    Competitive,
}

/// One user's seat in a match.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MatchUser {
    pub id: i64,
    pub match_id: i64,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub starting_balance: Decimal,
    pub points_snapshot: f64,
    pub points_delta: f64,
    pub status: MatchUserStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "match_user_status", rename_all = "snake_case")]
pub enum MatchUserStatus {
    NotResolved,
    Win,
    Loss,
    Draw,
    Disqualified,
}

/// An unresolved match the poller wants re-checked.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StaleMatch {
    pub id: i64,
    pub league: League,
}

impl Match {
    /// Resolve the match a parlay belongs to, via its owning match user.
    /// `None` for dynasty-league parlays, which have no match.
    pub async fn id_by_parlay_tx(
        conn: &mut PgConnection,
        parlay_id: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT m.id
            FROM parlays p
            JOIN match_users mu ON p.match_user_id = mu.id
            JOIN matches m ON mu.match_id = m.id
            WHERE p.id = $1
            "#,
        )
        .bind(parlay_id)
        .fetch_optional(conn)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Lock the match row for settlement and return its current state.
    ///
    /// Row lock first, `resolved` check second: concurrent settlement
    /// attempts on the same match serialize here.
    pub async fn lock_tx(conn: &mut PgConnection, id: i64) -> Result<Option<Match>, sqlx::Error> {
        sqlx::query_as::<_, Match>(
            r#"
            SELECT id, type, league, resolved
            FROM matches
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn mark_resolved_tx(conn: &mut PgConnection, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE matches SET resolved = true WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Unresolved matches from the last 24 hours whose league has no open
    /// prop on a game that has yet to start. These are the candidates the
    /// poller re-triggers, compensating for dropped `parlay_resolved`
    /// messages.
    pub async fn stale_unresolved(pool: &PgPool) -> Result<Vec<StaleMatch>, sqlx::Error> {
        sqlx::query_as::<_, StaleMatch>(
            r#"
            SELECT DISTINCT m.id, m.league
            FROM matches m
            WHERE m.resolved = false
              AND m.created_at > NOW() - INTERVAL '24 hours'
              AND NOT EXISTS (
                  SELECT 1
                  FROM props p
                  JOIN games g ON p.game_id = g.game_id
                  WHERE g.league = m.league
                    AND p.status = 'not_resolved'
                    AND g.start_time > NOW()
              )
            "#,
        )
        .fetch_all(pool)
        .await
    }
}

impl MatchUser {
    /// Both seats of a match, in stable id order.
    pub async fn for_match_tx(
        conn: &mut PgConnection,
        match_id: i64,
    ) -> Result<Vec<MatchUser>, sqlx::Error> {
        sqlx::query_as::<_, MatchUser>(
            r#"
            SELECT id, match_id, user_id, balance, starting_balance,
                   points_snapshot, points_delta, status
            FROM match_users
            WHERE match_id = $1
            ORDER BY id
            "#,
        )
        .bind(match_id)
        .fetch_all(conn)
        .await
    }

    /// Credit a payout onto the seat's balance. Always a relative
    /// increment so re-delivery and concurrent credits cannot clobber
    /// each other.
    pub async fn credit_balance_tx(
        conn: &mut PgConnection,
        id: i64,
        amount: Decimal,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE match_users
            SET balance = balance + $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(amount)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_status_tx(
        conn: &mut PgConnection,
        id: i64,
        status: MatchUserStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE match_users SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn set_points_delta_tx(
        conn: &mut PgConnection,
        id: i64,
        points_delta: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE match_users SET points_delta = $2 WHERE id = $1")
            .bind(id)
            .bind(points_delta)
            .execute(conn)
            .await?;
        Ok(())
    }
}
