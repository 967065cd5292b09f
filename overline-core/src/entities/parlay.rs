use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

/// A bundle of picks with a stake and a payout rule. Owned by either a
/// match user or a dynasty-league user, never both.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Parlay {
    pub id: i64,
    pub match_user_id: Option<i64>,
    pub dynasty_league_user_id: Option<i64>,
    pub stake: Decimal,
    #[sqlx(rename = "type")]
    pub parlay_type: ParlayType,
    pub resolved: bool,
    pub payout: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "parlay_type", rename_all = "snake_case")]
pub enum ParlayType {
    Perfect,
    Flex,
}

/// The joined row the settlement engine starts from: the parlay a pick
/// belongs to, plus whichever owner reference is populated.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ParlayForSettlement {
    pub id: i64,
    pub stake: Decimal,
    #[sqlx(rename = "type")]
    pub parlay_type: ParlayType,
    pub resolved: bool,
    pub match_user_id: Option<i64>,
    pub dynasty_league_user_id: Option<i64>,
    pub match_id: Option<i64>,
    pub match_user_user_id: Option<Uuid>,
    pub dynasty_league_id: Option<i64>,
    pub dynasty_user_id: Option<Uuid>,
}

/// The owner a resolved parlay pays out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParlayOwner {
    Match {
        match_user_id: i64,
        match_id: i64,
        user_id: Uuid,
    },
    DynastyLeague {
        dynasty_league_user_id: i64,
        dynasty_league_id: i64,
        user_id: Uuid,
    },
}

impl ParlayForSettlement {
    pub fn owner(&self) -> Option<ParlayOwner> {
        if let (Some(match_user_id), Some(match_id), Some(user_id)) =
            (self.match_user_id, self.match_id, self.match_user_user_id)
        {
            return Some(ParlayOwner::Match {
                match_user_id,
                match_id,
                user_id,
            });
        }
        if let (Some(dynasty_league_user_id), Some(dynasty_league_id), Some(user_id)) = (
            self.dynasty_league_user_id,
            self.dynasty_league_id,
            self.dynasty_user_id,
        ) {
            return Some(ParlayOwner::DynastyLeague {
                dynasty_league_user_id,
                dynasty_league_id,
                user_id,
            });
        }
        None
    }
}

/// Stake/resolution view of a parlay, for match settlement.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ParlayOutcome {
    pub id: i64,
    pub stake: Decimal,
    pub resolved: bool,
}

impl Parlay {
    /// Resolve the parlay a pick belongs to, joined with its owner row.
    pub async fn find_by_pick_tx(
        conn: &mut PgConnection,
        pick_id: i64,
    ) -> Result<Option<ParlayForSettlement>, sqlx::Error> {
        sqlx::query_as::<_, ParlayForSettlement>(
            r#"
            SELECT
                p.id,
                p.stake,
                p.type,
                p.resolved,
                p.match_user_id,
                p.dynasty_league_user_id,
                mu.match_id,
                mu.user_id AS match_user_user_id,
                dlu.dynasty_league_id,
                dlu.user_id AS dynasty_user_id
            FROM picks pk
            JOIN parlays p ON pk.parlay_id = p.id
            LEFT JOIN match_users mu ON p.match_user_id = mu.id
            LEFT JOIN dynasty_league_users dlu ON p.dynasty_league_user_id = dlu.id
            WHERE pk.id = $1
            "#,
        )
        .bind(pick_id)
        .fetch_optional(conn)
        .await
    }

    /// Lock the parlay row and return its current `resolved` flag.
    ///
    /// The row lock is the cross-process mutual exclusion that serializes
    /// duplicate deliveries of the same `pick_resolved` message.
    pub async fn lock_tx(conn: &mut PgConnection, id: i64) -> Result<Option<bool>, sqlx::Error> {
        let row = sqlx::query_as::<_, (i64, bool)>(
            r#"
            SELECT id, resolved
            FROM parlays
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(row.map(|(_, resolved)| resolved))
    }

    /// Flip the parlay to resolved and record its payout.
    pub async fn mark_resolved_tx(
        conn: &mut PgConnection,
        id: i64,
        payout: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE parlays
            SET resolved = true, payout = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(payout)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// All parlays placed by one match user.
    pub async fn for_match_user_tx(
        conn: &mut PgConnection,
        match_user_id: i64,
    ) -> Result<Vec<ParlayOutcome>, sqlx::Error> {
        sqlx::query_as::<_, ParlayOutcome>(
            r#"
            SELECT id, stake, resolved
            FROM parlays
            WHERE match_user_id = $1
            "#,
        )
        .bind(match_user_id)
        .fetch_all(conn)
        .await
    }
}

/// A user's seat in a dynasty league; the alternate parlay owner.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DynastyLeagueUser {
    pub id: i64,
    pub dynasty_league_id: i64,
    pub user_id: Uuid,
    pub balance: Decimal,
}

impl DynastyLeagueUser {
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
            UPDATE dynasty_league_users
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
}
