use sqlx::PgConnection;

/// A user's chosen side on one prop, belonging to a parlay.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Pick {
    pub id: i64,
    pub parlay_id: i64,
    pub prop_id: i64,
    pub choice: PickChoice,
    pub status: PickStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "pick_choice", rename_all = "snake_case")]
pub enum PickChoice {
    Over,
    Under,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "pick_status", rename_all = "snake_case")]
pub enum PickStatus {
    NotResolved,
    Hit,
    Missed,
    Tie,
    DidNotPlay,
}

/// A pick id together with its parlay, as returned by the batch updates;
/// feeds the `pick_resolved` / cache-invalidation fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct PickRef {
    pub id: i64,
    pub parlay_id: i64,
}

impl Pick {
    /// Resolve a prop's open over picks one way and its under picks the
    /// other, in a single statement.
    pub async fn resolve_over_under_tx(
        conn: &mut PgConnection,
        prop_id: i64,
        over_becomes: PickStatus,
        under_becomes: PickStatus,
    ) -> Result<Vec<PickRef>, sqlx::Error> {
        sqlx::query_as::<_, PickRef>(
            r#"
            UPDATE picks
            SET status = CASE choice
                WHEN 'over' THEN $2
                WHEN 'under' THEN $3
            END
            WHERE prop_id = $1 AND status = 'not_resolved'
            RETURNING id, parlay_id
            "#,
        )
        .bind(prop_id)
        .bind(over_becomes)
        .bind(under_becomes)
        .fetch_all(conn)
        .await
    }

    /// Move every open pick on a prop to one status (tie / did-not-play).
    pub async fn resolve_all_tx(
        conn: &mut PgConnection,
        prop_id: i64,
        status: PickStatus,
    ) -> Result<Vec<PickRef>, sqlx::Error> {
        sqlx::query_as::<_, PickRef>(
            r#"
            UPDATE picks
            SET status = $2
            WHERE prop_id = $1 AND status = 'not_resolved'
            RETURNING id, parlay_id
            "#,
        )
        .bind(prop_id)
        .bind(status)
        .fetch_all(conn)
        .await
    }

    /// Resolve only the open picks on a given side of a prop.
    pub async fn resolve_side_tx(
        conn: &mut PgConnection,
        prop_id: i64,
        side: PickChoice,
        status: PickStatus,
    ) -> Result<Vec<PickRef>, sqlx::Error> {
        sqlx::query_as::<_, PickRef>(
            r#"
            UPDATE picks
            SET status = $3
            WHERE prop_id = $1 AND choice = $2 AND status = 'not_resolved'
            RETURNING id, parlay_id
            "#,
        )
        .bind(prop_id)
        .bind(side)
        .bind(status)
        .fetch_all(conn)
        .await
    }

    /// List the picks referencing a prop, without touching them.
    pub async fn refs_for_prop_tx(
        conn: &mut PgConnection,
        prop_id: i64,
    ) -> Result<Vec<PickRef>, sqlx::Error> {
        sqlx::query_as::<_, PickRef>(
            r#"
            SELECT id, parlay_id
            FROM picks
            WHERE prop_id = $1
            "#,
        )
        .bind(prop_id)
        .fetch_all(conn)
        .await
    }

    /// The statuses of every pick in a parlay, for settlement counting.
    pub async fn statuses_for_parlay_tx(
        conn: &mut PgConnection,
        parlay_id: i64,
    ) -> Result<Vec<PickStatus>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (PickStatus,)>(
            r#"
            SELECT status
            FROM picks
            WHERE parlay_id = $1
            "#,
        )
        .bind(parlay_id)
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().map(|(status,)| status).collect())
    }
}
