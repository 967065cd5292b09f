use sqlx::PgConnection;
use uuid::Uuid;

/// A user's progress row on one battle pass.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BattlePassProgress {
    pub id: i64,
    pub battle_pass_id: i64,
    pub current_xp: i32,
}

impl BattlePassProgress {
    /// The user's progress rows for every battle pass active right now.
    pub async fn active_for_user_tx(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Vec<BattlePassProgress>, sqlx::Error> {
        sqlx::query_as::<_, BattlePassProgress>(
            r#"
            SELECT ubp.id, ubp.battle_pass_id, ubp.current_xp
            FROM user_battle_pass_progress ubp
            JOIN battle_passes bp ON ubp.battle_pass_id = bp.id
            WHERE bp.is_active = true
              AND bp.start_date <= NOW()
              AND bp.end_date >= NOW()
              AND ubp.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await
    }

    pub async fn add_xp_tx(
        conn: &mut PgConnection,
        id: i64,
        xp: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE user_battle_pass_progress
            SET current_xp = current_xp + $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(xp)
        .execute(conn)
        .await?;
        Ok(())
    }
}
