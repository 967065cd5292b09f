use sqlx::PgConnection;
use uuid::Uuid;

/// A platform user; `points` is the ELO-like competitive rating.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub points: f64,
}

impl User {
    pub async fn get_points_tx(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<f64>, sqlx::Error> {
        let row = sqlx::query_as::<_, (f64,)>("SELECT points FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row.map(|(points,)| points))
    }

    pub async fn set_points_tx(
        conn: &mut PgConnection,
        id: Uuid,
        points: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET points = $2 WHERE id = $1")
            .bind(id)
            .bind(points)
            .execute(conn)
            .await?;
        Ok(())
    }
}
