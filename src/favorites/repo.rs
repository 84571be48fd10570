use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// A favorited product as listed for its owner, joined with catalog data.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FavoriteItem {
    pub product_id: i64,
    pub name: String,
    pub price_cents: i64,
    pub favorited_at: OffsetDateTime,
}

pub async fn list_by_user(db: &PgPool, user_id: i64) -> anyhow::Result<Vec<FavoriteItem>> {
    let rows = sqlx::query_as::<_, FavoriteItem>(
        r#"
        SELECT f.product_id, p.name, p.price_cents, f.created_at AS favorited_at
        FROM favorites f
        JOIN products p ON p.id = f.product_id
        WHERE f.user_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Idempotent: favoriting an already-favorited product is a no-op.
pub async fn add(db: &PgPool, user_id: i64, product_id: i64) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO favorites (user_id, product_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, product_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .execute(db)
    .await?;
    Ok(())
}

/// Returns true when a row was actually removed.
pub async fn remove(db: &PgPool, user_id: i64, product_id: i64) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
