use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub created_at: OffsetDateTime,
}

pub async fn list_categories(db: &PgPool) -> anyhow::Result<Vec<Category>> {
    let rows = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn list_products(
    db: &PgPool,
    category_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, category_id, name, description, price_cents, created_at
        FROM products
        WHERE ($1::bigint IS NULL OR category_id = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(category_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get_product(db: &PgPool, id: i64) -> anyhow::Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, category_id, name, description, price_cents, created_at
        FROM products
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(product)
}
