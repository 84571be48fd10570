use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub total_cents: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i32,
}

/// Create an order with server-side pricing, all inside one transaction.
/// Returns None when any referenced product does not exist.
pub async fn create(
    db: &PgPool,
    user_id: i64,
    items: &[NewOrderItem],
) -> anyhow::Result<Option<(Order, Vec<OrderItem>)>> {
    let mut tx = db.begin().await?;

    let mut priced: Vec<OrderItem> = Vec::with_capacity(items.len());
    let mut total_cents: i64 = 0;
    for item in items {
        let price: Option<(i64,)> = sqlx::query_as("SELECT price_cents FROM products WHERE id = $1")
            .bind(item.product_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((unit_price_cents,)) = price else {
            tx.rollback().await?;
            return Ok(None);
        };
        total_cents += unit_price_cents * item.quantity as i64;
        priced.push(OrderItem {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price_cents,
        });
    }

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (user_id, total_cents)
        VALUES ($1, $2)
        RETURNING id, user_id, status, total_cents, created_at
        "#,
    )
    .bind(user_id)
    .bind(total_cents)
    .fetch_one(&mut *tx)
    .await?;

    for item in &priced {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, unit_price_cents)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(Some((order, priced)))
}

pub async fn list_by_user(db: &PgPool, user_id: i64) -> anyhow::Result<Vec<Order>> {
    let rows = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, status, total_cents, created_at
        FROM orders
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Fetch an order owned by `user_id`, with its items. Another user's order
/// is indistinguishable from a missing one.
pub async fn get(
    db: &PgPool,
    user_id: i64,
    order_id: i64,
) -> anyhow::Result<Option<(Order, Vec<OrderItem>)>> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, status, total_cents, created_at
        FROM orders
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    let Some(order) = order else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT product_id, quantity, unit_price_cents
        FROM order_items
        WHERE order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_all(db)
    .await?;

    Ok(Some((order, items)))
}
