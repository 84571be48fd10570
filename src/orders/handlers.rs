use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{CreateOrderRequest, OrderResponse};
use super::repo::{self, NewOrderItem, Order};
use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
}

#[instrument(skip(state, payload))]
pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    if payload.items.is_empty() {
        return Err(ApiError::validation("items must not be empty"));
    }
    if payload.items.iter().any(|i| i.quantity < 1) {
        return Err(ApiError::validation("quantity must be at least 1"));
    }

    let items = merge_items(&payload.items);

    let Some((order, items)) = repo::create(&state.db, user_id, &items).await? else {
        warn!(user_id = %user_id, "order referenced unknown product");
        return Err(ApiError::NotFound("Product"));
    };

    info!(user_id = %user_id, order_id = %order.id, total_cents = %order.total_cents, "order created");
    Ok((
        StatusCode::CREATED,
        Json(OrderResponse {
            id: order.id,
            status: order.status,
            total_cents: order.total_cents,
            created_at: order.created_at,
            items,
        }),
    ))
}

/// Collapse repeated product lines into one, summing quantities. Each product
/// maps to a single order_items row, which the table's composite key requires.
fn merge_items(items: &[super::dto::OrderItemRequest]) -> Vec<NewOrderItem> {
    let mut merged: Vec<NewOrderItem> = Vec::with_capacity(items.len());
    for item in items {
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => existing.quantity += item.quantity,
            None => merged.push(NewOrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
            }),
        }
    }
    merged
}

#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = repo::list_by_user(&state.db, user_id).await?;
    Ok(Json(orders))
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<OrderResponse>> {
    let (order, items) = repo::get(&state.db, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;

    Ok(Json(OrderResponse {
        id: order.id,
        status: order.status,
        total_cents: order.total_cents,
        created_at: order.created_at,
        items,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::dto::OrderItemRequest;
    use super::*;

    #[test]
    fn merge_items_sums_repeated_products() {
        let items = [
            OrderItemRequest { product_id: 1, quantity: 2 },
            OrderItemRequest { product_id: 2, quantity: 1 },
            OrderItemRequest { product_id: 1, quantity: 3 },
        ];
        let merged = merge_items(&items);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].product_id, 1);
        assert_eq!(merged[0].quantity, 5);
        assert_eq!(merged[1].product_id, 2);
        assert_eq!(merged[1].quantity, 1);
    }

    #[test]
    fn merge_items_keeps_distinct_products_as_is() {
        let items = [
            OrderItemRequest { product_id: 4, quantity: 1 },
            OrderItemRequest { product_id: 9, quantity: 2 },
        ];
        let merged = merge_items(&items);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].quantity, 1);
        assert_eq!(merged[1].quantity, 2);
    }
}
