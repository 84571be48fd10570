use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::provider::PaymentIntent;
use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, ApiResult},
    orders,
    state::AppState,
};

const CURRENCY: &str = "usd";

pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/orders/:id/payment-intent", post(create_payment_intent))
}

#[instrument(skip(state))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(order_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<PaymentIntent>)> {
    let (order, _items) = orders::repo::get(&state.db, user_id, order_id)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;

    if order.status != "pending" {
        warn!(order_id = %order.id, status = %order.status, "order not payable");
        return Err(ApiError::conflict("Order is not payable"));
    }

    let intent = state
        .payments
        .create_intent(order.id, order.total_cents, CURRENCY)
        .await?;

    info!(order_id = %order.id, intent_id = %intent.id, "payment intent created");
    Ok((StatusCode::CREATED, Json(intent)))
}
