use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo::OrderItem;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub status: String,
    pub total_cents: i64,
    pub created_at: OffsetDateTime,
    pub items: Vec<OrderItem>,
}
