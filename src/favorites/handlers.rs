use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};

use super::repo::{self, FavoriteItem};
use crate::{
    auth::jwt::AuthUser,
    catalog,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    pub product_id: i64,
}

pub fn favorite_routes() -> Router<AppState> {
    Router::new()
        .route("/favorites", get(list_favorites).post(add_favorite))
        .route("/favorites/:product_id", delete(remove_favorite))
}

#[instrument(skip(state))]
pub async fn list_favorites(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<FavoriteItem>>> {
    let items = repo::list_by_user(&state.db, user_id).await?;
    Ok(Json(items))
}

#[instrument(skip(state, payload))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AddFavoriteRequest>,
) -> ApiResult<StatusCode> {
    // Favoriting an unknown product is a 404, not a dangling reference.
    catalog::repo::get_product(&state.db, payload.product_id)
        .await?
        .ok_or(ApiError::NotFound("Product"))?;

    repo::add(&state.db, user_id, payload.product_id).await?;
    info!(user_id = %user_id, product_id = %payload.product_id, "favorite added");
    Ok(StatusCode::CREATED)
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(product_id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !repo::remove(&state.db, user_id, product_id).await? {
        return Err(ApiError::NotFound("Favorite"));
    }
    info!(user_id = %user_id, product_id = %product_id, "favorite removed");
    Ok(StatusCode::NO_CONTENT)
}
