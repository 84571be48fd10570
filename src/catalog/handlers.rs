use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::ProductQuery;
use super::repo::{self, Category, Product};
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
}

#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    let categories = repo::list_categories(&state.db).await?;
    Ok(Json(categories))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(q): Query<ProductQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let products =
        repo::list_products(&state.db, q.category_id, q.limit.clamp(1, 100), q.offset).await?;
    Ok(Json(products))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Product>> {
    let product = repo::get_product(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Product"))?;
    Ok(Json(product))
}
