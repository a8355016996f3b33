//! Category route handlers.

use axum::extract::State;

use tradewind_core::CategoryId;

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::RequireAuth;
use crate::models::{Category, CategoryDetail};
use crate::response::ApiResponse;
use crate::services::catalog::{CatalogService, CategoryDraft, CategoryPatch};
use crate::state::AppState;

/// `GET /categories`
pub async fn index(State(state): State<AppState>) -> Result<ApiResponse<Vec<CategoryDetail>>> {
    let categories = CatalogService::new(state.pool()).list_categories().await?;
    Ok(ApiResponse::ok(categories))
}

/// `GET /categories/{id}`
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<ApiResponse<CategoryDetail>> {
    let category = CatalogService::new(state.pool()).get_category(id).await?;
    Ok(ApiResponse::ok(category))
}

/// `POST /categories`
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Json(draft): Json<CategoryDraft>,
) -> Result<ApiResponse<Category>> {
    let category = CatalogService::new(state.pool())
        .create_category(draft, &caller)
        .await?;

    Ok(ApiResponse::created(category).with_message("Category created successfully"))
}

/// `PUT /categories/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    RequireAuth(caller): RequireAuth,
    Json(patch): Json<CategoryPatch>,
) -> Result<ApiResponse<Category>> {
    let category = CatalogService::new(state.pool())
        .update_category(id, patch, &caller)
        .await?;

    Ok(ApiResponse::ok(category).with_message("Category updated successfully"))
}

/// `DELETE /categories/{id}`
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    RequireAuth(caller): RequireAuth,
) -> Result<ApiResponse<()>> {
    CatalogService::new(state.pool())
        .delete_category(id, &caller)
        .await?;

    Ok(ApiResponse::message("Category deleted successfully"))
}
