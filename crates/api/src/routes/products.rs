//! Product route handlers.

use axum::extract::State;

use tradewind_core::ProductId;

use crate::db::products::DeleteOutcome;
use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::ProductView;
use crate::response::ApiResponse;
use crate::services::catalog::{CatalogService, ProductDraft, ProductPatch, ProductQuery};
use crate::state::AppState;

/// `GET /products`
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(caller): OptionalAuth,
    Query(query): Query<ProductQuery>,
) -> Result<ApiResponse<Vec<ProductView>>> {
    let (products, pagination) = CatalogService::new(state.pool())
        .list_products(&query, caller.as_ref())
        .await?;

    let views = products.into_iter().map(ProductView::from).collect();
    Ok(ApiResponse::paginated(views, pagination))
}

/// `GET /products/{id}`
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    OptionalAuth(caller): OptionalAuth,
) -> Result<ApiResponse<ProductView>> {
    let product = CatalogService::new(state.pool())
        .get_product(id, caller.as_ref())
        .await?;

    Ok(ApiResponse::ok(product.into()))
}

/// `POST /products`
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Json(draft): Json<ProductDraft>,
) -> Result<ApiResponse<ProductView>> {
    let product = CatalogService::new(state.pool())
        .create_product(draft, &caller)
        .await?;

    Ok(ApiResponse::created(product.into()).with_message("Product created successfully"))
}

/// `PUT /products/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    RequireAuth(caller): RequireAuth,
    Json(patch): Json<ProductPatch>,
) -> Result<ApiResponse<ProductView>> {
    let product = CatalogService::new(state.pool())
        .update_product(id, patch, &caller)
        .await?;

    Ok(ApiResponse::ok(product.into()).with_message("Product updated successfully"))
}

/// `DELETE /products/{id}`
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    RequireAuth(caller): RequireAuth,
) -> Result<ApiResponse<()>> {
    let outcome = CatalogService::new(state.pool())
        .delete_product(id, &caller)
        .await?;

    Ok(ApiResponse::message(match outcome {
        DeleteOutcome::Deleted => "Product deleted successfully",
        DeleteOutcome::Deactivated => "Product has been ordered before and was deactivated instead",
    }))
}
