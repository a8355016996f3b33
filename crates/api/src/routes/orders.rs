//! Order route handlers.

use axum::extract::State;

use tradewind_core::OrderId;

use crate::error::{Result, add_breadcrumb};
use crate::extract::{Json, Path};
use crate::middleware::RequireAuth;
use crate::models::OrderView;
use crate::response::ApiResponse;
use crate::services::orders::{CreateOrder, OrderService, UpdateOrderStatus};
use crate::state::AppState;

/// `GET /orders` - the caller's own orders.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
) -> Result<ApiResponse<Vec<OrderView>>> {
    let orders = OrderService::new(state.pool())
        .list_user_orders(caller.id)
        .await?;

    Ok(ApiResponse::ok(orders.into_iter().map(OrderView::from).collect()))
}

/// `GET /orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    RequireAuth(caller): RequireAuth,
) -> Result<ApiResponse<OrderView>> {
    let order = OrderService::new(state.pool()).get_order(id, &caller).await?;
    Ok(ApiResponse::ok(order.into()))
}

/// `POST /orders`
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Json(body): Json<CreateOrder>,
) -> Result<ApiResponse<OrderView>> {
    let order = OrderService::new(state.pool())
        .create_order(caller.id, &body)
        .await?;

    add_breadcrumb(
        "order",
        "Order created",
        Some(&[("order_number", order.order_number.as_str())]),
    );

    Ok(ApiResponse::created(order.into()).with_message("Order created successfully"))
}

/// `PUT /orders/{id}/status` - sellers and admins.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    RequireAuth(caller): RequireAuth,
    Json(body): Json<UpdateOrderStatus>,
) -> Result<ApiResponse<OrderView>> {
    let order = OrderService::new(state.pool())
        .update_status(id, &body, &caller)
        .await?;

    Ok(ApiResponse::ok(order.into()).with_message("Order status updated successfully"))
}

/// `POST /orders/{id}/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    RequireAuth(caller): RequireAuth,
) -> Result<ApiResponse<OrderView>> {
    let order = OrderService::new(state.pool())
        .cancel_order(id, &caller)
        .await?;

    Ok(ApiResponse::ok(order.into()).with_message("Order cancelled successfully"))
}
