//! Machine-readable endpoint index.

use axum::extract::State;
use serde::Serialize;

use crate::response::ApiResponse;
use crate::state::AppState;

/// Who may call an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    /// Public, with extra visibility for a signed-in seller or admin.
    Optional,
    Authenticated,
    Staff,
    Admin,
    /// Authenticated by the payment provider's signature header.
    Signed,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Endpoint {
    pub method: &'static str,
    pub path: &'static str,
    pub access: Access,
    pub description: &'static str,
}

const fn endpoint(
    method: &'static str,
    path: &'static str,
    access: Access,
    description: &'static str,
) -> Endpoint {
    Endpoint {
        method,
        path,
        access,
        description,
    }
}

pub const ENDPOINTS: &[Endpoint] = &[
    endpoint("POST", "/auth/register", Access::Public, "Create an account"),
    endpoint("POST", "/auth/login", Access::Public, "Exchange credentials for tokens"),
    endpoint("POST", "/auth/refresh", Access::Public, "Exchange a refresh token for new tokens"),
    endpoint("GET", "/auth/profile", Access::Authenticated, "Current user"),
    endpoint("PUT", "/auth/profile", Access::Authenticated, "Update name or avatar"),
    endpoint("POST", "/auth/change-password", Access::Authenticated, "Change password"),
    endpoint("POST", "/auth/logout", Access::Authenticated, "End the session"),
    endpoint("GET", "/products", Access::Optional, "Search and page through products"),
    endpoint("GET", "/products/{id}", Access::Optional, "Product detail"),
    endpoint("POST", "/products", Access::Staff, "Create a product"),
    endpoint("PUT", "/products/{id}", Access::Staff, "Update a product"),
    endpoint("DELETE", "/products/{id}", Access::Staff, "Delete or deactivate a product"),
    endpoint("GET", "/categories", Access::Public, "Active categories with product counts"),
    endpoint("GET", "/categories/{id}", Access::Public, "Category detail"),
    endpoint("POST", "/categories", Access::Admin, "Create a category"),
    endpoint("PUT", "/categories/{id}", Access::Admin, "Update a category"),
    endpoint("DELETE", "/categories/{id}", Access::Admin, "Delete an unused category"),
    endpoint("GET", "/orders", Access::Authenticated, "Own orders, newest first"),
    endpoint("GET", "/orders/{id}", Access::Authenticated, "Order detail"),
    endpoint("POST", "/orders", Access::Authenticated, "Place an order"),
    endpoint("PUT", "/orders/{id}/status", Access::Staff, "Advance an order's status"),
    endpoint("POST", "/orders/{id}/cancel", Access::Authenticated, "Cancel a pending order"),
    endpoint("POST", "/payments/create-intent", Access::Authenticated, "Start paying for an order"),
    endpoint("POST", "/payments/confirm", Access::Authenticated, "Confirm a completed payment"),
    endpoint("POST", "/payments/webhook", Access::Signed, "Payment provider events"),
    endpoint("GET", "/docs", Access::Public, "This index"),
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIndex {
    pub name: &'static str,
    pub version: &'static str,
    pub base_path: String,
    pub endpoints: &'static [Endpoint],
}

/// `GET /docs`
pub async fn index(State(state): State<AppState>) -> ApiResponse<ApiIndex> {
    ApiResponse::ok(ApiIndex {
        name: "Tradewind API",
        version: env!("CARGO_PKG_VERSION"),
        base_path: state.config().api_prefix.clone(),
        endpoints: ENDPOINTS,
    })
}
