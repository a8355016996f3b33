//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client with the JSON envelope. All route
//! handlers return `Result<T, AppError>`.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::response::{ApiResponse, FieldError};
use crate::services::auth::{AuthError, TokenError};
use crate::services::catalog::CatalogError;
use crate::services::orders::OrderError;
use crate::services::payments::PaymentError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Catalog operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Order workflow failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Payment workflow failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request failed field validation.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const INTERNAL: &str = "Internal server error";
const VALIDATION: &str = "Validation failed";
const FORBIDDEN: &str = "Insufficient permissions";

/// Status, client-facing message and field errors for an error.
type Parts = (StatusCode, String, Option<Vec<FieldError>>);

fn plain(status: StatusCode, message: impl Into<String>) -> Parts {
    (status, message.into(), None)
}

fn invalid(errors: Vec<FieldError>) -> Parts {
    (StatusCode::BAD_REQUEST, VALIDATION.to_owned(), Some(errors))
}

fn internal() -> Parts {
    plain(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL)
}

/// Capitalize the first letter of a lowercase service message.
fn sentence(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn auth_parts(err: &AuthError) -> Parts {
    match err {
        AuthError::InvalidEmail(_) => invalid(vec![FieldError::new(
            "email",
            "Please provide a valid email",
        )]),
        AuthError::InvalidCredentials => {
            plain(StatusCode::UNAUTHORIZED, "Invalid email or password")
        }
        AuthError::IncorrectPassword => invalid(vec![FieldError::new(
            "currentPassword",
            "Current password is incorrect",
        )]),
        AuthError::UserNotFound => plain(StatusCode::NOT_FOUND, "User not found"),
        AuthError::UserAlreadyExists => plain(StatusCode::CONFLICT, "Email already exists"),
        AuthError::WeakPassword(message) => {
            invalid(vec![FieldError::new("password", sentence(message))])
        }
        AuthError::RoleNotAllowed(_) => plain(StatusCode::FORBIDDEN, FORBIDDEN),
        AuthError::Token(TokenError::Expired) => plain(StatusCode::UNAUTHORIZED, "Token expired"),
        AuthError::Token(TokenError::Invalid) => plain(StatusCode::UNAUTHORIZED, "Invalid token"),
        AuthError::Token(TokenError::Encoding(_))
        | AuthError::Repository(_)
        | AuthError::PasswordHash => internal(),
    }
}

fn catalog_parts(err: &CatalogError) -> Parts {
    match err {
        CatalogError::ProductNotFound => plain(StatusCode::NOT_FOUND, "Product not found"),
        CatalogError::CategoryNotFound => plain(StatusCode::NOT_FOUND, "Category not found"),
        CatalogError::Forbidden(message) => plain(StatusCode::FORBIDDEN, sentence(message)),
        CatalogError::Conflict(message) => plain(StatusCode::CONFLICT, sentence(message)),
        CatalogError::Validation(errors) => invalid(errors.clone()),
        CatalogError::Repository(_) => internal(),
    }
}

fn order_parts(err: &OrderError) -> Parts {
    match err {
        OrderError::ProductNotFound(id) => {
            plain(StatusCode::NOT_FOUND, format!("Product {id} not found"))
        }
        OrderError::InsufficientInventory {
            product,
            requested,
            available,
        } => plain(
            StatusCode::BAD_REQUEST,
            format!(
                "Insufficient inventory for {product}. Available: {available}, requested: {requested}"
            ),
        ),
        OrderError::OrderNotFound => plain(StatusCode::NOT_FOUND, "Order not found"),
        OrderError::Forbidden(message) => plain(StatusCode::FORBIDDEN, sentence(message)),
        OrderError::InvalidStatusTransition { from, to } => plain(
            StatusCode::CONFLICT,
            format!("Cannot change order status from {from} to {to}"),
        ),
        OrderError::CannotBeCancelled(_) => {
            plain(StatusCode::CONFLICT, "Order cannot be cancelled")
        }
        OrderError::Validation(errors) => invalid(errors.clone()),
        OrderError::OrderNumberExhausted | OrderError::Repository(_) => internal(),
    }
}

fn payment_parts(err: &PaymentError) -> Parts {
    match err {
        PaymentError::OrderNotFound => plain(StatusCode::NOT_FOUND, "Order not found"),
        PaymentError::AlreadyPaid => plain(StatusCode::CONFLICT, "Order already paid"),
        PaymentError::OrderClosed(status) => plain(
            StatusCode::CONFLICT,
            format!("Order is {status} and cannot be paid"),
        ),
        PaymentError::IntentMismatch => invalid(vec![FieldError::new(
            "paymentIntentId",
            "Payment intent does not belong to this order",
        )]),
        PaymentError::PaymentFailed { .. } => {
            plain(StatusCode::PAYMENT_REQUIRED, "Payment processing failed")
        }
        PaymentError::InvalidSignature(_) => {
            plain(StatusCode::BAD_REQUEST, "Invalid webhook signature")
        }
        PaymentError::MalformedEvent(_) => plain(StatusCode::BAD_REQUEST, "Malformed webhook event"),
        PaymentError::Gateway(_) | PaymentError::MissingClientSecret => {
            plain(StatusCode::BAD_GATEWAY, "Payment provider error")
        }
        PaymentError::Amount(_) | PaymentError::Repository(_) => internal(),
    }
}

impl AppError {
    /// HTTP status, client message and field errors for this error.
    ///
    /// Server-side failures get a generic message; the detail stays in logs.
    fn parts(&self) -> Parts {
        match self {
            Self::Database(_) | Self::Internal(_) => internal(),
            Self::Auth(err) => auth_parts(err),
            Self::Catalog(err) => catalog_parts(err),
            Self::Order(err) => order_parts(err),
            Self::Payment(err) => payment_parts(err),
            Self::NotFound(message) => plain(StatusCode::NOT_FOUND, message.clone()),
            Self::Unauthorized(message) => plain(StatusCode::UNAUTHORIZED, message.clone()),
            Self::Forbidden(message) => plain(StatusCode::FORBIDDEN, message.clone()),
            Self::Validation(errors) => invalid(errors.clone()),
            Self::BadRequest(message) => plain(StatusCode::BAD_REQUEST, message.clone()),
            Self::RateLimited => plain(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later",
            ),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = self.parts();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        ApiResponse::failure(status, message, errors).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(vec![FieldError::general(rejection.body_text())])
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        Self::Validation(vec![FieldError::new("id", "Invalid ID format")])
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(vec![FieldError::general(rejection.body_text())])
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("order", "Order created", Some(&[("order_id", "…")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use tradewind_core::{OrderStatus, ProductId};

    use super::*;
    use crate::stripe::IntentStatus;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            let response = err.into_response();
            response.status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            AppError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(AuthError::UserAlreadyExists).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(OrderError::InvalidStatusTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending,
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(OrderError::InsufficientInventory {
                product: "Mug".to_owned(),
                requested: 3,
                available: 1,
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(PaymentError::PaymentFailed {
                status: IntentStatus::RequiresPaymentMethod,
            })
            .status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            AppError::from(PaymentError::AlreadyPaid).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(CatalogError::Forbidden("only admins can manage categories")).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_internal_details_not_leaked() {
        let (status, body) = body_json(AppError::Internal(
            "connection refused to 10.0.0.5:5432".to_owned(),
        ))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            serde_json::json!({ "success": false, "message": "Internal server error" })
        );
    }

    #[tokio::test]
    async fn test_validation_envelope() {
        let (status, body) = body_json(AppError::Validation(vec![FieldError::new(
            "name",
            "Name is required",
        )]))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"][0]["field"], "name");
    }

    #[tokio::test]
    async fn test_insufficient_inventory_names_product() {
        let (_, body) = body_json(AppError::from(OrderError::InsufficientInventory {
            product: "Yoga Mat Premium".to_owned(),
            requested: 5,
            available: 2,
        }))
        .await;

        let message = body["message"].as_str().unwrap();
        assert!(message.contains("Yoga Mat Premium"));
        assert!(message.contains("Available: 2"));
    }

    #[tokio::test]
    async fn test_product_not_found_names_id() {
        let id = ProductId::generate();
        let (status, body) = body_json(AppError::from(OrderError::ProductNotFound(id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], format!("Product {id} not found"));
    }

    #[test]
    fn test_sentence_capitalizes() {
        assert_eq!(sentence("cannot delete category"), "Cannot delete category");
        assert_eq!(sentence(""), "");
    }
}
