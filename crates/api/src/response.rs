//! JSON response envelope.
//!
//! Every response body, success or failure, has the shape
//!
//! ```json
//! { "success": true, "data": { ... }, "message": "...", "errors": [{ "field": "email", "message": "..." }] }
//! ```
//!
//! with absent members omitted. List endpoints add a `pagination` member.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl FieldError {
    /// An error attached to a named request field.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// An error about the request as a whole.
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

/// Collects field errors while checking a request.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors.push(FieldError::new(field, message));
        self
    }

    pub fn push(&mut self, error: FieldError) -> &mut Self {
        self.errors.push(error);
        self
    }

    /// Record an error on `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.add(field, message);
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns every recorded error.
    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Page metadata for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    #[must_use]
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit_wide = i64::from(limit.max(1));
        let total_pages = if total <= 0 {
            0
        } else {
            (total + limit_wide - 1) / limit_wide
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// The response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// `200 OK` carrying `data`.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            pagination: None,
            status: StatusCode::OK,
        }
    }

    /// `201 Created` carrying `data`.
    pub fn created(data: T) -> Self {
        let mut response = Self::ok(data);
        response.status = StatusCode::CREATED;
        response
    }

    /// One page of a listing.
    pub fn paginated(data: T, pagination: Pagination) -> Self {
        let mut response = Self::ok(data);
        response.pagination = Some(pagination);
        response
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// Success with a message and no data.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            errors: None,
            pagination: None,
            status: StatusCode::OK,
        }
    }

    /// Failure envelope.
    pub fn failure(
        status: StatusCode,
        message: impl Into<String>,
        errors: Option<Vec<FieldError>>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            errors,
            pagination: None,
            status,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_total_pages() {
        assert_eq!(Pagination::new(1, 20, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 20, 1).total_pages, 1);
        assert_eq!(Pagination::new(1, 20, 20).total_pages, 1);
        assert_eq!(Pagination::new(2, 20, 41).total_pages, 3);
    }

    #[test]
    fn test_envelope_omits_absent_members() {
        let body = serde_json::to_value(ApiResponse::ok(42)).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "data": 42 }));

        let body = serde_json::to_value(ApiResponse::message("Logged out")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "success": true, "message": "Logged out" })
        );
    }

    #[test]
    fn test_failure_envelope() {
        let response = ApiResponse::failure(
            StatusCode::BAD_REQUEST,
            "Validation failed",
            Some(vec![
                FieldError::new("email", "Invalid email"),
                FieldError::general("Malformed body"),
            ]),
        );
        assert_eq!(response.status, StatusCode::BAD_REQUEST);

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "message": "Validation failed",
                "errors": [
                    { "field": "email", "message": "Invalid email" },
                    { "message": "Malformed body" }
                ]
            })
        );
    }

    #[test]
    fn test_paginated_envelope() {
        let body =
            serde_json::to_value(ApiResponse::paginated(vec![1, 2], Pagination::new(1, 2, 5)))
                .unwrap();
        assert_eq!(
            body["pagination"],
            serde_json::json!({ "page": 1, "limit": 2, "total": 5, "totalPages": 3 })
        );
    }

    #[test]
    fn test_field_errors_builder() {
        let mut errors = FieldErrors::new();
        errors
            .check(true, "name", "Name is required")
            .check(false, "price", "Price must be positive")
            .add("images", "Invalid URL");

        let collected = errors.finish().unwrap_err();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected.first().unwrap().field.as_deref(), Some("price"));

        assert!(FieldErrors::new().finish().is_ok());
    }

    #[test]
    fn test_created_status() {
        let response = ApiResponse::created("x").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
