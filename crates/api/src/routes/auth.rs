//! Authentication route handlers.
//!
//! Registration, login, token refresh and profile management. Tokens are
//! stateless, so logout only clears the error-tracking context.

use axum::extract::State;
use serde::Deserialize;

use tradewind_core::UserRole;

use crate::db::users::ProfileUpdate;
use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::response::{ApiResponse, FieldError, FieldErrors};
use crate::services::auth::{
    AuthService, AuthSession, MIN_PASSWORD_LENGTH, Registration, validate_password,
};
use crate::services::catalog::is_url;
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 50;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

fn check_name(errors: &mut FieldErrors, field: &str, label: &str, value: &str) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, format!("{label} is required"));
    } else if trimmed.chars().count() > MAX_NAME_LENGTH {
        errors.add(
            field,
            format!("{label} must be at most {MAX_NAME_LENGTH} characters"),
        );
    }
}

fn password_error(field: &str, password: &str) -> Option<FieldError> {
    validate_password(password).err().map(|_| {
        FieldError::new(
            field,
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
        )
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<ApiResponse<AuthSession>> {
    let mut errors = FieldErrors::new();
    check_name(&mut errors, "firstName", "First name", &body.first_name);
    check_name(&mut errors, "lastName", "Last name", &body.last_name);
    if let Some(error) = password_error("password", &body.password) {
        errors.push(error);
    }
    errors.finish().map_err(AppError::Validation)?;

    let session = AuthService::new(state.pool(), &state.config().jwt)
        .register(Registration {
            email: body.email,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
            role: body.role,
        })
        .await?;

    set_sentry_user(&session.user.id, Some(session.user.email.as_str()));
    add_breadcrumb("auth", "User registered", None);

    Ok(ApiResponse::created(session).with_message("User registered successfully"))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<ApiResponse<AuthSession>> {
    let session = AuthService::new(state.pool(), &state.config().jwt)
        .login(&body.email, &body.password)
        .await?;

    set_sentry_user(&session.user.id, Some(session.user.email.as_str()));
    add_breadcrumb("auth", "User logged in", None);

    Ok(ApiResponse::ok(session).with_message("Login successful"))
}

/// `POST /auth/refresh`
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<ApiResponse<AuthSession>> {
    let session = AuthService::new(state.pool(), &state.config().jwt)
        .refresh(&body.refresh_token)
        .await?;

    Ok(ApiResponse::ok(session).with_message("Token refreshed successfully"))
}

/// `GET /auth/profile`
pub async fn profile(RequireAuth(user): RequireAuth) -> ApiResponse<User> {
    ApiResponse::ok(user)
}

/// `PUT /auth/profile`
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<ApiResponse<User>> {
    let mut errors = FieldErrors::new();
    if let Some(first_name) = &body.first_name {
        check_name(&mut errors, "firstName", "First name", first_name);
    }
    if let Some(last_name) = &body.last_name {
        check_name(&mut errors, "lastName", "Last name", last_name);
    }
    if let Some(avatar) = &body.avatar {
        errors.check(is_url(avatar), "avatar", "Avatar must be a valid URL");
    }
    errors.finish().map_err(AppError::Validation)?;

    let update = ProfileUpdate {
        first_name: body.first_name.map(|s| s.trim().to_owned()),
        last_name: body.last_name.map(|s| s.trim().to_owned()),
        avatar: body.avatar,
    };
    let updated = AuthService::new(state.pool(), &state.config().jwt)
        .update_profile(user.id, &update)
        .await?;

    Ok(ApiResponse::ok(updated).with_message("Profile updated successfully"))
}

/// `POST /auth/change-password`
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<()>> {
    if let Some(error) = password_error("newPassword", &body.new_password) {
        return Err(AppError::Validation(vec![error]));
    }

    AuthService::new(state.pool(), &state.config().jwt)
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;

    Ok(ApiResponse::message("Password changed successfully"))
}

/// `POST /auth/logout`
pub async fn logout(RequireAuth(user): RequireAuth) -> ApiResponse<()> {
    tracing::info!(user_id = %user.id, "User logged out");
    clear_sentry_user();
    ApiResponse::message("Logout successful")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_name_checks() {
        let mut errors = FieldErrors::new();
        check_name(&mut errors, "firstName", "First name", "  ");
        check_name(&mut errors, "lastName", "Last name", &"x".repeat(51));
        check_name(&mut errors, "lastName", "Last name", "Lovelace");

        let errors = errors.finish().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.first().unwrap().message, "First name is required");
    }

    #[test]
    fn test_password_error_names_field() {
        let error = password_error("newPassword", "short").unwrap();
        assert_eq!(error.field.as_deref(), Some("newPassword"));
        assert!(password_error("newPassword", "long enough").is_none());
    }
}
