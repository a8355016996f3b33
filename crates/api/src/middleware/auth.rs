//! Authentication extractors.
//!
//! Resolve the `Authorization: Bearer <access token>` header to a [`User`].

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::auth::{AuthError, AuthService, TokenError};
use crate::state::AppState;

/// Pull the bearer token out of the `Authorization` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn authenticate(state: &AppState, token: &str) -> Result<User, AuthError> {
    let user = AuthService::new(state.pool(), &state.config().jwt)
        .authenticate(token)
        .await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(user)
}

/// Extractor that requires a valid access token.
///
/// Rejects with `401` when the header is missing, or the token is invalid,
/// expired, or names a user that no longer exists.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireAuth(user): RequireAuth) -> Json<User> {
///     Json(user)
/// }
/// ```
pub struct RequireAuth(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Access token required".to_owned()))?;

        let user = authenticate(state, token).await.map_err(|err| match err {
            AuthError::Token(TokenError::Expired) => {
                AppError::Unauthorized("Token expired".to_owned())
            }
            AuthError::Token(_) => AppError::Unauthorized("Invalid token".to_owned()),
            other => AppError::Auth(other),
        })?;

        Ok(Self(user))
    }
}

/// Extractor that resolves a user when a valid token is present.
///
/// Unlike `RequireAuth`, any authentication failure degrades to `None`.
pub struct OptionalAuth(pub Option<User>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Self(None));
        };

        match authenticate(state, token).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(err) => {
                tracing::debug!(error = %err, "Ignoring invalid optional credentials");
                Ok(Self(None))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/profile");
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }
}
