//! Signed bearer tokens.
//!
//! Access and refresh tokens are HS256 JWTs signed with different secrets
//! and tagged with a `typ` claim, so neither can stand in for the other.

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradewind_core::UserId;

use crate::config::JwtConfig;

/// Which of the two token kinds a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Errors from issuing or checking tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("token encoding failed: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Issues and verifies tokens for one JWT configuration.
#[derive(Clone, Copy)]
pub struct TokenIssuer<'a> {
    config: &'a JwtConfig,
}

impl<'a> TokenIssuer<'a> {
    #[must_use]
    pub const fn new(config: &'a JwtConfig) -> Self {
        Self { config }
    }

    /// Issue a new access/refresh pair for a user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue_pair(&self, user_id: UserId) -> Result<TokenPair, TokenError> {
        let now = Utc::now().timestamp();
        Ok(TokenPair {
            access_token: self.issue_at(user_id, TokenKind::Access, now)?,
            refresh_token: self.issue_at(user_id, TokenKind::Refresh, now)?,
            expires_in: self.config.access_ttl.as_secs(),
        })
    }

    /// Check an access token and return its subject.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    pub fn verify_access(&self, token: &str) -> Result<UserId, TokenError> {
        self.verify(token, TokenKind::Access)
    }

    /// Check a refresh token and return its subject.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    pub fn verify_refresh(&self, token: &str) -> Result<UserId, TokenError> {
        self.verify(token, TokenKind::Refresh)
    }

    const fn secret(&self, kind: TokenKind) -> &SecretString {
        match kind {
            TokenKind::Access => &self.config.access_secret,
            TokenKind::Refresh => &self.config.refresh_secret,
        }
    }

    fn issue_at(&self, user_id: UserId, kind: TokenKind, now: i64) -> Result<String, TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.config.access_ttl,
            TokenKind::Refresh => self.config.refresh_ttl,
        };
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user_id,
            typ: kind,
            iat: now,
            exp: now.saturating_add(ttl_secs),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret(kind).expose_secret().as_bytes()),
        )
        .map_err(TokenError::Encoding)
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<UserId, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind).expose_secret().as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

        if data.claims.typ != kind {
            return Err(TokenError::Invalid);
        }

        Ok(data.claims.sub)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn test_access_token_roundtrip() {
        let config = test_config();
        let issuer = TokenIssuer::new(&config.jwt);
        let user_id = UserId::generate();

        let pair = issuer.issue_pair(user_id).unwrap();
        assert_eq!(issuer.verify_access(&pair.access_token).unwrap(), user_id);
        assert_eq!(issuer.verify_refresh(&pair.refresh_token).unwrap(), user_id);
        assert_eq!(pair.expires_in, 900);
    }

    #[test]
    fn test_tokens_are_not_interchangeable() {
        let config = test_config();
        let issuer = TokenIssuer::new(&config.jwt);
        let pair = issuer.issue_pair(UserId::generate()).unwrap();

        assert!(matches!(
            issuer.verify_refresh(&pair.access_token),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            issuer.verify_access(&pair.refresh_token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = test_config();
        let issuer = TokenIssuer::new(&config.jwt);
        let an_hour_ago = Utc::now().timestamp() - 3600;

        let token = issuer
            .issue_at(UserId::generate(), TokenKind::Access, an_hour_ago)
            .unwrap();
        assert!(matches!(
            issuer.verify_access(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let config = test_config();
        let issuer = TokenIssuer::new(&config.jwt);
        let pair = issuer.issue_pair(UserId::generate()).unwrap();

        let mut tampered = pair.access_token;
        tampered.push('x');
        assert!(matches!(
            issuer.verify_access(&tampered),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            issuer.verify_access("not-a-jwt"),
            Err(TokenError::Invalid)
        ));
    }
}
