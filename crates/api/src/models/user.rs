//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tradewind_core::{Email, UserId, UserRole};

/// A registered account.
///
/// The password hash is stored separately and never leaves the repository.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Normalized (lowercase) email address.
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    /// Account role.
    pub role: UserRole,
    /// Whether the email has been verified.
    pub email_verified: bool,
    /// Avatar image URL.
    pub avatar: Option<String>,
    /// Last successful password login.
    pub last_login_at: Option<DateTime<Utc>>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
