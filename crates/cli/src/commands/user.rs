//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # The only way to create an admin: the API refuses admin self-registration
//! tw-cli user create -e admin@example.com -p 'a long password' -r admin
//! ```

use tradewind_api::db::UserRepository;
use tradewind_api::db::users::NewUser;
use tradewind_api::services::auth::{hash_password, validate_password};
use tradewind_core::{Email, UserId, UserRole};

use super::{CliError, connect};

/// Create a user with a password. The email counts as verified.
///
/// # Errors
///
/// Returns `CliError` for a bad role, email or password, an existing
/// account, or a database failure.
pub async fn create(
    email: &str,
    password: &str,
    role: &str,
    first_name: &str,
    last_name: &str,
) -> Result<UserId, CliError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| CliError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|_| CliError::InvalidEmail(email.to_owned()))?;
    validate_password(password).map_err(|e| CliError::InvalidPassword(e.to_string()))?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    if users.get_by_email(&email).await?.is_some() {
        return Err(CliError::UserExists(email.to_string()));
    }

    tracing::info!("Creating user: {} ({})", email, role);

    let password_hash =
        hash_password(password).map_err(|e| CliError::InvalidPassword(e.to_string()))?;
    let user = users
        .create_with_password(
            &NewUser {
                email,
                first_name: first_name.to_owned(),
                last_name: last_name.to_owned(),
                role,
            },
            &password_hash,
        )
        .await?;
    users.verify_email(user.id).await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );

    Ok(user.id)
}
