//! Database migration command.
//!
//! Applies `crates/api/migrations/` in order. Already-applied migrations are
//! skipped, so running it twice is harmless.
//!
//! ```bash
//! tw-cli migrate
//! ```

use super::{CliError, connect};

/// Run pending migrations.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
