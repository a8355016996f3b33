//! Ledger of payment gateway events that have already been applied.

use sqlx::PgConnection;

use tradewind_core::OrderId;

use super::RepositoryError;

/// Claim an event id inside the caller's transaction.
///
/// Returns `false` if the event was already recorded, in which case the
/// caller must not apply it again. A concurrent delivery of the same event
/// blocks on the primary key until the first transaction finishes.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn claim(
    conn: &mut PgConnection,
    event_id: &str,
    event_type: &str,
    order_id: Option<OrderId>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        INSERT INTO shop.processed_webhook_event (event_id, event_type, order_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (event_id) DO NOTHING
        ",
    )
    .bind(event_id)
    .bind(event_type)
    .bind(order_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
