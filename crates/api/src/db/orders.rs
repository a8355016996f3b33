//! Order repository.
//!
//! Reads go through [`OrderRepository`]. Steps that must share a transaction
//! with inventory changes take a `&mut PgConnection` so the caller owns the
//! transaction boundary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use tradewind_core::{
    Address, OrderId, OrderItemId, OrderStatus, OrderTotals, PaymentStatus, ProductId,
    ProductStatus, UserId,
};

use super::RepositoryError;
use crate::models::{Order, OrderItem};

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, payment_status, subtotal, tax, \
     shipping, total, shipping_address, billing_address, notes, payment_intent_id, \
     tracking_number, shipped_at, delivered_at, cancelled_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, product_image, product_sku, \
     price, quantity, total, created_at";

/// Product fields read under a row lock during checkout.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub sku: Option<String>,
    pub images: Vec<String>,
    pub inventory: i32,
    pub status: ProductStatus,
}

/// Order header to insert.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub user_id: UserId,
    pub totals: OrderTotals,
    pub shipping_address: &'a Address,
    pub billing_address: &'a Address,
    pub notes: Option<&'a str>,
}

/// Line-item snapshot to insert.
#[derive(Debug, Clone)]
pub struct NewOrderItem<'a> {
    pub product_id: ProductId,
    pub product_name: &'a str,
    pub product_image: Option<&'a str>,
    pub product_sku: Option<&'a str>,
    pub price: Decimal,
    pub quantity: i32,
    pub total: Decimal,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    status: OrderStatus,
    payment_status: PaymentStatus,
    subtotal: Decimal,
    tax: Decimal,
    shipping: Decimal,
    total: Decimal,
    shipping_address: Json<Address>,
    billing_address: Json<Address>,
    notes: Option<String>,
    payment_intent_id: Option<String>,
    tracking_number: Option<String>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            status: self.status,
            payment_status: self.payment_status,
            subtotal: self.subtotal,
            tax: self.tax,
            shipping: self.shipping,
            total: self.total,
            shipping_address: self.shipping_address.0,
            billing_address: self.billing_address.0,
            notes: self.notes,
            payment_intent_id: self.payment_intent_id,
            tracking_number: self.tracking_number,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        }
    }
}

/// Repository for order reads that don't need a caller-owned transaction.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id, false).await
    }

    /// All orders placed by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        let ids: Vec<OrderId> = rows.iter().map(|row| row.id).collect();
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM shop.order_item WHERE order_id = ANY($1) ORDER BY created_at, id"
        );
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(&ids)
            .fetch_all(self.pool)
            .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }

    /// Find the order a payment intent was created for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_id_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, OrderId>(
            "SELECT id FROM shop.order WHERE payment_intent_id = $1",
        )
        .bind(payment_intent_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    /// Record the payment intent created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn set_payment_intent(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.order SET payment_intent_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(payment_intent_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Transaction steps
// =============================================================================

/// Load an order with items. With `lock`, the order row is held `FOR UPDATE`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn fetch_order(
    conn: &mut PgConnection,
    id: OrderId,
    lock: bool,
) -> Result<Option<Order>, RepositoryError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM shop.order WHERE id = $1{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let items = fetch_items(conn, id).await?;
    Ok(Some(row.into_order(items)))
}

async fn fetch_items(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM shop.order_item WHERE order_id = $1 ORDER BY created_at, id"
    );
    let items = sqlx::query_as::<_, OrderItem>(&sql)
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Lock the given products for the rest of the transaction.
///
/// Rows are locked in ascending id order so concurrent checkouts that touch
/// overlapping products always acquire locks in the same order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_products(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<LockedProduct>, RepositoryError> {
    let products = sqlx::query_as::<_, LockedProduct>(
        r"
        SELECT id, name, price, sku, images, inventory, status
        FROM shop.product
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;

    Ok(products)
}

/// Take `quantity` units out of stock and count them as sold.
///
/// Returns `false` without changing anything if fewer than `quantity` units remain.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn decrement_inventory(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.product
        SET inventory = inventory - $2,
            sales_count = sales_count + $2,
            updated_at = now()
        WHERE id = $1 AND inventory >= $2
        ",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Put the units of every line of an order back into stock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn restock_items(conn: &mut PgConnection, order_id: OrderId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE shop.product p
        SET inventory = p.inventory + i.quantity,
            sales_count = GREATEST(p.sales_count - i.quantity, 0),
            updated_at = now()
        FROM (
            SELECT product_id, SUM(quantity)::INT AS quantity
            FROM shop.order_item
            WHERE order_id = $1
            GROUP BY product_id
        ) i
        WHERE p.id = i.product_id
        ",
    )
    .bind(order_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Insert an order header.
///
/// Returns `None` if the order number is already taken.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_order(
    conn: &mut PgConnection,
    new: &NewOrder<'_>,
) -> Result<Option<OrderId>, RepositoryError> {
    let id = sqlx::query_scalar::<_, OrderId>(
        r"
        INSERT INTO shop.order
            (id, order_number, user_id, subtotal, tax, shipping, total,
             shipping_address, billing_address, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (order_number) DO NOTHING
        RETURNING id
        ",
    )
    .bind(OrderId::generate())
    .bind(new.order_number)
    .bind(new.user_id)
    .bind(new.totals.subtotal)
    .bind(new.totals.tax)
    .bind(new.totals.shipping)
    .bind(new.totals.total)
    .bind(Json(new.shipping_address))
    .bind(Json(new.billing_address))
    .bind(new.notes)
    .fetch_optional(conn)
    .await?;

    Ok(id)
}

/// Insert one line-item snapshot.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item: &NewOrderItem<'_>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO shop.order_item
            (id, order_id, product_id, product_name, product_image, product_sku,
             price, quantity, total)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ",
    )
    .bind(OrderItemId::generate())
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.product_name)
    .bind(item.product_image)
    .bind(item.product_sku)
    .bind(item.price)
    .bind(item.quantity)
    .bind(item.total)
    .execute(conn)
    .await?;

    Ok(())
}

/// Move an order to `status`, stamping the matching timestamp.
///
/// `tracking_number` and `notes` overwrite the stored values only when given.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist.
pub async fn update_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
    tracking_number: Option<&str>,
    notes: Option<&str>,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.order
        SET status = $2,
            tracking_number = COALESCE($3, tracking_number),
            notes = COALESCE($4, notes),
            shipped_at = CASE WHEN $2 = 'shipped' THEN now() ELSE shipped_at END,
            delivered_at = CASE WHEN $2 = 'delivered' THEN now() ELSE delivered_at END,
            cancelled_at = CASE WHEN $2 = 'cancelled' THEN now() ELSE cancelled_at END,
            updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(status)
    .bind(tracking_number)
    .bind(notes)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Set the payment status, and optionally the order status with it.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist.
pub async fn update_payment_status(
    conn: &mut PgConnection,
    id: OrderId,
    payment_status: PaymentStatus,
    status: Option<OrderStatus>,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.order
        SET payment_status = $2,
            status = COALESCE($3, status),
            updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(payment_status)
    .bind(status)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
