//! Order workflow.
//!
//! Checkout runs in a single transaction: the ordered products are locked
//! `FOR UPDATE` in ascending id order, stock is checked and decremented, and
//! the order with its line-item snapshots is written. Any failure rolls the
//! whole thing back, stock included.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use tradewind_core::{
    Address, OrderId, OrderStatus, OrderTotals, PaymentStatus, ProductId, ProductStatus, UserId,
    UserRole, line_total,
};

use crate::db::RepositoryError;
use crate::db::orders::{self, LockedProduct, NewOrder, NewOrderItem, OrderRepository};
use crate::models::{Order, User};
use crate::response::{FieldError, FieldErrors};

/// Attempts at finding a free order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Errors from the order workflow.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Product missing or not purchasable.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("insufficient inventory for {product}: requested {requested}, available {available}")]
    InsufficientInventory {
        product: String,
        requested: u32,
        available: i32,
    },

    #[error("order not found")]
    OrderNotFound,

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("order in status {0} cannot be cancelled")]
    CannotBeCancelled(OrderStatus),

    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("could not allocate a unique order number")]
    OrderNumberExhausted,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// One requested line.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of a checkout request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub items: Vec<OrderLine>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub notes: Option<String>,
}

/// Body of a status change request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatus {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

/// Check a checkout request and merge duplicate products.
///
/// The result is keyed by product id, so iterating it visits products in
/// ascending id order.
///
/// # Errors
///
/// Returns every field problem found.
pub fn validate_order(request: &CreateOrder) -> Result<BTreeMap<ProductId, u32>, Vec<FieldError>> {
    let mut errors = FieldErrors::new();
    errors.check(
        !request.items.is_empty(),
        "items",
        "Order must contain at least one item",
    );

    let mut lines: BTreeMap<ProductId, u32> = BTreeMap::new();
    for (i, line) in request.items.iter().enumerate() {
        if line.quantity == 0 {
            errors.add(format!("items[{i}].quantity"), "Quantity must be at least 1");
            continue;
        }
        let merged = lines.entry(line.product_id).or_default();
        *merged = merged.saturating_add(line.quantity);
        if i32::try_from(*merged).is_err() {
            errors.add(format!("items[{i}].quantity"), "Quantity is too large");
        }
    }

    for (prefix, address) in [
        ("shippingAddress", &request.shipping_address),
        ("billingAddress", &request.billing_address),
    ] {
        if let Err(missing) = address.validate() {
            for e in missing {
                errors.add(format!("{prefix}.{}", e.field), e.to_string());
            }
        }
    }

    errors.finish()?;
    Ok(lines)
}

/// A fresh human-readable order number, `ORD-<unix millis>-<3 digits>`.
fn generate_order_number() -> String {
    format!(
        "ORD-{}-{:03}",
        Utc::now().timestamp_millis(),
        rand::random_range(0..1000_u16)
    )
}

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
        }
    }

    /// Place an order for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for an empty or malformed request.
    /// Returns `OrderError::ProductNotFound` if a product is missing or not active.
    /// Returns `OrderError::InsufficientInventory` if stock is short; nothing is changed.
    #[instrument(skip(self, request), fields(user_id = %user_id, lines = request.items.len()))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        request: &CreateOrder,
    ) -> Result<Order, OrderError> {
        let lines = validate_order(request).map_err(OrderError::Validation)?;
        let ids: Vec<ProductId> = lines.keys().copied().collect();

        let mut tx = self.pool.begin().await?;

        let locked: HashMap<ProductId, LockedProduct> = orders::lock_products(&mut *tx, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut priced: Vec<(&LockedProduct, u32, i32)> = Vec::with_capacity(lines.len());
        for (&product_id, &quantity) in &lines {
            let product = locked
                .get(&product_id)
                .filter(|p| p.status == ProductStatus::Active)
                .ok_or(OrderError::ProductNotFound(product_id))?;
            let units = i32::try_from(quantity).map_err(|_| {
                OrderError::Validation(vec![FieldError::new("items", "Quantity is too large")])
            })?;

            if i64::from(quantity) > i64::from(product.inventory) {
                return Err(OrderError::InsufficientInventory {
                    product: product.name.clone(),
                    requested: quantity,
                    available: product.inventory,
                });
            }
            priced.push((product, quantity, units));
        }

        let totals = OrderTotals::compute(priced.iter().map(|&(p, q, _)| (p.price, q)));

        for &(product, quantity, units) in &priced {
            if !orders::decrement_inventory(&mut *tx, product.id, units).await? {
                return Err(OrderError::InsufficientInventory {
                    product: product.name.clone(),
                    requested: quantity,
                    available: product.inventory,
                });
            }
        }

        let mut order_id = None;
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let order_number = generate_order_number();
            let new = NewOrder {
                order_number: &order_number,
                user_id,
                totals,
                shipping_address: &request.shipping_address,
                billing_address: &request.billing_address,
                notes: request.notes.as_deref(),
            };
            order_id = orders::insert_order(&mut *tx, &new).await?;
            if order_id.is_some() {
                break;
            }
        }
        let order_id = order_id.ok_or(OrderError::OrderNumberExhausted)?;

        for &(product, quantity, units) in &priced {
            let item = NewOrderItem {
                product_id: product.id,
                product_name: &product.name,
                product_image: product.images.first().map(String::as_str),
                product_sku: product.sku.as_deref(),
                price: product.price,
                quantity: units,
                total: line_total(product.price, quantity),
            };
            orders::insert_item(&mut *tx, order_id, &item).await?;
        }

        let order = orders::fetch_order(&mut *tx, order_id, false)
            .await?
            .ok_or(OrderError::OrderNotFound)?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order created"
        );
        Ok(order)
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if a query fails.
    pub async fn list_user_orders(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    /// An order the caller may see. Customers only see their own.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::OrderNotFound` if it doesn't exist or isn't visible.
    pub async fn get_order(&self, id: OrderId, caller: &User) -> Result<Order, OrderError> {
        self.orders
            .get(id)
            .await?
            .filter(|order| caller.role.is_staff() || order.user_id == caller.id)
            .ok_or(OrderError::OrderNotFound)
    }

    /// Move an order through its lifecycle (staff only).
    ///
    /// Cancelling restocks every line; refunding a paid order marks the
    /// payment refunded.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Forbidden` for customers.
    /// Returns `OrderError::OrderNotFound` if the order doesn't exist.
    /// Returns `OrderError::InvalidStatusTransition` for an illegal move.
    #[instrument(skip(self, update, caller), fields(order_id = %id, to = %update.status))]
    pub async fn update_status(
        &self,
        id: OrderId,
        update: &UpdateOrderStatus,
        caller: &User,
    ) -> Result<Order, OrderError> {
        if !caller.role.is_staff() {
            return Err(OrderError::Forbidden("only sellers and admins can update orders"));
        }

        let mut tx = self.pool.begin().await?;

        let order = orders::fetch_order(&mut *tx, id, true)
            .await?
            .ok_or(OrderError::OrderNotFound)?;

        if !order.status.can_transition_to(update.status) {
            return Err(OrderError::InvalidStatusTransition {
                from: order.status,
                to: update.status,
            });
        }

        orders::update_status(
            &mut *tx,
            id,
            update.status,
            update.tracking_number.as_deref(),
            update.notes.as_deref(),
        )
        .await?;

        match update.status {
            OrderStatus::Cancelled => orders::restock_items(&mut *tx, id).await?,
            OrderStatus::Refunded if order.payment_status == PaymentStatus::Paid => {
                orders::update_payment_status(&mut *tx, id, PaymentStatus::Refunded, None).await?;
            }
            _ => {}
        }

        let updated = orders::fetch_order(&mut *tx, id, false)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        tx.commit().await?;

        tracing::info!(
            order_id = %id,
            from = %order.status,
            to = %updated.status,
            by = %caller.id,
            "Order status changed"
        );
        Ok(updated)
    }

    /// Cancel one of the caller's own orders while it is still pending or confirmed.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::OrderNotFound` if it doesn't exist or isn't the caller's.
    /// Returns `OrderError::CannotBeCancelled` once the order has moved on.
    #[instrument(skip(self, caller), fields(user_id = %caller.id))]
    pub async fn cancel_order(&self, id: OrderId, caller: &User) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::fetch_order(&mut *tx, id, true)
            .await?
            .filter(|order| order.user_id == caller.id || caller.role == UserRole::Admin)
            .ok_or(OrderError::OrderNotFound)?;

        if !order.can_be_cancelled() {
            return Err(OrderError::CannotBeCancelled(order.status));
        }

        orders::update_status(&mut *tx, id, OrderStatus::Cancelled, None, None).await?;
        orders::restock_items(&mut *tx, id).await?;

        let updated = orders::fetch_order(&mut *tx, id, false)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        tx.commit().await?;

        tracing::info!(order_id = %id, "Order cancelled by buyer");
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            company: None,
            address1: "12 Analytical Way".to_owned(),
            address2: None,
            city: "London".to_owned(),
            state: "LDN".to_owned(),
            postal_code: "N1 9GU".to_owned(),
            country: "GB".to_owned(),
            phone: None,
        }
    }

    fn request(items: Vec<OrderLine>) -> CreateOrder {
        CreateOrder {
            items,
            shipping_address: address(),
            billing_address: address(),
            notes: None,
        }
    }

    #[test]
    fn test_duplicate_lines_are_merged_in_id_order() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        let lines = validate_order(&request(vec![
            OrderLine { product_id: b, quantity: 1 },
            OrderLine { product_id: a, quantity: 2 },
            OrderLine { product_id: b, quantity: 3 },
        ]))
        .unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[&a], 2);
        assert_eq!(lines[&b], 4);

        let keys: Vec<_> = lines.keys().copied().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_empty_order_rejected() {
        let errors = validate_order(&request(vec![])).unwrap_err();
        assert_eq!(errors.first().unwrap().field.as_deref(), Some("items"));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let errors = validate_order(&request(vec![OrderLine {
            product_id: ProductId::generate(),
            quantity: 0,
        }]))
        .unwrap_err();
        assert_eq!(
            errors.first().unwrap().field.as_deref(),
            Some("items[0].quantity")
        );
    }

    #[test]
    fn test_quantity_beyond_stock_column_rejected() {
        let product_id = ProductId::generate();
        let errors = validate_order(&request(vec![
            OrderLine {
                product_id,
                quantity: u32::MAX,
            },
        ]))
        .unwrap_err();
        assert_eq!(
            errors.first().unwrap().message,
            "Quantity is too large"
        );

        // Merged lines are bounded too
        let half = u32::try_from(i32::MAX).unwrap() / 2 + 1;
        let errors = validate_order(&request(vec![
            OrderLine { product_id, quantity: half },
            OrderLine { product_id, quantity: half },
        ]))
        .unwrap_err();
        assert_eq!(
            errors.first().unwrap().field.as_deref(),
            Some("items[1].quantity")
        );
    }

    #[test]
    fn test_blank_address_fields_reported_with_prefix() {
        let mut req = request(vec![OrderLine {
            product_id: ProductId::generate(),
            quantity: 1,
        }]);
        req.billing_address.city = "  ".to_owned();

        let errors = validate_order(&req).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.first().unwrap().field.as_deref(),
            Some("billingAddress.city")
        );
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.first().copied(), Some("ORD"));
        assert!(parts.get(1).unwrap().parse::<i64>().is_ok());
        assert_eq!(parts.get(2).unwrap().len(), 3);
    }

    #[test]
    fn test_create_order_deserializes_camel_case() {
        let body = serde_json::json!({
            "items": [{ "productId": ProductId::generate(), "quantity": 2 }],
            "shippingAddress": address(),
            "billingAddress": address(),
        });
        let parsed: CreateOrder = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.items.first().unwrap().quantity, 2);
        assert!(parsed.notes.is_none());
    }
}
