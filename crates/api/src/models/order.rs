//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use tradewind_core::{
    Address, OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, UserId,
};

/// An order with its line items.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    /// Human-readable identifier, e.g. `ORD-1718000000000-042`.
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub notes: Option<String>,
    pub payment_intent_id: Option<String>,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }

    #[must_use]
    pub const fn can_be_cancelled(&self) -> bool {
        self.status.can_be_cancelled()
    }

    #[must_use]
    pub fn can_be_shipped(&self) -> bool {
        self.status == OrderStatus::Processing && self.payment_status == PaymentStatus::Paid
    }

    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// An order as returned by the API, with derived fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub item_count: i64,
    pub can_be_cancelled: bool,
    pub can_be_shipped: bool,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            item_count: order.item_count(),
            can_be_cancelled: order.can_be_cancelled(),
            can_be_shipped: order.can_be_shipped(),
            order,
        }
    }
}

/// Snapshot of a product at the time it was ordered.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub product_sku: Option<String>,
    /// Unit price when ordered.
    pub price: Decimal,
    pub quantity: i32,
    /// `price × quantity`.
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}
