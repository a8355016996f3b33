//! Product domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradewind_core::{CategoryId, ProductId, ProductStatus, UserId};

/// Package dimensions, stored as JSONB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: Decimal,
    pub width: Decimal,
    pub height: Decimal,
}

/// A product listed by a seller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    /// Units on hand. Never negative.
    pub inventory: i32,
    pub status: ProductStatus,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<Dimensions>,
    pub view_count: i32,
    pub sales_count: i32,
    pub category_id: CategoryId,
    pub seller_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// A compare-at price above the selling price marks the product as on sale.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.compare_at_price.is_some_and(|compare| compare > self.price)
    }

    /// Whole-percent discount against the compare-at price, 0 when not on sale.
    #[must_use]
    pub fn discount_percentage(&self) -> Decimal {
        match self.compare_at_price {
            Some(compare) if compare > self.price => ((compare - self.price) / compare
                * Decimal::ONE_HUNDRED)
                .round(),
            _ => Decimal::ZERO,
        }
    }

    #[must_use]
    pub const fn is_in_stock(&self) -> bool {
        self.inventory > 0
    }

    /// First image URL, snapshotted onto order items.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A product as returned by the API, with derived flags.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub is_on_sale: bool,
    pub discount_percentage: Decimal,
    pub is_in_stock: bool,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            is_on_sale: product.is_on_sale(),
            discount_percentage: product.discount_percentage(),
            is_in_stock: product.is_in_stock(),
            product,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, compare_at: Option<i64>, inventory: i32) -> Product {
        Product {
            id: ProductId::generate(),
            name: "Nike Air Max 270".to_owned(),
            description: "Lifestyle shoe".to_owned(),
            price: Decimal::new(price, 2),
            compare_at_price: compare_at.map(|c| Decimal::new(c, 2)),
            sku: Some("NIKE-AM270-BLK-10".to_owned()),
            inventory,
            status: ProductStatus::Active,
            images: vec!["https://img.example.org/am270.jpg".to_owned()],
            tags: vec!["shoes".to_owned()],
            weight: None,
            dimensions: None,
            view_count: 0,
            sales_count: 0,
            category_id: CategoryId::generate(),
            seller_id: UserId::generate(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_on_sale_and_discount() {
        let p = product(14_999, Some(17_999), 5);
        assert!(p.is_on_sale());
        assert_eq!(p.discount_percentage(), Decimal::from(17));
    }

    #[test]
    fn test_not_on_sale() {
        assert!(!product(14_999, None, 5).is_on_sale());
        let higher = product(14_999, Some(9_999), 5);
        assert!(!higher.is_on_sale());
        assert_eq!(higher.discount_percentage(), Decimal::ZERO);
    }

    #[test]
    fn test_view_serializes_derived_flags() {
        let view = ProductView::from(product(14_999, Some(17_999), 0));
        let json = serde_json::to_value(&view).unwrap_or_default();
        assert_eq!(json["isOnSale"], serde_json::Value::Bool(true));
        assert_eq!(json["isInStock"], serde_json::Value::Bool(false));
        assert_eq!(json["name"], "Nike Air Max 270");
        assert_eq!(json["compareAtPrice"], "179.99");
    }

    #[test]
    fn test_stock_and_image() {
        let p = product(1_299, None, 0);
        assert!(!p.is_in_stock());
        assert_eq!(p.primary_image(), Some("https://img.example.org/am270.jpg"));
    }
}
