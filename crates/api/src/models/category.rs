//! Category domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tradewind_core::{CategoryId, Slug};

/// A product category. Categories form a tree through `parent_id`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub image: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short form used for parent/child links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
}

/// A category with its immediate relatives.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub parent: Option<CategorySummary>,
    pub children: Vec<CategorySummary>,
    /// Number of active products, only populated on single-category reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_count: Option<i64>,
}
