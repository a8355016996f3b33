//! Product repository.
//!
//! Listing queries are assembled with [`QueryBuilder`] because every filter
//! is optional; all user input goes through bind parameters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use tradewind_core::{CategoryId, ProductId, ProductStatus, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::{Dimensions, Product};

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.price, p.compare_at_price, \
     p.sku, p.inventory, p.status, p.images, p.tags, p.weight, p.dimensions, p.view_count, \
     p.sales_count, p.category_id, p.seller_id, p.created_at, p.updated_at";

/// Which products a caller is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Active products only (anonymous callers and customers).
    Public,
    /// Active products plus everything owned by this seller.
    Seller(UserId),
    /// Everything (admins).
    All,
}

impl Visibility {
    /// Whether a product with this owner and status is visible.
    #[must_use]
    pub fn allows(self, seller_id: UserId, status: ProductStatus) -> bool {
        match self {
            Self::All => true,
            Self::Seller(me) => status == ProductStatus::Active || seller_id == me,
            Self::Public => status == ProductStatus::Active,
        }
    }
}

/// Column a product listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Name,
    Price,
    #[default]
    CreatedAt,
}

impl SortField {
    const fn column(self) -> &'static str {
        match self {
            Self::Name => "p.name",
            Self::Price => "p.price",
            Self::CreatedAt => "p.created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filters, ordering and paging for a product listing.
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub visibility: Visibility,
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub status: Option<ProductStatus>,
    pub sort_by: SortField,
    pub sort_direction: SortDirection,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

/// Fields required to create a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    pub inventory: i32,
    pub status: ProductStatus,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<Dimensions>,
    pub category_id: CategoryId,
    pub seller_id: UserId,
}

/// Partial product update. Nullable columns use `Option<Option<_>>`.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Option<Decimal>>,
    pub sku: Option<Option<String>>,
    pub inventory: Option<i32>,
    pub status: Option<ProductStatus>,
    pub images: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub weight: Option<Option<Decimal>>,
    pub dimensions: Option<Option<Dimensions>>,
    pub category_id: Option<CategoryId>,
}

/// What [`ProductRepository::delete`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The product appears on past orders, so it was set inactive instead.
    Deactivated,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    sku: Option<String>,
    inventory: i32,
    status: ProductStatus,
    images: Vec<String>,
    tags: Vec<String>,
    weight: Option<Decimal>,
    dimensions: Option<Json<Dimensions>>,
    view_count: i32,
    sales_count: i32,
    category_id: CategoryId,
    seller_id: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            compare_at_price: row.compare_at_price,
            sku: row.sku,
            inventory: row.inventory,
            status: row.status,
            images: row.images,
            tags: row.tags,
            weight: row.weight,
            dimensions: row.dimensions.map(|Json(d)| d),
            view_count: row.view_count,
            sales_count: row.sales_count,
            category_id: row.category_id,
            seller_id: row.seller_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Escape `LIKE` metacharacters and wrap in `%...%`.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in search.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    match filter.visibility {
        Visibility::Public => {
            qb.push(" AND p.status = 'active'");
        }
        Visibility::Seller(seller_id) => {
            qb.push(" AND (p.status = 'active' OR p.seller_id = ")
                .push_bind(seller_id)
                .push(")");
        }
        Visibility::All => {}
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(p.tags) AS tag WHERE tag ILIKE ")
            .push_bind(pattern)
            .push("))");
    }

    if let Some(category_id) = filter.category_id {
        qb.push(" AND p.category_id = ").push_bind(category_id);
    }
    if let Some(min_price) = filter.min_price {
        qb.push(" AND p.price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        qb.push(" AND p.price <= ").push_bind(max_price);
    }
    if let Some(status) = filter.status {
        qb.push(" AND p.status = ").push_bind(status);
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of products matching `filter`, plus the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM shop.product p WHERE TRUE");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        let mut query = QueryBuilder::new("SELECT ");
        query.push(PRODUCT_COLUMNS);
        query.push(" FROM shop.product p WHERE TRUE");
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY ")
            .push(filter.sort_by.column())
            .push(" ")
            .push(filter.sort_direction.keyword())
            .push(", p.id");
        let offset = i64::from(filter.page.saturating_sub(1)) * i64::from(filter.limit);
        query
            .push(" LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(self.pool).await?;

        Ok((rows.into_iter().map(Product::from).collect(), total))
    }

    /// Get a product by ID regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    /// Increment the view counter and return the new value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn increment_view_count(&self, id: ProductId) -> Result<i32, RepositoryError> {
        let views = sqlx::query_scalar::<_, i32>(
            "UPDATE shop.product SET view_count = view_count + 1 WHERE id = $1 RETURNING view_count",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(views)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is taken.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO shop.product AS p
                (id, name, description, price, compare_at_price, sku, inventory, status,
                 images, tags, weight, dimensions, category_id, seller_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(ProductId::generate())
            .bind(&new.name)
            .bind(&new.description)
            .bind(new.price)
            .bind(new.compare_at_price)
            .bind(new.sku.as_deref())
            .bind(new.inventory)
            .bind(new.status)
            .bind(&new.images)
            .bind(&new.tags)
            .bind(new.weight)
            .bind(new.dimensions.map(Json))
            .bind(new.category_id)
            .bind(new.seller_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "sku already exists"))?;

        Ok(row.into())
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new SKU is taken.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            UPDATE shop.product AS p
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                compare_at_price = CASE WHEN $5 THEN $6 ELSE compare_at_price END,
                sku = CASE WHEN $7 THEN $8 ELSE sku END,
                inventory = COALESCE($9, inventory),
                status = COALESCE($10, status),
                images = COALESCE($11, images),
                tags = COALESCE($12, tags),
                weight = CASE WHEN $13 THEN $14 ELSE weight END,
                dimensions = CASE WHEN $15 THEN $16 ELSE dimensions END,
                category_id = COALESCE($17, category_id),
                updated_at = now()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.description.as_deref())
            .bind(update.price)
            .bind(update.compare_at_price.is_some())
            .bind(update.compare_at_price.flatten())
            .bind(update.sku.is_some())
            .bind(update.sku.clone().flatten())
            .bind(update.inventory)
            .bind(update.status)
            .bind(update.images.as_ref())
            .bind(update.tags.as_ref())
            .bind(update.weight.is_some())
            .bind(update.weight.flatten())
            .bind(update.dimensions.is_some())
            .bind(update.dimensions.flatten().map(Json))
            .bind(update.category_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "sku already exists"))?
            .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a product, or deactivate it when past orders reference it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn delete(&self, id: ProductId) -> Result<DeleteOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let ordered = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM shop.order_item WHERE product_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let (result, outcome) = if ordered {
            let result = sqlx::query(
                "UPDATE shop.product SET status = 'inactive', updated_at = now() WHERE id = $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
            (result, DeleteOutcome::Deactivated)
        } else {
            let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            (result, DeleteOutcome::Deleted)
        };

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// Number of products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shop.product")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
