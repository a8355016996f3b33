//! Product and category management.
//!
//! Visibility follows the caller's role: anonymous callers and customers see
//! active products only, sellers also see their own drafts and inactive
//! products, admins see everything.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use tradewind_core::{CategoryId, ProductId, ProductStatus, Slug, UserRole};

use crate::db::RepositoryError;
use crate::db::categories::{CategoryRepository, CategoryUpdate, NewCategory};
use crate::db::products::{
    DeleteOutcome, NewProduct, ProductFilter, ProductRepository, ProductUpdate, SortDirection,
    SortField, Visibility,
};
use crate::models::{Category, CategoryDetail, CategorySummary, Dimensions, Product, User};
use crate::response::{FieldError, FieldErrors, Pagination};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

const MAX_NAME_LENGTH: usize = 200;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product not found")]
    ProductNotFound,

    #[error("category not found")]
    CategoryNotFound,

    /// Role or ownership check failed.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// Unique slug or SKU taken, or a category still in use.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CatalogError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            other => Self::Repository(other),
        }
    }
}

/// Accepts `null` as `Some(None)` so a patch can clear a nullable field.
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// Request types
// =============================================================================

/// Query parameters for a product listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub status: Option<ProductStatus>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Body of a product creation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    #[serde(default)]
    pub inventory: i32,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<Dimensions>,
    pub category_id: CategoryId,
}

/// Body of a product update request. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[serde(deserialize_with = "nullable")]
    pub compare_at_price: Option<Option<Decimal>>,
    #[serde(deserialize_with = "nullable")]
    pub sku: Option<Option<String>>,
    pub inventory: Option<i32>,
    pub status: Option<ProductStatus>,
    pub images: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    #[serde(deserialize_with = "nullable")]
    pub weight: Option<Option<Decimal>>,
    #[serde(deserialize_with = "nullable")]
    pub dimensions: Option<Option<Dimensions>>,
    pub category_id: Option<CategoryId>,
}

/// Body of a category creation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub name: String,
    /// Generated from the name when absent.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub parent_id: Option<CategoryId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
}

const fn default_true() -> bool {
    true
}

/// Body of a category update request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub image: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub parent_id: Option<Option<CategoryId>>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

// =============================================================================
// Validation
// =============================================================================

fn visibility_for(caller: Option<&User>) -> Visibility {
    match caller {
        Some(user) if user.role == UserRole::Admin => Visibility::All,
        Some(user) if user.role == UserRole::Seller => Visibility::Seller(user.id),
        _ => Visibility::Public,
    }
}

pub(crate) fn is_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

fn check_name(errors: &mut FieldErrors, name: &str) {
    errors.check(!name.trim().is_empty(), "name", "Name is required");
    errors.check(
        name.chars().count() <= MAX_NAME_LENGTH,
        "name",
        "Name is too long",
    );
}

fn check_images(errors: &mut FieldErrors, images: &[String]) {
    for (i, image) in images.iter().enumerate() {
        if !is_url(image) {
            errors.add(format!("images[{i}]"), "Invalid URL");
        }
    }
}

fn check_positive(errors: &mut FieldErrors, value: Option<Decimal>, field: &str, message: &str) {
    if let Some(value) = value {
        errors.check(value > Decimal::ZERO, field, message);
    }
}

fn check_dimensions(errors: &mut FieldErrors, dimensions: Option<&Dimensions>) {
    if let Some(d) = dimensions {
        errors.check(
            d.length > Decimal::ZERO && d.width > Decimal::ZERO && d.height > Decimal::ZERO,
            "dimensions",
            "Dimensions must be positive",
        );
    }
}

fn validate_draft(draft: &ProductDraft) -> Result<(), Vec<FieldError>> {
    let mut errors = FieldErrors::new();
    check_name(&mut errors, &draft.name);
    check_positive(&mut errors, Some(draft.price), "price", "Price must be positive");
    check_positive(
        &mut errors,
        draft.compare_at_price,
        "compareAtPrice",
        "Compare-at price must be positive",
    );
    check_positive(&mut errors, draft.weight, "weight", "Weight must be positive");
    errors.check(draft.inventory >= 0, "inventory", "Inventory cannot be negative");
    if let Some(sku) = &draft.sku {
        errors.check(!sku.trim().is_empty(), "sku", "SKU cannot be blank");
    }
    check_images(&mut errors, &draft.images);
    check_dimensions(&mut errors, draft.dimensions.as_ref());
    errors.finish()
}

fn validate_patch(patch: &ProductPatch) -> Result<(), Vec<FieldError>> {
    let mut errors = FieldErrors::new();
    if let Some(name) = &patch.name {
        check_name(&mut errors, name);
    }
    check_positive(&mut errors, patch.price, "price", "Price must be positive");
    check_positive(
        &mut errors,
        patch.compare_at_price.flatten(),
        "compareAtPrice",
        "Compare-at price must be positive",
    );
    check_positive(
        &mut errors,
        patch.weight.flatten(),
        "weight",
        "Weight must be positive",
    );
    if let Some(inventory) = patch.inventory {
        errors.check(inventory >= 0, "inventory", "Inventory cannot be negative");
    }
    if let Some(Some(sku)) = &patch.sku {
        errors.check(!sku.trim().is_empty(), "sku", "SKU cannot be blank");
    }
    if let Some(images) = &patch.images {
        check_images(&mut errors, images);
    }
    check_dimensions(&mut errors, patch.dimensions.flatten().as_ref());
    errors.finish()
}

fn parse_slug(errors: &mut FieldErrors, raw: &str) -> Option<Slug> {
    match Slug::parse(raw) {
        Ok(slug) => Some(slug),
        Err(e) => {
            errors.add("slug", e.to_string());
            None
        }
    }
}

/// Turn listing parameters into a repository filter.
///
/// # Errors
///
/// Returns field errors for out-of-range paging, unknown sort keys or an
/// inverted price range.
pub fn product_filter(
    query: &ProductQuery,
    caller: Option<&User>,
) -> Result<ProductFilter, Vec<FieldError>> {
    let mut errors = FieldErrors::new();

    let page = query.page.unwrap_or(1);
    errors.check(page >= 1, "page", "Page must be at least 1");

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    errors.check(
        (1..=MAX_PAGE_SIZE).contains(&limit),
        "limit",
        "Limit must be between 1 and 100",
    );

    let sort_by = match query.sort_by.as_deref() {
        None | Some("createdAt" | "created_at") => SortField::CreatedAt,
        Some("name") => SortField::Name,
        Some("price") => SortField::Price,
        Some(_) => {
            errors.add("sortBy", "Sort field must be one of name, price, createdAt");
            SortField::CreatedAt
        }
    };
    let sort_direction = match query.sort_order.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("desc") => SortDirection::Desc,
        Some("asc") => SortDirection::Asc,
        Some(_) => {
            errors.add("sortOrder", "Sort order must be asc or desc");
            SortDirection::Desc
        }
    };

    check_positive(&mut errors, query.min_price, "minPrice", "Minimum price must be positive");
    check_positive(&mut errors, query.max_price, "maxPrice", "Maximum price must be positive");
    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        errors.check(min <= max, "minPrice", "Minimum price exceeds maximum price");
    }

    errors.finish()?;

    let visibility = visibility_for(caller);
    Ok(ProductFilter {
        visibility,
        search: query.search.clone(),
        category_id: query.category_id,
        min_price: query.min_price,
        max_price: query.max_price,
        // Status filtering is a staff tool; public listings are active-only anyway
        status: if visibility == Visibility::Public {
            None
        } else {
            query.status
        },
        sort_by,
        sort_direction,
        page,
        limit,
    })
}

// =============================================================================
// Service
// =============================================================================

/// Catalog service.
pub struct CatalogService<'a> {
    products: ProductRepository<'a>,
    categories: CategoryRepository<'a>,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            products: ProductRepository::new(pool),
            categories: CategoryRepository::new(pool),
        }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// One page of products visible to the caller.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for bad listing parameters.
    pub async fn list_products(
        &self,
        query: &ProductQuery,
        caller: Option<&User>,
    ) -> Result<(Vec<Product>, Pagination), CatalogError> {
        let filter = product_filter(query, caller).map_err(CatalogError::Validation)?;
        let (products, total) = self.products.list(&filter).await?;
        Ok((products, Pagination::new(filter.page, filter.limit, total)))
    }

    /// A single product, if the caller may see it. Counts a view on active products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` if it doesn't exist or is hidden.
    pub async fn get_product(
        &self,
        id: ProductId,
        caller: Option<&User>,
    ) -> Result<Product, CatalogError> {
        let mut product = self
            .products
            .get_by_id(id)
            .await?
            .filter(|p| visibility_for(caller).allows(p.seller_id, p.status))
            .ok_or(CatalogError::ProductNotFound)?;

        if product.status == ProductStatus::Active {
            product.view_count = self.products.increment_view_count(id).await?;
        }

        Ok(product)
    }

    /// List a new product owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden` for customers.
    /// Returns `CatalogError::CategoryNotFound` if the category doesn't exist.
    /// Returns `CatalogError::Conflict` if the SKU is taken.
    #[instrument(skip(self, draft, caller), fields(seller_id = %caller.id))]
    pub async fn create_product(
        &self,
        draft: ProductDraft,
        caller: &User,
    ) -> Result<Product, CatalogError> {
        if !caller.role.is_staff() {
            return Err(CatalogError::Forbidden("only sellers and admins can list products"));
        }
        validate_draft(&draft).map_err(CatalogError::Validation)?;
        self.require_category(draft.category_id).await?;

        let new = NewProduct {
            name: draft.name.trim().to_owned(),
            description: draft.description,
            price: draft.price,
            compare_at_price: draft.compare_at_price,
            sku: draft.sku.map(|s| s.trim().to_owned()),
            inventory: draft.inventory,
            status: draft.status,
            images: draft.images,
            tags: draft.tags,
            weight: draft.weight,
            dimensions: draft.dimensions,
            category_id: draft.category_id,
            seller_id: caller.id,
        };
        let product = self.products.create(&new).await?;
        tracing::info!(product_id = %product.id, name = %product.name, "Product created");

        Ok(product)
    }

    /// Change a product. Sellers may only change their own.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` if it doesn't exist or is hidden.
    /// Returns `CatalogError::Forbidden` if the caller doesn't own it.
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
        caller: &User,
    ) -> Result<Product, CatalogError> {
        self.owned_product(id, caller).await?;
        validate_patch(&patch).map_err(CatalogError::Validation)?;
        if let Some(category_id) = patch.category_id {
            self.require_category(category_id).await?;
        }

        let update = ProductUpdate {
            name: patch.name.map(|n| n.trim().to_owned()),
            description: patch.description,
            price: patch.price,
            compare_at_price: patch.compare_at_price,
            sku: patch.sku.map(|s| s.map(|s| s.trim().to_owned())),
            inventory: patch.inventory,
            status: patch.status,
            images: patch.images,
            tags: patch.tags,
            weight: patch.weight,
            dimensions: patch.dimensions,
            category_id: patch.category_id,
        };
        let product = self.products.update(id, &update).await.map_err(|e| match e {
            RepositoryError::NotFound => CatalogError::ProductNotFound,
            other => other.into(),
        })?;
        tracing::info!(product_id = %id, "Product updated");

        Ok(product)
    }

    /// Remove a product, or retire it if past orders reference it.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` if it doesn't exist or is hidden.
    /// Returns `CatalogError::Forbidden` if the caller doesn't own it.
    pub async fn delete_product(
        &self,
        id: ProductId,
        caller: &User,
    ) -> Result<DeleteOutcome, CatalogError> {
        self.owned_product(id, caller).await?;

        let outcome = self.products.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => CatalogError::ProductNotFound,
            other => other.into(),
        })?;
        tracing::info!(product_id = %id, ?outcome, "Product removed");

        Ok(outcome)
    }

    async fn owned_product(&self, id: ProductId, caller: &User) -> Result<Product, CatalogError> {
        if !caller.role.is_staff() {
            return Err(CatalogError::Forbidden("only sellers and admins can manage products"));
        }
        let product = self
            .products
            .get_by_id(id)
            .await?
            .ok_or(CatalogError::ProductNotFound)?;

        if caller.role != UserRole::Admin && product.seller_id != caller.id {
            return Err(CatalogError::Forbidden("you can only manage your own products"));
        }
        Ok(product)
    }

    async fn require_category(&self, id: CategoryId) -> Result<Category, CatalogError> {
        self.categories
            .get_by_id(id)
            .await?
            .ok_or_else(|| {
                CatalogError::Validation(vec![FieldError::new("categoryId", "Category not found")])
            })
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Active categories with their active children.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<CategoryDetail>, CatalogError> {
        let categories = self.categories.list_active().await?;
        Ok(assemble_tree(categories))
    }

    /// An active category with its parent, children and active product count.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::CategoryNotFound` if it doesn't exist or is inactive.
    pub async fn get_category(&self, id: CategoryId) -> Result<CategoryDetail, CatalogError> {
        let category = self
            .categories
            .get_by_id(id)
            .await?
            .filter(|c| c.is_active)
            .ok_or(CatalogError::CategoryNotFound)?;

        let parent = match category.parent_id {
            Some(parent_id) => self.categories.summary(parent_id).await?,
            None => None,
        };
        let children = self.categories.active_children(id).await?;
        let product_count = self.categories.active_product_count(id).await?;

        Ok(CategoryDetail {
            category,
            parent,
            children,
            product_count: Some(product_count),
        })
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden` unless the caller is an admin.
    /// Returns `CatalogError::Conflict` if the slug is taken.
    #[instrument(skip(self, draft, caller), fields(name = %draft.name))]
    pub async fn create_category(
        &self,
        draft: CategoryDraft,
        caller: &User,
    ) -> Result<Category, CatalogError> {
        require_admin(caller)?;

        let mut errors = FieldErrors::new();
        check_name(&mut errors, &draft.name);
        errors.check(draft.sort_order >= 0, "sortOrder", "Sort order cannot be negative");
        if let Some(image) = &draft.image {
            errors.check(is_url(image), "image", "Invalid URL");
        }
        let slug = match &draft.slug {
            Some(raw) => parse_slug(&mut errors, raw),
            None => match Slug::from_name(&draft.name) {
                Ok(slug) => Some(slug),
                Err(_) => {
                    errors.add("slug", "Could not derive a slug from the name");
                    None
                }
            },
        };
        errors.finish().map_err(CatalogError::Validation)?;
        let Some(slug) = slug else {
            return Err(CatalogError::Validation(vec![FieldError::new(
                "slug",
                "Slug is required",
            )]));
        };

        if let Some(parent_id) = draft.parent_id {
            self.require_parent(parent_id).await?;
        }

        let new = NewCategory {
            name: draft.name.trim().to_owned(),
            slug,
            description: draft.description,
            image: draft.image,
            parent_id: draft.parent_id,
            is_active: draft.is_active,
            sort_order: draft.sort_order,
        };
        let category = self.categories.create(&new).await?;
        tracing::info!(category_id = %category.id, "Category created");

        Ok(category)
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden` unless the caller is an admin.
    /// Returns `CatalogError::CategoryNotFound` if it doesn't exist.
    /// Returns `CatalogError::Validation` if the new parent would create a cycle.
    pub async fn update_category(
        &self,
        id: CategoryId,
        patch: CategoryPatch,
        caller: &User,
    ) -> Result<Category, CatalogError> {
        require_admin(caller)?;

        let mut errors = FieldErrors::new();
        if let Some(name) = &patch.name {
            check_name(&mut errors, name);
        }
        if let Some(sort_order) = patch.sort_order {
            errors.check(sort_order >= 0, "sortOrder", "Sort order cannot be negative");
        }
        if let Some(Some(image)) = &patch.image {
            errors.check(is_url(image), "image", "Invalid URL");
        }
        let slug = patch.slug.as_deref().and_then(|raw| parse_slug(&mut errors, raw));
        errors.finish().map_err(CatalogError::Validation)?;

        if let Some(Some(parent_id)) = patch.parent_id {
            self.require_parent(parent_id).await?;
            // The new parent must not sit below this category
            if self.categories.is_ancestor_or_self(id, parent_id).await? {
                return Err(CatalogError::Validation(vec![FieldError::new(
                    "parentId",
                    "A category cannot be its own ancestor",
                )]));
            }
        }

        let update = CategoryUpdate {
            name: patch.name.map(|n| n.trim().to_owned()),
            slug,
            description: patch.description,
            image: patch.image,
            parent_id: patch.parent_id,
            is_active: patch.is_active,
            sort_order: patch.sort_order,
        };
        let category = self.categories.update(id, &update).await.map_err(|e| match e {
            RepositoryError::NotFound => CatalogError::CategoryNotFound,
            other => other.into(),
        })?;
        tracing::info!(category_id = %id, "Category updated");

        Ok(category)
    }

    /// Delete an empty category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden` unless the caller is an admin.
    /// Returns `CatalogError::Conflict` while products or subcategories reference it.
    pub async fn delete_category(&self, id: CategoryId, caller: &User) -> Result<(), CatalogError> {
        require_admin(caller)?;

        self.categories.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => CatalogError::CategoryNotFound,
            other => other.into(),
        })?;
        tracing::info!(category_id = %id, "Category deleted");

        Ok(())
    }

    async fn require_parent(&self, parent_id: CategoryId) -> Result<(), CatalogError> {
        if self.categories.get_by_id(parent_id).await?.is_none() {
            return Err(CatalogError::Validation(vec![FieldError::new(
                "parentId",
                "Parent category not found",
            )]));
        }
        Ok(())
    }
}

fn require_admin(caller: &User) -> Result<(), CatalogError> {
    if caller.role == UserRole::Admin {
        Ok(())
    } else {
        Err(CatalogError::Forbidden("only admins can manage categories"))
    }
}

/// Attach parent and child summaries to a flat list of categories.
fn assemble_tree(categories: Vec<Category>) -> Vec<CategoryDetail> {
    let summaries: HashMap<CategoryId, CategorySummary> = categories
        .iter()
        .map(|c| {
            (
                c.id,
                CategorySummary {
                    id: c.id,
                    name: c.name.clone(),
                    slug: c.slug.clone(),
                },
            )
        })
        .collect();

    let mut children: HashMap<CategoryId, Vec<CategorySummary>> = HashMap::new();
    for category in &categories {
        if let Some(parent_id) = category.parent_id
            && let Some(summary) = summaries.get(&category.id)
        {
            children.entry(parent_id).or_default().push(summary.clone());
        }
    }

    categories
        .into_iter()
        .map(|category| CategoryDetail {
            parent: category
                .parent_id
                .and_then(|parent_id| summaries.get(&parent_id).cloned()),
            children: children.remove(&category.id).unwrap_or_default(),
            product_count: None,
            category,
        })
        .collect()
}
