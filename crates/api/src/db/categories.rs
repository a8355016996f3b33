//! Category repository.

use sqlx::PgPool;

use tradewind_core::{CategoryId, Slug};

use super::{RepositoryError, map_unique_violation};
use crate::models::{Category, CategorySummary};

/// Fields required to create a category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub image: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub is_active: bool,
    pub sort_order: i32,
}

/// Partial category update.
///
/// Nullable columns use `Option<Option<_>>`: the outer `None` leaves the
/// column alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub slug: Option<Slug>,
    pub description: Option<Option<String>>,
    pub image: Option<Option<String>>,
    pub parent_id: Option<Option<CategoryId>>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All active categories ordered by `sort_order`, then name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            r"
            SELECT id, name, slug, description, image, parent_id, is_active, sort_order,
                   created_at, updated_at
            FROM shop.category
            WHERE is_active
            ORDER BY sort_order, name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// Get a category by ID regardless of whether it is active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            r"
            SELECT id, name, slug, description, image, parent_id, is_active, sort_order,
                   created_at, updated_at
            FROM shop.category
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(category)
    }

    /// Get a category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            r"
            SELECT id, name, slug, description, image, parent_id, is_active, sort_order,
                   created_at, updated_at
            FROM shop.category
            WHERE slug = $1
            ",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(category)
    }

    /// Summary of a single category, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self, id: CategoryId) -> Result<Option<CategorySummary>, RepositoryError> {
        let summary = sqlx::query_as::<_, CategorySummary>(
            "SELECT id, name, slug FROM shop.category WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(summary)
    }

    /// Active children of a category, in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_children(
        &self,
        parent_id: CategoryId,
    ) -> Result<Vec<CategorySummary>, RepositoryError> {
        let children = sqlx::query_as::<_, CategorySummary>(
            r"
            SELECT id, name, slug
            FROM shop.category
            WHERE parent_id = $1 AND is_active
            ORDER BY sort_order, name
            ",
        )
        .bind(parent_id)
        .fetch_all(self.pool)
        .await?;

        Ok(children)
    }

    /// Number of active products in a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_product_count(&self, id: CategoryId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shop.product WHERE category_id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, new: &NewCategory) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            r"
            INSERT INTO shop.category
                (id, name, slug, description, image, parent_id, is_active, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, slug, description, image, parent_id, is_active, sort_order,
                      created_at, updated_at
            ",
        )
        .bind(CategoryId::generate())
        .bind(&new.name)
        .bind(&new.slug)
        .bind(new.description.as_deref())
        .bind(new.image.as_deref())
        .bind(new.parent_id)
        .bind(new.is_active)
        .bind(new.sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "category slug already exists"))
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        update: &CategoryUpdate,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            r"
            UPDATE shop.category
            SET name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = CASE WHEN $4 THEN $5 ELSE description END,
                image = CASE WHEN $6 THEN $7 ELSE image END,
                parent_id = CASE WHEN $8 THEN $9 ELSE parent_id END,
                is_active = COALESCE($10, is_active),
                sort_order = COALESCE($11, sort_order),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, slug, description, image, parent_id, is_active, sort_order,
                      created_at, updated_at
            ",
        )
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.slug.as_ref())
        .bind(update.description.is_some())
        .bind(update.description.clone().flatten())
        .bind(update.image.is_some())
        .bind(update.image.clone().flatten())
        .bind(update.parent_id.is_some())
        .bind(update.parent_id.flatten())
        .bind(update.is_active)
        .bind(update.sort_order)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "category slug already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Whether `ancestor` appears on the parent chain of `id` (or is `id`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_ancestor_or_self(
        &self,
        ancestor: CategoryId,
        id: CategoryId,
    ) -> Result<bool, RepositoryError> {
        let found = sqlx::query_scalar::<_, bool>(
            r"
            WITH RECURSIVE chain AS (
                SELECT id, parent_id FROM shop.category WHERE id = $2
                UNION
                SELECT c.id, c.parent_id
                FROM shop.category c
                JOIN chain ON c.id = chain.parent_id
            )
            SELECT EXISTS (SELECT 1 FROM chain WHERE id = $1)
            ",
        )
        .bind(ancestor)
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(found)
    }

    /// Delete a category that owns no products and no child categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    /// Returns `RepositoryError::Conflict` if products or children still reference it.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so a concurrent insert can't slip a child in between check and delete
        let exists = sqlx::query_scalar::<_, CategoryId>(
            "SELECT id FROM shop.category WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let (products, children) = sqlx::query_as::<_, (i64, i64)>(
            r"
            SELECT
                (SELECT COUNT(*) FROM shop.product WHERE category_id = $1),
                (SELECT COUNT(*) FROM shop.category WHERE parent_id = $1)
            ",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if products > 0 {
            return Err(RepositoryError::Conflict(
                "cannot delete category with products".to_owned(),
            ));
        }
        if children > 0 {
            return Err(RepositoryError::Conflict(
                "cannot delete category with subcategories".to_owned(),
            ));
        }

        sqlx::query("DELETE FROM shop.category WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::Conflict("category is still referenced".to_owned());
                }
                RepositoryError::Database(e)
            })?;

        tx.commit().await?;
        Ok(())
    }

    /// Number of categories, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shop.category")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
