//! Seed the database with demo categories, users and products.
//!
//! The YAML is parsed and checked before connecting. Each table is only
//! seeded when it is empty, so re-running against a populated database
//! changes nothing. Products name their category by slug and their seller
//! by email; both are looked up in the database at insert time.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};

use tradewind_api::db::categories::NewCategory;
use tradewind_api::db::products::NewProduct;
use tradewind_api::db::users::NewUser;
use tradewind_api::db::{CategoryRepository, ProductRepository, UserRepository};
use tradewind_api::services::auth::{hash_password, validate_password};
use tradewind_core::{Email, ProductStatus, Slug, UserRole};

use super::{CliError, connect};

const DEMO_SEED: &str = include_str!("../../seed/demo.yaml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeedCategory {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeedUser {
    pub email: Email,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: UserRole,
}

const fn active() -> ProductStatus {
    ProductStatus::Active
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeedProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    pub inventory: i32,
    #[serde(default = "active")]
    pub status: ProductStatus,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub weight: Option<Decimal>,
    /// Category slug.
    pub category: Slug,
    /// Seller email.
    pub seller: Email,
}

/// Rows inserted per table.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub users: usize,
    pub products: usize,
}

/// Parse seed YAML.
///
/// # Errors
///
/// Returns `CliError::SeedYaml` for malformed YAML or invalid emails/slugs.
pub fn parse(yaml: &str) -> Result<SeedFile, CliError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Check the file for problems the database would reject halfway through.
#[must_use]
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();

    let mut slugs = HashSet::new();
    for category in &seed.categories {
        if category.name.trim().is_empty() {
            errors.push(format!("category {}: name is empty", category.slug));
        }
        if category.sort_order < 0 {
            errors.push(format!("category {}: sortOrder is negative", category.slug));
        }
        if !slugs.insert(category.slug.as_str()) {
            errors.push(format!("category {}: duplicate slug", category.slug));
        }
    }

    let mut emails = HashSet::new();
    for user in &seed.users {
        if !emails.insert(user.email.as_str()) {
            errors.push(format!("user {}: duplicate email", user.email));
        }
        if let Err(e) = validate_password(&user.password) {
            errors.push(format!("user {}: {e}", user.email));
        }
    }

    let mut skus = HashSet::new();
    for product in &seed.products {
        if product.price <= Decimal::ZERO {
            errors.push(format!("product {}: price must be positive", product.name));
        }
        if product.compare_at_price.is_some_and(|p| p <= Decimal::ZERO) {
            errors.push(format!(
                "product {}: compareAtPrice must be positive",
                product.name
            ));
        }
        if product.inventory < 0 {
            errors.push(format!("product {}: inventory is negative", product.name));
        }
        if let Some(sku) = &product.sku
            && !skus.insert(sku.as_str())
        {
            errors.push(format!("product {}: duplicate sku {sku}", product.name));
        }
    }

    errors
}

/// Seed from `file`, or from the bundled demo data.
///
/// # Errors
///
/// Returns `CliError` if the file can't be read or fails validation, or if
/// a database operation fails.
pub async fn run(file: Option<&str>) -> Result<(), CliError> {
    let yaml = match file {
        Some(path) => {
            info!(path = %path, "Loading seed data from file");
            tokio::fs::read_to_string(Path::new(path))
                .await
                .map_err(|e| CliError::SeedFile(path.to_owned(), e))?
        }
        None => {
            info!("Loading bundled demo seed data");
            DEMO_SEED.to_owned()
        }
    };

    let seed = parse(&yaml)?;
    let errors = validate(&seed);
    if !errors.is_empty() {
        return Err(CliError::SeedInvalid(errors));
    }

    let pool = connect().await?;
    let summary = seed_all(&pool, &seed).await?;

    info!("Seeding complete!");
    info!("  Categories inserted: {}", summary.categories);
    info!("  Users inserted: {}", summary.users);
    info!("  Products inserted: {}", summary.products);
    Ok(())
}

/// Insert everything in dependency order.
///
/// # Errors
///
/// Returns `CliError` if a database operation fails.
pub async fn seed_all(pool: &PgPool, seed: &SeedFile) -> Result<SeedSummary, CliError> {
    Ok(SeedSummary {
        categories: seed_categories(pool, &seed.categories).await?,
        users: seed_users(pool, &seed.users).await?,
        products: seed_products(pool, &seed.products).await?,
    })
}

async fn seed_categories(pool: &PgPool, categories: &[SeedCategory]) -> Result<usize, CliError> {
    let repo = CategoryRepository::new(pool);
    if repo.count().await? > 0 {
        info!("Categories already exist, skipping");
        return Ok(0);
    }

    for category in categories {
        repo.create(&NewCategory {
            name: category.name.clone(),
            slug: category.slug.clone(),
            description: category.description.clone(),
            image: None,
            parent_id: None,
            is_active: true,
            sort_order: category.sort_order,
        })
        .await?;
    }
    Ok(categories.len())
}

async fn seed_users(pool: &PgPool, users: &[SeedUser]) -> Result<usize, CliError> {
    let repo = UserRepository::new(pool);
    if repo.count().await? > 0 {
        info!("Users already exist, skipping");
        return Ok(0);
    }

    for user in users {
        let password_hash =
            hash_password(&user.password).map_err(|e| CliError::InvalidPassword(e.to_string()))?;
        let created = repo
            .create_with_password(
                &NewUser {
                    email: user.email.clone(),
                    first_name: user.first_name.clone(),
                    last_name: user.last_name.clone(),
                    role: user.role,
                },
                &password_hash,
            )
            .await?;
        repo.verify_email(created.id).await?;
    }
    Ok(users.len())
}

async fn seed_products(pool: &PgPool, products: &[SeedProduct]) -> Result<usize, CliError> {
    let repo = ProductRepository::new(pool);
    if repo.count().await? > 0 {
        info!("Products already exist, skipping");
        return Ok(0);
    }

    let categories = CategoryRepository::new(pool);
    let users = UserRepository::new(pool);
    let mut inserted = 0;

    for product in products {
        let Some(category) = categories.get_by_slug(&product.category).await? else {
            warn!(product = %product.name, category = %product.category, "Unknown category, skipping product");
            continue;
        };
        let seller = match users.get_by_email(&product.seller).await? {
            Some(seller) if seller.role.is_staff() => seller,
            _ => {
                warn!(product = %product.name, seller = %product.seller, "Seller missing or not a seller, skipping product");
                continue;
            }
        };

        repo.create(&NewProduct {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            compare_at_price: product.compare_at_price,
            sku: product.sku.clone(),
            inventory: product.inventory,
            status: product.status,
            images: product.images.clone(),
            tags: product.tags.clone(),
            weight: product.weight,
            dimensions: None,
            category_id: category.id,
            seller_id: seller.id,
        })
        .await?;
        inserted += 1;
    }
    Ok(inserted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_seed_is_valid() {
        let seed = parse(DEMO_SEED).unwrap();
        assert_eq!(seed.categories.len(), 5);
        assert_eq!(seed.users.len(), 3);
        assert_eq!(seed.products.len(), 5);
        assert!(validate(&seed).is_empty());

        let iphone = seed.products.first().unwrap();
        assert_eq!(iphone.price, Decimal::new(99_999, 2));
        assert_eq!(iphone.inventory, 50);
        assert_eq!(iphone.status, ProductStatus::Active);
    }

    #[test]
    fn test_demo_products_reference_demo_rows() {
        let seed = parse(DEMO_SEED).unwrap();
        for product in &seed.products {
            assert!(seed.categories.iter().any(|c| c.slug == product.category));
            assert!(
                seed.users
                    .iter()
                    .any(|u| u.email == product.seller && u.role == UserRole::Seller)
            );
        }
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let seed = parse(
            r#"
categories:
  - { name: A, slug: dup }
  - { name: B, slug: dup }
users:
  - { email: a@example.com, password: short, firstName: A, lastName: B }
products:
  - { name: Free, description: x, price: "0", inventory: -1, category: dup, seller: a@example.com }
"#,
        )
        .unwrap();

        let errors = validate(&seed);
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("duplicate slug")));
        assert!(errors.iter().any(|e| e.contains("price must be positive")));
    }

    #[test]
    fn test_parse_rejects_bad_email() {
        assert!(parse("users:\n  - { email: nope, password: x, firstName: a, lastName: b }").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        assert!(parse("categories:\n  - { name: A, slug: a, colour: red }").is_err());
    }
}
