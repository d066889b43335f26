//! SQLite catalog store.
//!
//! The schema is created on connect. Category names are UNIQUE so a second
//! import against the same database resolves existing categories instead of
//! creating new ones. Prices are stored as decimal strings.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use super::CatalogStore;
use crate::error::StoreResult;
use crate::models::{Category, NewProduct, Variant};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        vendor TEXT NOT NULL DEFAULT '',
        product_type TEXT NOT NULL DEFAULT '',
        tags TEXT NOT NULL DEFAULT '',
        seo_title TEXT NOT NULL DEFAULT '',
        seo_description TEXT NOT NULL DEFAULT '',
        handle TEXT NOT NULL,
        price TEXT NOT NULL DEFAULT '0',
        status TEXT NOT NULL,
        category_id INTEGER REFERENCES categories(id),
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS product_variants (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL REFERENCES products(id),
        sku TEXT NOT NULL DEFAULT '',
        price TEXT NOT NULL,
        compare_at_price TEXT,
        inventory_quantity INTEGER NOT NULL DEFAULT 0,
        weight TEXT,
        barcode TEXT,
        option_name TEXT NOT NULL DEFAULT '',
        option_value TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS product_sizes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL REFERENCES products(id),
        size TEXT NOT NULL,
        inventory INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS product_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL REFERENCES products(id),
        src TEXT NOT NULL,
        position INTEGER NOT NULL
    )",
];

/// Catalog store backed by a SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database and make sure the schema exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(max_connections, "catalog database ready");
        Ok(store)
    }

    /// Private in-memory database on a single connection.
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true))
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        debug!("catalog schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Current list price of a product.
    pub async fn product_price(&self, product_id: i64) -> StoreResult<Option<Decimal>> {
        let price: Option<String> = sqlx::query_scalar("SELECT price FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(price.and_then(|p| Decimal::from_str(&p).ok()))
    }

    /// Row count of one of the catalog tables.
    pub async fn count(&self, table: CatalogTable) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

/// Tables created by [`SqliteStore`].
#[derive(Debug, Clone, Copy)]
pub enum CatalogTable {
    Categories,
    Products,
    Variants,
    Sizes,
    Images,
}

impl CatalogTable {
    fn name(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Products => "products",
            Self::Variants => "product_variants",
            Self::Sizes => "product_sizes",
            Self::Images => "product_images",
        }
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn find_category_by_name(&self, name: &str) -> StoreResult<Option<Category>> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Category {
            id: r.get("id"),
            name: r.get("name"),
        }))
    }

    async fn insert_category(&self, name: &str, description: &str) -> StoreResult<i64> {
        let result = sqlx::query("INSERT INTO categories (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn insert_product(&self, product: &NewProduct) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO products
                (title, description, vendor, product_type, tags, seo_title, seo_description,
                 handle, price, status, category_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.title)
        .bind(&product.description)
        .bind(&product.vendor)
        .bind(&product.product_type)
        .bind(&product.tags)
        .bind(&product.seo_title)
        .bind(&product.seo_description)
        .bind(&product.handle)
        .bind(product.price.to_string())
        .bind(product.status.as_str())
        .bind(product.category_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_product_price(&self, product_id: i64, price: Decimal) -> StoreResult<()> {
        sqlx::query("UPDATE products SET price = ? WHERE id = ?")
            .bind(price.to_string())
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_variant(&self, product_id: i64, variant: &Variant) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO product_variants
                (product_id, sku, price, compare_at_price, inventory_quantity, weight, barcode,
                 option_name, option_value)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(product_id)
        .bind(&variant.sku)
        .bind(variant.price.to_string())
        .bind(variant.compare_at_price.map(|p| p.to_string()))
        .bind(variant.inventory_quantity)
        .bind(variant.weight.map(|w| w.to_string()))
        .bind(variant.barcode.as_deref())
        .bind(&variant.option_name)
        .bind(&variant.option_value)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn insert_size(&self, product_id: i64, size: &str, inventory: i64) -> StoreResult<i64> {
        let result = sqlx::query("INSERT INTO product_sizes (product_id, size, inventory) VALUES (?, ?, ?)")
            .bind(product_id)
            .bind(size)
            .bind(inventory)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn insert_image(&self, product_id: i64, src: &str, position: u32) -> StoreResult<i64> {
        let result = sqlx::query("INSERT INTO product_images (product_id, src, position) VALUES (?, ?, ?)")
            .bind(product_id)
            .bind(src)
            .bind(position)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductStatus;

    fn product(handle: &str, category_id: Option<i64>) -> NewProduct {
        NewProduct {
            title: "Shoe".into(),
            description: "<p>Comfy</p>".into(),
            vendor: "Acme".into(),
            product_type: "Footwear".into(),
            tags: "summer, sale".into(),
            seo_title: String::new(),
            seo_description: String::new(),
            handle: handle.into(),
            price: Decimal::ZERO,
            status: ProductStatus::Active,
            category_id,
        }
    }

    #[tokio::test]
    async fn test_category_lookup_and_unique_name() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.find_category_by_name("Footwear").await.unwrap().is_none());

        let id = store.insert_category("Footwear", "Imported: Footwear").await.unwrap();
        let found = store.find_category_by_name("Footwear").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.name, "Footwear");

        assert!(store.insert_category("Footwear", "again").await.is_err());
    }

    #[tokio::test]
    async fn test_product_children_and_price_update() {
        let store = SqliteStore::in_memory().await.unwrap();
        let category = store.insert_category("Footwear", "").await.unwrap();
        let product_id = store.insert_product(&product("shoe-1", Some(category))).await.unwrap();

        let variant = Variant {
            sku: "SK1".into(),
            price: Decimal::from_str("49.90").unwrap(),
            compare_at_price: None,
            inventory_quantity: 3,
            weight: Some(Decimal::from(800)),
            barcode: None,
            option_name: "Size".into(),
            option_value: "US 8".into(),
        };
        store.insert_variant(product_id, &variant).await.unwrap();
        store.insert_size(product_id, "US 8", 0).await.unwrap();
        store.insert_image(product_id, "https://cdn/shoe.jpg", 1).await.unwrap();
        store.update_product_price(product_id, variant.price).await.unwrap();

        assert_eq!(store.count(CatalogTable::Products).await.unwrap(), 1);
        assert_eq!(store.count(CatalogTable::Variants).await.unwrap(), 1);
        assert_eq!(store.count(CatalogTable::Sizes).await.unwrap(), 1);
        assert_eq!(store.count(CatalogTable::Images).await.unwrap(), 1);
        assert_eq!(
            store.product_price(product_id).await.unwrap(),
            Some(Decimal::from_str("49.90").unwrap())
        );
    }

    #[tokio::test]
    async fn test_unknown_category_reference_fails() {
        let store = SqliteStore::in_memory().await.unwrap();
        let result = store.insert_product(&product("orphan", Some(42))).await;
        assert!(result.is_err());
    }
}
