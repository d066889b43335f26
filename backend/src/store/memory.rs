//! In-memory catalog store.
//!
//! Keeps every table in a `Vec` behind a mutex. Failures can be injected per
//! product handle, variant SKU or image src so that the isolation rules of the
//! importer can be exercised without a database.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::CatalogStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{Category, NewProduct, Variant};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredCategory {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredProduct {
    pub id: i64,
    pub product: NewProduct,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredVariant {
    pub id: i64,
    pub product_id: i64,
    pub variant: Variant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSize {
    pub id: i64,
    pub product_id: i64,
    pub size: String,
    pub inventory: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub id: i64,
    pub product_id: i64,
    pub src: String,
    pub position: u32,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    categories: Vec<StoredCategory>,
    products: Vec<StoredProduct>,
    variants: Vec<StoredVariant>,
    sizes: Vec<StoredSize>,
    images: Vec<StoredImage>,
    category_lookups: usize,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
struct Faults {
    categories: bool,
    products: HashSet<String>,
    stalled_products: HashSet<String>,
    variants: HashSet<String>,
    sizes: HashSet<String>,
    images: HashSet<String>,
}

/// Catalog store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Faults,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before every call, to let concurrent callers interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every category lookup and insert fail.
    pub fn fail_categories(mut self) -> Self {
        self.faults.categories = true;
        self
    }

    /// Reject the product row for this handle.
    pub fn fail_product(mut self, handle: impl Into<String>) -> Self {
        self.faults.products.insert(handle.into());
        self
    }

    /// Never answer the product insert for this handle.
    pub fn stall_product(mut self, handle: impl Into<String>) -> Self {
        self.faults.stalled_products.insert(handle.into());
        self
    }

    /// Reject the variant row with this SKU.
    pub fn fail_variant(mut self, sku: impl Into<String>) -> Self {
        self.faults.variants.insert(sku.into());
        self
    }

    /// Reject the size row with this value.
    pub fn fail_size(mut self, size: impl Into<String>) -> Self {
        self.faults.sizes.insert(size.into());
        self
    }

    /// Reject the image row with this src.
    pub fn fail_image(mut self, src: impl Into<String>) -> Self {
        self.faults.images.insert(src.into());
        self
    }

    pub fn categories(&self) -> Vec<StoredCategory> {
        self.lock().categories.clone()
    }

    pub fn products(&self) -> Vec<StoredProduct> {
        self.lock().products.clone()
    }

    /// Product stored under a URL handle.
    pub fn product(&self, handle: &str) -> Option<StoredProduct> {
        self.lock()
            .products
            .iter()
            .find(|p| p.product.handle == handle)
            .cloned()
    }

    pub fn variants(&self) -> Vec<StoredVariant> {
        self.lock().variants.clone()
    }

    pub fn sizes(&self) -> Vec<StoredSize> {
        self.lock().sizes.clone()
    }

    pub fn images(&self) -> Vec<StoredImage> {
        self.lock().images.clone()
    }

    /// Number of `find_category_by_name` calls served.
    pub fn category_lookups(&self) -> usize {
        self.lock().category_lookups
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn reject(what: &str, key: &str) -> StoreError {
    StoreError::Rejected(format!("{} '{}' refused by store", what, key))
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_category_by_name(&self, name: &str) -> StoreResult<Option<Category>> {
        self.delay().await;
        if self.faults.categories {
            return Err(reject("category lookup", name));
        }

        let mut tables = self.lock();
        tables.category_lookups += 1;
        Ok(tables
            .categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| Category {
                id: c.id,
                name: c.name.clone(),
            }))
    }

    async fn insert_category(&self, name: &str, description: &str) -> StoreResult<i64> {
        self.delay().await;
        if self.faults.categories {
            return Err(reject("category", name));
        }

        let mut tables = self.lock();
        if tables.categories.iter().any(|c| c.name == name) {
            return Err(StoreError::Rejected(format!("duplicate category '{}'", name)));
        }
        let id = tables.next_id();
        tables.categories.push(StoredCategory {
            id,
            name: name.to_string(),
            description: description.to_string(),
        });
        Ok(id)
    }

    async fn insert_product(&self, product: &NewProduct) -> StoreResult<i64> {
        self.delay().await;
        if self.faults.stalled_products.contains(&product.handle) {
            std::future::pending::<()>().await;
        }
        if self.faults.products.contains(&product.handle) {
            return Err(reject("product", &product.handle));
        }

        let mut tables = self.lock();
        let id = tables.next_id();
        tables.products.push(StoredProduct {
            id,
            product: product.clone(),
        });
        Ok(id)
    }

    async fn update_product_price(&self, product_id: i64, price: Decimal) -> StoreResult<()> {
        self.delay().await;
        let mut tables = self.lock();
        let stored = tables
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| StoreError::Rejected(format!("unknown product {}", product_id)))?;
        stored.product.price = price;
        Ok(())
    }

    async fn insert_variant(&self, product_id: i64, variant: &Variant) -> StoreResult<i64> {
        self.delay().await;
        if self.faults.variants.contains(&variant.sku) {
            return Err(reject("variant", &variant.sku));
        }

        let mut tables = self.lock();
        let id = tables.next_id();
        tables.variants.push(StoredVariant {
            id,
            product_id,
            variant: variant.clone(),
        });
        Ok(id)
    }

    async fn insert_size(&self, product_id: i64, size: &str, inventory: i64) -> StoreResult<i64> {
        self.delay().await;
        if self.faults.sizes.contains(size) {
            return Err(reject("size", size));
        }

        let mut tables = self.lock();
        let id = tables.next_id();
        tables.sizes.push(StoredSize {
            id,
            product_id,
            size: size.to_string(),
            inventory,
        });
        Ok(id)
    }

    async fn insert_image(&self, product_id: i64, src: &str, position: u32) -> StoreResult<i64> {
        self.delay().await;
        if self.faults.images.contains(src) {
            return Err(reject("image", src));
        }

        let mut tables = self.lock();
        let id = tables.next_id();
        tables.images.push(StoredImage {
            id,
            product_id,
            src: src.to_string(),
            position,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductStatus;

    fn product(handle: &str) -> NewProduct {
        NewProduct {
            title: handle.to_uppercase(),
            description: String::new(),
            vendor: String::new(),
            product_type: String::new(),
            tags: String::new(),
            seo_title: String::new(),
            seo_description: String::new(),
            handle: handle.to_string(),
            price: Decimal::ZERO,
            status: ProductStatus::Draft,
            category_id: None,
        }
    }

    #[tokio::test]
    async fn test_category_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.find_category_by_name("Shoes").await.unwrap().is_none());

        let id = store.insert_category("Shoes", "Imported: Shoes").await.unwrap();
        let found = store.find_category_by_name("Shoes").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(store.category_lookups(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_category_rejected() {
        let store = MemoryStore::new();
        store.insert_category("Shoes", "").await.unwrap();
        assert!(store.insert_category("Shoes", "").await.is_err());
    }

    #[tokio::test]
    async fn test_price_update() {
        let store = MemoryStore::new();
        let id = store.insert_product(&product("tee")).await.unwrap();
        store.update_product_price(id, Decimal::from(25)).await.unwrap();
        assert_eq!(store.product("tee").unwrap().product.price, Decimal::from(25));
        assert!(store.update_product_price(999, Decimal::ONE).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_product_failure() {
        let store = MemoryStore::new().fail_product("bad");
        assert!(store.insert_product(&product("bad")).await.is_err());
        assert!(store.insert_product(&product("good")).await.is_ok());
        assert_eq!(store.products().len(), 1);
    }
}
