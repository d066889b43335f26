//! Catalog store abstraction.
//!
//! The importer only talks to the catalog through [`CatalogStore`]. Two
//! implementations ship with the crate:
//!
//! - [`SqliteStore`] - relational store backed by SQLite through `sqlx`
//! - [`MemoryStore`] - in-process store for tests and embedders

pub mod memory;
pub mod sqlite;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{StoreError, StoreResult};
use crate::models::{Category, NewProduct, Variant};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistence contract consumed by the importer.
///
/// Every insert returns the generated row id.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_category_by_name(&self, name: &str) -> StoreResult<Option<Category>>;

    async fn insert_category(&self, name: &str, description: &str) -> StoreResult<i64>;

    async fn insert_product(&self, product: &NewProduct) -> StoreResult<i64>;

    async fn update_product_price(&self, product_id: i64, price: Decimal) -> StoreResult<()>;

    async fn insert_variant(&self, product_id: i64, variant: &Variant) -> StoreResult<i64>;

    async fn insert_size(&self, product_id: i64, size: &str, inventory: i64) -> StoreResult<i64>;

    async fn insert_image(&self, product_id: i64, src: &str, position: u32) -> StoreResult<i64>;
}

/// Run a store call with a deadline.
pub async fn with_timeout<T, F>(operation: &'static str, after: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { operation, after }),
    }
}
