//! Get-or-create resolution of categories by name.
//!
//! Each distinct name owns an async lock slot, so concurrent products with the
//! same category wait for the first resolution instead of racing to insert.
//! Resolved ids are cached for the rest of the run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::store::{with_timeout, CatalogStore};

type Slot = Arc<Mutex<Option<i64>>>;

/// Resolves category names to ids for one import run.
pub struct CategoryResolver {
    store: Arc<dyn CatalogStore>,
    timeout: Duration,
    slots: Mutex<HashMap<String, Slot>>,
    created: AtomicUsize,
}

impl CategoryResolver {
    pub fn new(store: Arc<dyn CatalogStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            slots: Mutex::new(HashMap::new()),
            created: AtomicUsize::new(0),
        }
    }

    /// Category id for `name`, creating the category if needed.
    ///
    /// Returns `None` for a blank name or when the store fails; the failure
    /// is logged and never propagated.
    pub async fn resolve(&self, name: &str) -> Option<i64> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(name.to_string()).or_default().clone()
        };

        let mut resolved = slot.lock().await;
        if let Some(id) = *resolved {
            return Some(id);
        }

        match self.lookup_or_create(name).await {
            Ok(id) => {
                *resolved = Some(id);
                Some(id)
            }
            Err(e) => {
                warn!(category = name, error = %e, "category resolution failed, product stays uncategorized");
                None
            }
        }
    }

    /// Number of categories inserted by this resolver.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    async fn lookup_or_create(&self, name: &str) -> StoreResult<i64> {
        if let Some(existing) = self.find(name).await? {
            debug!(category = name, id = existing, "category found");
            return Ok(existing);
        }

        let description = format!("Products of type \"{}\" imported from CSV", name);
        let inserted = with_timeout(
            "insert_category",
            self.timeout,
            self.store.insert_category(name, &description),
        )
        .await;

        match inserted {
            Ok(id) => {
                self.created.fetch_add(1, Ordering::Relaxed);
                debug!(category = name, id, "category created");
                Ok(id)
            }
            // Another writer may have created it since the lookup.
            Err(insert_err) => match self.find(name).await {
                Ok(Some(id)) => Ok(id),
                _ => Err(insert_err),
            },
        }
    }

    async fn find(&self, name: &str) -> StoreResult<Option<i64>> {
        let found = with_timeout(
            "find_category_by_name",
            self.timeout,
            self.store.find_category_by_name(name),
        )
        .await?;
        Ok(found.map(|c| c.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn resolver(store: Arc<MemoryStore>) -> CategoryResolver {
        CategoryResolver::new(store, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_blank_name_skips_lookup() {
        let store = Arc::new(MemoryStore::new());
        let categories = resolver(store.clone());

        assert_eq!(categories.resolve("").await, None);
        assert_eq!(categories.resolve("   ").await, None);
        assert_eq!(store.category_lookups(), 0);
    }

    #[tokio::test]
    async fn test_creates_once_then_caches() {
        let store = Arc::new(MemoryStore::new());
        let categories = resolver(store.clone());

        let first = categories.resolve("Footwear").await;
        let second = categories.resolve("Footwear").await;

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(categories.created(), 1);
        assert_eq!(store.category_lookups(), 1);

        let stored = store.categories();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].description.contains("Footwear"));
    }

    #[tokio::test]
    async fn test_existing_category_is_not_recreated() {
        let store = Arc::new(MemoryStore::new());
        let existing = store.insert_category("Hats", "seeded").await.unwrap();
        let categories = resolver(store.clone());

        assert_eq!(categories.resolve("Hats").await, Some(existing));
        assert_eq!(categories.created(), 0);
        assert_eq!(store.categories().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolution_creates_one_row() {
        let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(5)));
        let categories = Arc::new(resolver(store.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let categories = categories.clone();
                tokio::spawn(async move { categories.resolve("Footwear").await })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }

        assert!(ids.iter().all(|id| id.is_some() && *id == ids[0]));
        assert_eq!(store.categories().len(), 1);
        assert_eq!(categories.created(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_yields_none() {
        let store = Arc::new(MemoryStore::new().fail_categories());
        let categories = resolver(store);

        assert_eq!(categories.resolve("Footwear").await, None);
        assert_eq!(categories.created(), 0);
    }
}
