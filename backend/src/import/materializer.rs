//! Persist one product aggregate: product row, variants, sizes and images.
//!
//! Only the product row insert is fatal. Everything after it is best-effort:
//! each failed sub-resource is logged and listed in the [`MaterializeReport`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use super::category::CategoryResolver;
use crate::error::{ProductError, StoreError};
use crate::models::{NewProduct, ProductAggregate};
use crate::store::{with_timeout, CatalogStore};

/// Inventory given to every derived size row.
const DEFAULT_SIZE_INVENTORY: i64 = 0;

/// Kind of child record that failed to persist.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubResource {
    Variant,
    Price,
    Size,
    Image,
}

impl fmt::Display for SubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Variant => "variant",
            Self::Price => "price",
            Self::Size => "size",
            Self::Image => "image",
        };
        f.write_str(name)
    }
}

/// A non-fatal failure while persisting a product's children.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubResourceFailure {
    pub kind: SubResource,
    /// SKU, size value, image src or price that failed.
    pub key: String,
    pub error: String,
}

/// Outcome of a product that was created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializeReport {
    pub handle: String,
    pub product_id: i64,
    pub category_id: Option<i64>,
    /// Highest retained variant price successfully stored.
    pub price: Decimal,
    pub variants_created: usize,
    pub sizes_created: usize,
    pub images_created: usize,
    pub failures: Vec<SubResourceFailure>,
}

impl MaterializeReport {
    /// True when every child record was written.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, kind: SubResource, key: impl Into<String>, error: StoreError) {
        let key = key.into();
        warn!(handle = %self.handle, %kind, key = %key, error = %error, "sub-resource not persisted");
        self.failures.push(SubResourceFailure {
            kind,
            key,
            error: error.to_string(),
        });
    }
}

/// Turns aggregates into store rows.
pub struct ProductMaterializer {
    store: Arc<dyn CatalogStore>,
    categories: Arc<CategoryResolver>,
    timeout: Duration,
}

impl ProductMaterializer {
    pub fn new(store: Arc<dyn CatalogStore>, categories: Arc<CategoryResolver>, timeout: Duration) -> Self {
        Self {
            store,
            categories,
            timeout,
        }
    }

    /// Persist one aggregate. Fails only if the product row itself could not
    /// be inserted.
    pub async fn materialize(&self, aggregate: &ProductAggregate) -> Result<MaterializeReport, ProductError> {
        let handle = aggregate.handle.as_str();

        // 1. Category (never fatal)
        let category_id = self.categories.resolve(&aggregate.basic.product_type).await;

        // 2. Product row (fatal)
        let product = NewProduct::from_aggregate(aggregate, category_id);
        let product_id = with_timeout("insert_product", self.timeout, self.store.insert_product(&product))
            .await
            .map_err(|source| ProductError {
                handle: handle.to_string(),
                source,
            })?;

        let mut report = MaterializeReport {
            handle: handle.to_string(),
            product_id,
            category_id,
            price: product.price,
            variants_created: 0,
            sizes_created: 0,
            images_created: 0,
            failures: Vec::new(),
        };

        // 3. Variants, with max-price rollup
        for variant in &aggregate.variants {
            match with_timeout("insert_variant", self.timeout, self.store.insert_variant(product_id, variant)).await {
                Ok(_) => report.variants_created += 1,
                Err(e) => report.record(SubResource::Variant, variant.sku.clone(), e),
            }

            if variant.price > report.price {
                let update = self.store.update_product_price(product_id, variant.price);
                match with_timeout("update_product_price", self.timeout, update).await {
                    Ok(()) => report.price = variant.price,
                    Err(e) => report.record(SubResource::Price, variant.price.to_string(), e),
                }
            }
        }

        // 4. Sizes
        for size in aggregate.sizes() {
            let insert = self.store.insert_size(product_id, &size, DEFAULT_SIZE_INVENTORY);
            match with_timeout("insert_size", self.timeout, insert).await {
                Ok(_) => report.sizes_created += 1,
                Err(e) => report.record(SubResource::Size, size, e),
            }
        }

        // 5. Images
        for image in aggregate.images_by_position() {
            let insert = self.store.insert_image(product_id, &image.src, image.position);
            match with_timeout("insert_image", self.timeout, insert).await {
                Ok(_) => report.images_created += 1,
                Err(e) => report.record(SubResource::Image, image.src.clone(), e),
            }
        }

        debug!(
            handle,
            product_id,
            variants = report.variants_created,
            sizes = report.sizes_created,
            images = report.images_created,
            failures = report.failures.len(),
            "product materialized"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageRef, ProductBasic, ProductStatus, Variant};
    use crate::store::MemoryStore;

    fn variant(sku: &str, price: i64, option_name: &str, option_value: &str) -> Variant {
        Variant {
            sku: sku.into(),
            price: Decimal::from(price),
            compare_at_price: None,
            inventory_quantity: 1,
            weight: None,
            barcode: None,
            option_name: option_name.into(),
            option_value: option_value.into(),
        }
    }

    fn aggregate(handle: &str, product_type: &str) -> ProductAggregate {
        ProductAggregate::new(
            handle,
            ProductBasic {
                title: "Shoe".into(),
                product_type: product_type.into(),
                published: true,
                ..Default::default()
            },
        )
    }

    fn materializer(store: Arc<MemoryStore>) -> ProductMaterializer {
        let timeout = Duration::from_secs(1);
        let categories = Arc::new(CategoryResolver::new(store.clone(), timeout));
        ProductMaterializer::new(store, categories, timeout)
    }

    #[tokio::test]
    async fn test_price_is_max_of_variants() {
        let store = Arc::new(MemoryStore::new());
        let mut agg = aggregate("shoe", "");
        agg.variants = vec![variant("A", 10, "", ""), variant("B", 25, "", ""), variant("C", 15, "", "")];

        let report = materializer(store.clone()).materialize(&agg).await.unwrap();

        assert_eq!(report.price, Decimal::from(25));
        assert_eq!(store.product("shoe").unwrap().product.price, Decimal::from(25));
        assert_eq!(report.variants_created, 3);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_product_fields_and_category() {
        let store = Arc::new(MemoryStore::new());
        let agg = aggregate("shoe", "Footwear");

        let report = materializer(store.clone()).materialize(&agg).await.unwrap();
        let stored = store.product("shoe").unwrap().product;

        assert_eq!(stored.title, "Shoe");
        assert_eq!(stored.handle, "shoe");
        assert_eq!(stored.status, ProductStatus::Active);
        assert_eq!(stored.price, Decimal::ZERO);
        assert!(report.category_id.is_some());
        assert_eq!(stored.category_id, report.category_id);
    }

    #[tokio::test]
    async fn test_category_failure_is_not_fatal() {
        let store = Arc::new(MemoryStore::new().fail_categories());
        let agg = aggregate("shoe", "Footwear");

        let report = materializer(store.clone()).materialize(&agg).await.unwrap();

        assert_eq!(report.category_id, None);
        assert_eq!(store.product("shoe").unwrap().product.category_id, None);
    }

    #[tokio::test]
    async fn test_product_insert_failure_is_fatal() {
        let store = Arc::new(MemoryStore::new().fail_product("shoe"));
        let mut agg = aggregate("shoe", "");
        agg.variants = vec![variant("A", 10, "Size", "M")];

        let err = materializer(store.clone()).materialize(&agg).await.unwrap_err();

        assert_eq!(err.handle, "shoe");
        assert!(store.variants().is_empty());
        assert!(store.sizes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_variant_does_not_stop_the_rest() {
        let store = Arc::new(MemoryStore::new().fail_variant("B").fail_image("https://cdn/1.jpg"));
        let mut agg = aggregate("shoe", "");
        agg.variants = vec![
            variant("A", 10, "Size", "S"),
            variant("B", 30, "Size", "M"),
            variant("C", 20, "Size", "L"),
        ];
        agg.images = vec![
            ImageRef { src: "https://cdn/2.jpg".into(), position: 2 },
            ImageRef { src: "https://cdn/1.jpg".into(), position: 1 },
        ];

        let report = materializer(store.clone()).materialize(&agg).await.unwrap();

        assert_eq!(report.variants_created, 2);
        assert_eq!(report.sizes_created, 3);
        assert_eq!(report.images_created, 1);
        // Rollup is independent of the variant insert.
        assert_eq!(report.price, Decimal::from(30));

        let kinds: Vec<SubResource> = report.failures.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![SubResource::Variant, SubResource::Image]);
        assert_eq!(report.failures[0].key, "B");
    }

    #[tokio::test]
    async fn test_sizes_only_from_size_options() {
        let store = Arc::new(MemoryStore::new());
        let mut agg = aggregate("tee", "");
        agg.variants = vec![
            variant("A", 10, "Size", "M"),
            variant("B", 10, "Size", "M"),
            variant("C", 10, "Color", "Red"),
        ];

        materializer(store.clone()).materialize(&agg).await.unwrap();

        let sizes = store.sizes();
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].size, "M");
        assert_eq!(sizes[0].inventory, 0);
    }

    #[tokio::test]
    async fn test_failed_size_does_not_stop_later_sizes_or_images() {
        let store = Arc::new(MemoryStore::new().fail_size("S"));
        let mut agg = aggregate("shoe", "");
        agg.variants = vec![variant("A", 10, "Size", "S"), variant("B", 10, "Size", "M")];
        agg.images = vec![ImageRef { src: "https://cdn/shoe.jpg".into(), position: 1 }];

        let report = materializer(store.clone()).materialize(&agg).await.unwrap();

        assert_eq!(report.variants_created, 2);
        assert_eq!(report.sizes_created, 1);
        assert_eq!(report.images_created, 1);
        assert!(!report.is_complete());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, SubResource::Size);
        assert_eq!(report.failures[0].key, "S");

        let sizes: Vec<String> = store.sizes().into_iter().map(|s| s.size).collect();
        assert_eq!(sizes, vec!["M"]);
        assert_eq!(store.images().len(), 1);
    }

    #[tokio::test]
    async fn test_images_inserted_in_position_order() {
        let store = Arc::new(MemoryStore::new());
        let mut agg = aggregate("tee", "");
        agg.images = vec![
            ImageRef { src: "c.jpg".into(), position: 3 },
            ImageRef { src: "a.jpg".into(), position: 1 },
            ImageRef { src: "b.jpg".into(), position: 2 },
        ];

        let report = materializer(store.clone()).materialize(&agg).await.unwrap();

        let srcs: Vec<String> = store.images().into_iter().map(|i| i.src).collect();
        assert_eq!(srcs, vec!["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(report.images_created, 3);
    }
}
