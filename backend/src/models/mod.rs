//! Domain models for the catalog import pipeline.
//!
//! - [`ProductAggregate`] - one product grouped from all its CSV rows
//! - [`ProductBasic`] - product-level fields captured from the first row
//! - [`Variant`] - a purchasable variant (SKU, price, option)
//! - [`ImageRef`] - an image URL with its display position
//! - [`NewProduct`] - the product row handed to the store
//! - [`ImportStats`] - running statistics of one import run

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Product Aggregate
// =============================================================================

/// Product-level fields, seeded once from the first row of a handle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductBasic {
    pub title: String,
    pub body_html: String,
    pub vendor: String,
    pub product_type: String,
    pub tags: String,
    pub published: bool,
    pub seo_title: String,
    pub seo_description: String,
}

/// A product variant as read from one CSV row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub sku: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<Decimal>,
    pub inventory_quantity: i64,
    /// Weight in grams.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    pub option_name: String,
    pub option_value: String,
}

impl Variant {
    /// A variant is kept only if it has a SKU or a positive price.
    pub fn is_retained(&self) -> bool {
        !self.sku.is_empty() || self.price > Decimal::ZERO
    }

    /// Whether this variant's option describes a size.
    ///
    /// Substring match, so "Size Guide" counts as well.
    pub fn is_size_option(&self) -> bool {
        self.option_name.to_lowercase().contains("size")
    }
}

/// An image URL attached to a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRef {
    pub src: String,
    pub position: u32,
}

/// All rows of one handle folded into a single product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductAggregate {
    pub handle: String,
    pub basic: ProductBasic,
    pub variants: Vec<Variant>,
    pub images: Vec<ImageRef>,
}

impl ProductAggregate {
    pub fn new(handle: impl Into<String>, basic: ProductBasic) -> Self {
        Self {
            handle: handle.into(),
            basic,
            variants: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Distinct size values from retained variants, in first-seen order.
    pub fn sizes(&self) -> Vec<String> {
        let mut sizes: Vec<String> = Vec::new();
        for variant in self.variants.iter().filter(|v| v.is_size_option()) {
            if variant.option_value.is_empty() || sizes.contains(&variant.option_value) {
                continue;
            }
            sizes.push(variant.option_value.clone());
        }
        sizes
    }

    /// Images sorted by position. Ties keep their grouping order.
    pub fn images_by_position(&self) -> Vec<&ImageRef> {
        let mut images: Vec<&ImageRef> = self.images.iter().collect();
        images.sort_by_key(|img| img.position);
        images
    }
}

// =============================================================================
// Persisted Records
// =============================================================================

/// Publication status of a product.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Draft,
}

impl ProductStatus {
    pub fn from_published(published: bool) -> Self {
        if published {
            Self::Active
        } else {
            Self::Draft
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draft => "draft",
        }
    }
}

/// A catalog category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Fields of a product row about to be inserted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub vendor: String,
    pub product_type: String,
    pub tags: String,
    pub seo_title: String,
    pub seo_description: String,
    /// URL handle, identical to the CSV handle.
    pub handle: String,
    pub price: Decimal,
    pub status: ProductStatus,
    pub category_id: Option<i64>,
}

impl NewProduct {
    /// Seed a product row from an aggregate. Price starts at zero and is
    /// raised later by the variant rollup.
    pub fn from_aggregate(aggregate: &ProductAggregate, category_id: Option<i64>) -> Self {
        let basic = &aggregate.basic;
        let title = if basic.title.is_empty() {
            aggregate.handle.clone()
        } else {
            basic.title.clone()
        };

        Self {
            title,
            description: basic.body_html.clone(),
            vendor: basic.vendor.clone(),
            product_type: basic.product_type.clone(),
            tags: basic.tags.clone(),
            seo_title: basic.seo_title.clone(),
            seo_description: basic.seo_description.clone(),
            handle: aggregate.handle.clone(),
            price: Decimal::ZERO,
            status: ProductStatus::from_published(basic.published),
            category_id,
        }
    }
}

// =============================================================================
// Import Statistics
// =============================================================================

/// A product that could not be created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportFailure {
    /// Handle of the failed product.
    pub product: String,
    pub error: String,
}

/// Statistics of one import run, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub run_id: Uuid,
    pub total_rows: usize,
    pub products_created: usize,
    pub categories_created: usize,
    pub images_processed: usize,
    /// Products created with at least one failed variant, size or image.
    pub partial_failures: usize,
    /// Handles never attempted because the run was cancelled.
    pub products_skipped: usize,
    pub cancelled: bool,
    pub errors: Vec<ImportFailure>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ImportStats {
    /// Fresh statistics stamped with the current time.
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            total_rows: 0,
            products_created: 0,
            categories_created: 0,
            images_processed: 0,
            partial_failures: 0,
            products_skipped: 0,
            cancelled: false,
            errors: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
        }
    }

    pub fn record_failure(&mut self, product: impl Into<String>, error: impl ToString) {
        self.errors.push(ImportFailure {
            product: product.into(),
            error: error.to_string(),
        });
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} rows, {} products created, {} categories created, {} images, {} errors",
            self.total_rows,
            self.products_created,
            self.categories_created,
            self.images_processed,
            self.errors.len()
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
