//! Fold flat Shopify rows into one aggregate per product handle.
//!
//! A Shopify export writes one row per variant or extra image. The first row
//! of a handle carries the product fields; later rows only add variants and
//! images.
//!
//! ```text
//! CSV Input (flat rows)                 →  Grouped Output
//! ┌─────────────────────────────────┐      ┌────────────────────────────┐
//! │ shoe-1, Shoe, SK1, Size=US 8    │      │ shoe-1  "Shoe"             │
//! │ shoe-1,     , SK2, Size=US 9    │  →   │   variants: [SK1, SK2]     │
//! │ hat-2,  Hat,  H1,  img a.jpg    │      ├────────────────────────────┤
//! └─────────────────────────────────┘      │ hat-2   "Hat"  images: [a] │
//!                                          └────────────────────────────┘
//! ```

use std::str::FromStr;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::CsvResult;
use crate::models::{ImageRef, ProductAggregate, ProductBasic, Variant};
use crate::parser::{RawRow, HANDLE_COLUMN};

/// Shopify export column names.
pub mod columns {
    pub const TITLE: &str = "Title";
    pub const BODY_HTML: &str = "Body (HTML)";
    pub const VENDOR: &str = "Vendor";
    pub const PRODUCT_TYPE: &str = "Type";
    pub const TAGS: &str = "Tags";
    pub const PUBLISHED: &str = "Published";
    pub const SEO_TITLE: &str = "SEO Title";
    pub const SEO_DESCRIPTION: &str = "SEO Description";
    pub const OPTION_NAME: &str = "Option1 Name";
    pub const OPTION_VALUE: &str = "Option1 Value";
    pub const VARIANT_SKU: &str = "Variant SKU";
    pub const VARIANT_PRICE: &str = "Variant Price";
    pub const VARIANT_COMPARE_AT_PRICE: &str = "Variant Compare At Price";
    pub const VARIANT_INVENTORY_QTY: &str = "Variant Inventory Qty";
    pub const VARIANT_GRAMS: &str = "Variant Grams";
    pub const VARIANT_BARCODE: &str = "Variant Barcode";
    pub const IMAGE_SRC: &str = "Image Src";
    pub const IMAGE_POSITION: &str = "Image Position";
}

/// Result of grouping a whole export.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedCatalog {
    /// Aggregates keyed by handle, in order of first appearance.
    pub products: IndexMap<String, ProductAggregate>,
    /// Every data row seen, including skipped ones.
    pub total_rows: usize,
    /// Rows ignored because their handle was blank.
    pub skipped_rows: usize,
}

impl GroupedCatalog {
    /// Fold one row into the catalog.
    pub fn push(&mut self, row: &RawRow) {
        self.total_rows += 1;

        let handle = row.get(HANDLE_COLUMN);
        if handle.is_empty() {
            self.skipped_rows += 1;
            return;
        }

        let aggregate = self
            .products
            .entry(handle.to_string())
            .or_insert_with(|| ProductAggregate::new(handle, basic_from_row(row)));

        let variant = variant_from_row(row);
        if variant.is_retained() {
            aggregate.variants.push(variant);
        }

        if let Some(image) = image_from_row(row, aggregate.images.len()) {
            if !aggregate.images.iter().any(|i| i.src == image.src) {
                aggregate.images.push(image);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Group a row sequence. Stops at the first parse error.
pub fn group_rows<I>(rows: I) -> CsvResult<GroupedCatalog>
where
    I: IntoIterator<Item = CsvResult<RawRow>>,
{
    rows.into_iter()
        .try_fold(GroupedCatalog::default(), |mut catalog, row| {
            catalog.push(&row?);
            Ok(catalog)
        })
}

fn basic_from_row(row: &RawRow) -> ProductBasic {
    ProductBasic {
        title: row.get(columns::TITLE).to_string(),
        body_html: row.get(columns::BODY_HTML).to_string(),
        vendor: row.get(columns::VENDOR).to_string(),
        product_type: row.get(columns::PRODUCT_TYPE).to_string(),
        tags: row.get(columns::TAGS).to_string(),
        published: row.get(columns::PUBLISHED).eq_ignore_ascii_case("true"),
        seo_title: row.get(columns::SEO_TITLE).to_string(),
        seo_description: row.get(columns::SEO_DESCRIPTION).to_string(),
    }
}

fn variant_from_row(row: &RawRow) -> Variant {
    Variant {
        sku: row.get(columns::VARIANT_SKU).to_string(),
        price: parse_decimal(row.get(columns::VARIANT_PRICE)).unwrap_or(Decimal::ZERO),
        compare_at_price: parse_decimal(row.get(columns::VARIANT_COMPARE_AT_PRICE)),
        inventory_quantity: row.get(columns::VARIANT_INVENTORY_QTY).parse().unwrap_or(0),
        weight: parse_decimal(row.get(columns::VARIANT_GRAMS)),
        barcode: non_empty(row.get(columns::VARIANT_BARCODE)),
        option_name: row.get(columns::OPTION_NAME).to_string(),
        option_value: row.get(columns::OPTION_VALUE).to_string(),
    }
}

/// `existing` is the number of images already kept for the handle; a blank
/// position becomes the next ordinal.
fn image_from_row(row: &RawRow, existing: usize) -> Option<ImageRef> {
    let src = row.get(columns::IMAGE_SRC);
    if src.is_empty() {
        return None;
    }

    let position = row
        .get(columns::IMAGE_POSITION)
        .parse()
        .unwrap_or(existing as u32 + 1);

    Some(ImageRef {
        src: src.to_string(),
        position,
    })
}

fn parse_decimal(value: &str) -> Option<Decimal> {
    if value.is_empty() {
        return None;
    }
    Decimal::from_str(value).ok()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
