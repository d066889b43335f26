//! # Catalog Import - bulk product import from Shopify-style CSV exports
//!
//! Each row of an export is either a new product or an extra variant/image of
//! a product already seen. Rows are grouped by handle, then every product is
//! written to a relational catalog (categories, products, variants, sizes,
//! images).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│ Row Parser  │────▶│   Grouper   │────▶│  Importer   │
//! │  (Shopify)  │     │ (streaming) │     │ (by handle) │     │ (N workers) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                   ▼
//!                                                            CatalogStore
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use catalog_import::{import_products, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(SqliteStore::connect("sqlite://catalog.db", 4).await.unwrap());
//!     let stats = import_products("products_export.csv", store).await.unwrap();
//!     println!("Created {} products, {} errors", stats.products_created, stats.errors.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Import options from CLI flags or environment
//! - [`models`] - Domain models (ProductAggregate, Variant, ImportStats)
//! - [`parser`] - Streaming CSV row reader
//! - [`transform`] - Grouping of rows by handle
//! - [`store`] - Catalog store trait, SQLite and in-memory backends
//! - [`import`] - Category resolution, materialization, coordination
//! - [`api`] - HTTP API server and progress log

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Grouping
pub mod transform;

// Persistence
pub mod store;

// Import pipeline
pub mod import;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{CsvError, ImportError, ProductError, StoreError};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::ImportOptions;

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Category,
    ImageRef,
    ImportFailure,
    ImportStats,
    NewProduct,
    ProductAggregate,
    ProductBasic,
    ProductStatus,
    Variant,
};

// =============================================================================
// Re-exports - Parsing and grouping
// =============================================================================

pub use parser::{RawRow, RowReader};
pub use transform::{group_rows, GroupedCatalog};

// =============================================================================
// Re-exports - Store
// =============================================================================

pub use store::{CatalogStore, MemoryStore, SqliteStore};

// =============================================================================
// Re-exports - Import
// =============================================================================

pub use import::{
    import_products,
    CategoryResolver,
    ImportPhase,
    Importer,
    MaterializeReport,
    ProductMaterializer,
    SubResource,
    SubResourceFailure,
};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
