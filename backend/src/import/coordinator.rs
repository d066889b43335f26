//! Drives a whole import run.
//!
//! ```text
//! Idle → Parsing → Grouping → Materializing(handle₁ … handleₙ) → Done
//! ```
//!
//! Parsing and grouping happen in one sequential pass over the file, on a
//! blocking thread when reading from disk. Products are then materialized
//! concurrently, at most `workers` at a time, in whatever order they finish,
//! so a slow product only holds its own slot. A product whose row insert
//! fails is recorded in [`ImportStats::errors`] and the run moves on; the
//! errors are put back into file order once the run is over.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use catalog_import::{Importer, ImportOptions, SqliteStore};
//!
//! let store = Arc::new(SqliteStore::connect("sqlite://catalog.db", 4).await?);
//! let stats = Importer::new(store, ImportOptions::default())
//!     .import_path("products_export.csv")
//!     .await?;
//! println!("{} products created", stats.products_created);
//! ```

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::category::CategoryResolver;
use super::materializer::ProductMaterializer;
use crate::api::logs::{log_error_indent, log_info, log_success, log_warning, log_warning_indent};
use crate::config::ImportOptions;
use crate::error::ImportResult;
use crate::models::ImportStats;
use crate::parser::RowReader;
use crate::store::CatalogStore;
use crate::transform::grouper::{group_rows, GroupedCatalog};

/// Phase of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Idle,
    Parsing,
    Grouping,
    Materializing,
    Done,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::Grouping => "grouping",
            Self::Materializing => "materializing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Imports Shopify-style CSV exports into a catalog store.
pub struct Importer {
    store: Arc<dyn CatalogStore>,
    options: ImportOptions,
    cancel: CancellationToken,
}

impl Importer {
    pub fn new(store: Arc<dyn CatalogStore>, options: ImportOptions) -> Self {
        Self {
            store,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop scheduling new products once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import a CSV file. Fails only on file or structure errors.
    pub async fn import_path<P: AsRef<Path>>(&self, path: P) -> ImportResult<ImportStats> {
        let path = path.as_ref().to_path_buf();
        log_info(format!("Importing {}", path.display()));
        let stats = ImportStats::start();
        transition(ImportPhase::Idle, ImportPhase::Parsing);

        let catalog = tokio::task::spawn_blocking(move || -> ImportResult<GroupedCatalog> {
            read_catalog(RowReader::from_path(&path)?)
        })
        .await??;

        Ok(self.materialize_all(catalog, stats).await)
    }

    /// Import CSV content from any reader (e.g. an uploaded body).
    ///
    /// The content is parsed on the calling task, so `reader` should already
    /// be in memory.
    pub async fn import_reader<R: Read>(&self, reader: R) -> ImportResult<ImportStats> {
        let stats = ImportStats::start();
        transition(ImportPhase::Idle, ImportPhase::Parsing);
        let catalog = read_catalog(RowReader::from_reader(reader)?)?;

        Ok(self.materialize_all(catalog, stats).await)
    }

    /// Materialize every grouped product and finish the statistics.
    pub async fn materialize_all(&self, catalog: GroupedCatalog, mut stats: ImportStats) -> ImportStats {
        transition(ImportPhase::Grouping, ImportPhase::Materializing);
        stats.total_rows = catalog.total_rows;

        let total_products = catalog.len();
        let workers = self.options.workers.max(1);
        let timeout = self.options.store_timeout;
        let categories = Arc::new(CategoryResolver::new(self.store.clone(), timeout));
        let materializer = ProductMaterializer::new(self.store.clone(), categories.clone(), timeout);

        log_info(format!("Materializing {} products with {} workers", total_products, workers));

        let materializer = &materializer;
        let cancel = &self.cancel;
        let mut results = stream::iter(catalog.products.into_values().enumerate())
            .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
            .map(|(index, aggregate)| async move {
                let result = materializer.materialize(&aggregate).await;
                (index, aggregate.handle, result)
            })
            .buffer_unordered(workers);

        let mut attempted = 0;
        let mut failures = Vec::new();
        while let Some((index, handle, result)) = results.next().await {
            attempted += 1;
            match result {
                Ok(report) => {
                    stats.products_created += 1;
                    stats.images_processed += report.images_created;
                    if !report.is_complete() {
                        stats.partial_failures += 1;
                        log_warning_indent(
                            format!("{}: created with {} failed sub-resources", handle, report.failures.len()),
                            1,
                        );
                    }
                    debug!(%handle, product_id = report.product_id, "product created");
                }
                Err(e) => {
                    error!(%handle, error = %e.source, "product not created");
                    log_error_indent(format!("{}: {}", handle, e.source), 1);
                    failures.push((index, handle, e.source));
                }
            }
        }

        failures.sort_by_key(|(index, _, _)| *index);
        for (_, handle, error) in failures {
            stats.record_failure(handle, error);
        }

        stats.categories_created = categories.created();
        stats.products_skipped = total_products - attempted;
        stats.cancelled = self.cancel.is_cancelled() && stats.products_skipped > 0;
        if stats.cancelled {
            log_warning(format!("Import cancelled, {} products not attempted", stats.products_skipped));
        }

        transition(ImportPhase::Materializing, ImportPhase::Done);
        stats.finish();
        log_success(stats.summary());
        stats
    }
}

/// Import a CSV file with options taken from the environment.
pub async fn import_products<P: AsRef<Path>>(path: P, store: Arc<dyn CatalogStore>) -> ImportResult<ImportStats> {
    Importer::new(store, ImportOptions::from_env()).import_path(path).await
}

/// Parse and group a whole export. Runs on a blocking thread for files.
fn read_catalog<R: Read>(reader: RowReader<R>) -> ImportResult<GroupedCatalog> {
    log_info(format!("{} columns: {}", reader.headers().len(), reader.headers().join(", ")));

    transition(ImportPhase::Parsing, ImportPhase::Grouping);
    let catalog = group_rows(reader)?;
    log_success(format!(
        "Read {} rows into {} products",
        catalog.total_rows,
        catalog.len()
    ));
    if catalog.skipped_rows > 0 {
        log_warning(format!("{} rows without a handle ignored", catalog.skipped_rows));
    }

    Ok(catalog)
}

fn transition(from: ImportPhase, to: ImportPhase) {
    info!(%from, %to, "import phase");
}
