//! Import pipeline: category resolution, product materialization and the
//! coordinator that runs them over a grouped catalog.

pub mod category;
pub mod coordinator;
pub mod materializer;

pub use category::CategoryResolver;
pub use coordinator::{import_products, ImportPhase, Importer};
pub use materializer::{MaterializeReport, ProductMaterializer, SubResource, SubResourceFailure};
