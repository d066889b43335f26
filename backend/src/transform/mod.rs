//! Transformation module.
//!
//! - Grouper: flat CSV rows to one aggregate per product handle

pub mod grouper;

pub use grouper::{group_rows, GroupedCatalog};
