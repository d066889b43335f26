//! REST API types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::ImportStats;

/// Response sent after an uploaded CSV has been imported.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    /// "completed", "partial" or "cancelled"
    pub status: String,

    /// Statistics of the run
    pub stats: ImportStats,
}

impl From<ImportStats> for ImportResponse {
    fn from(stats: ImportStats) -> Self {
        let status = if stats.cancelled {
            "cancelled"
        } else if stats.errors.is_empty() && stats.partial_failures == 0 {
            "completed"
        } else {
            "partial"
        };

        Self {
            status: status.to_string(),
            stats,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
        "stats": null
    })
}
