//! Import configuration.
//!
//! Options come from explicit values (CLI flags) or from the environment,
//! with `.env` loaded first when present:
//!
//! | Variable                    | Default               |
//! |-----------------------------|-----------------------|
//! | `DATABASE_URL`              | `sqlite://catalog.db` |
//! | `IMPORT_WORKERS`            | `4`                   |
//! | `IMPORT_STORE_TIMEOUT_SECS` | `30`                  |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default number of products materialized concurrently.
pub const DEFAULT_WORKERS: usize = 4;

/// Default deadline for a single store call.
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

/// Default catalog database.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://catalog.db";

/// Options for an import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Maximum number of products materialized at the same time.
    pub workers: usize,

    /// Deadline applied to every store call.
    pub store_timeout: Duration,

    /// Catalog database location.
    pub database_url: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl ImportOptions {
    /// Read options from the process environment (after loading `.env`).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read options through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let workers = parse_positive(&lookup, "IMPORT_WORKERS").unwrap_or(defaults.workers);

        let store_timeout = parse_positive(&lookup, "IMPORT_STORE_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.store_timeout);

        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(defaults.database_url);

        Self {
            workers,
            store_timeout,
            database_url,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid configuration value");
            None
        }
    }
}

/// Like [`parse_var`], but zero is rejected too.
fn parse_positive<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + std::fmt::Display,
{
    let value: T = parse_var(lookup, key)?;
    if value > T::default() {
        Some(value)
    } else {
        warn!(key, %value, "ignoring non-positive configuration value");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_options() {
        let opts = ImportOptions::default();
        assert_eq!(opts.workers, 4);
        assert_eq!(opts.store_timeout, Duration::from_secs(30));
        assert_eq!(opts.database_url, "sqlite://catalog.db");
    }

    #[test]
    fn test_options_from_lookup() {
        let opts = ImportOptions::from_lookup(lookup(&[
            ("IMPORT_WORKERS", "8"),
            ("IMPORT_STORE_TIMEOUT_SECS", "5"),
            ("DATABASE_URL", "sqlite::memory:"),
        ]));
        assert_eq!(opts.workers, 8);
        assert_eq!(opts.store_timeout, Duration::from_secs(5));
        assert_eq!(opts.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let opts = ImportOptions::from_lookup(lookup(&[
            ("IMPORT_WORKERS", "lots"),
            ("IMPORT_STORE_TIMEOUT_SECS", "0"),
            ("DATABASE_URL", "  "),
        ]));
        assert_eq!(opts.workers, DEFAULT_WORKERS);
        assert_eq!(opts.store_timeout, Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS));
        assert_eq!(opts.database_url, DEFAULT_DATABASE_URL);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_zero_values_fall_back_with_warning() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let opts = tracing::subscriber::with_default(subscriber, || {
            ImportOptions::from_lookup(lookup(&[
                ("IMPORT_WORKERS", "0"),
                ("IMPORT_STORE_TIMEOUT_SECS", "0"),
            ]))
        });

        assert_eq!(opts.workers, DEFAULT_WORKERS);
        assert_eq!(opts.store_timeout, Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS));

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("IMPORT_WORKERS"));
        assert!(output.contains("IMPORT_STORE_TIMEOUT_SECS"));
        assert!(output.contains("non-positive"));
    }

    #[test]
    fn test_builder_clamps_workers() {
        let opts = ImportOptions::default().with_workers(0);
        assert_eq!(opts.workers, 1);
    }
}
