//! Runtime configuration.
//!
//! Each setting resolves in the same order: explicit value (CLI flag or
//! builder call), then environment variable, then built-in default.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

/// Environment variable naming the SQLite database file.
pub const DB_VAR: &str = "ANIFEED_DB";
/// Environment variable for the catalog cache TTL in seconds.
pub const CATALOG_TTL_VAR: &str = "ANIFEED_CATALOG_TTL_SECS";
/// Environment variable for the SQLite busy timeout in milliseconds.
pub const BUSY_TIMEOUT_VAR: &str = "ANIFEED_BUSY_TIMEOUT_MS";
/// Environment variable for the default feed page size.
pub const PAGE_SIZE_VAR: &str = "ANIFEED_PAGE_SIZE";
/// Environment variable naming the acting user (viewer) for the CLI.
pub const VIEWER_VAR: &str = "ANIFEED_USER";

const DEFAULT_DB_FILE: &str = "anifeed.db";

/// Upper bound on catalog cache staleness.
pub const MAX_CATALOG_TTL: Duration = Duration::from_secs(60);
/// Largest page a feed query may request.
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// How long catalog lookups may be served from the in-process cache.
    pub catalog_ttl: Duration,
    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout: Duration,
    /// Page size used when a feed request does not name one.
    pub default_page_size: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            catalog_ttl: MAX_CATALOG_TTL,
            busy_timeout: Duration::from_millis(5000),
            default_page_size: 20,
        }
    }
}

impl FeedConfig {
    /// Resolve configuration from an optional explicit database path and the
    /// process environment.
    pub fn from_env(explicit_db: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();

        let db_path = match explicit_db {
            Some(path) => path.to_path_buf(),
            None => non_empty_var(DB_VAR).map_or(defaults.db_path, PathBuf::from),
        };

        let catalog_ttl = match non_empty_var(CATALOG_TTL_VAR) {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .with_context(|| format!("Invalid {CATALOG_TTL_VAR}: {raw}"))?,
            ),
            None => defaults.catalog_ttl,
        };

        let busy_timeout = match non_empty_var(BUSY_TIMEOUT_VAR) {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .with_context(|| format!("Invalid {BUSY_TIMEOUT_VAR}: {raw}"))?,
            ),
            None => defaults.busy_timeout,
        };

        let default_page_size = match non_empty_var(PAGE_SIZE_VAR) {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("Invalid {PAGE_SIZE_VAR}: {raw}"))?,
            None => defaults.default_page_size,
        };

        Ok(Self {
            db_path,
            busy_timeout,
            ..defaults
        }
        .with_catalog_ttl(catalog_ttl)
        .with_default_page_size(default_page_size))
    }

    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Set the catalog TTL, clamped to `1s..=60s`.
    #[must_use]
    pub fn with_catalog_ttl(mut self, ttl: Duration) -> Self {
        self.catalog_ttl = ttl.clamp(Duration::from_secs(1), MAX_CATALOG_TTL);
        self
    }

    /// Set the default page size, clamped to `1..=500`.
    #[must_use]
    pub fn with_default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }
}

/// Resolve the acting user for a request.
///
/// Resolution order:
/// 1. Explicit override (`--as`)
/// 2. `ANIFEED_USER` environment variable
///
/// Returns `Ok(None)` for anonymous access.
pub fn resolve_viewer(explicit: Option<i64>) -> Result<Option<i64>> {
    if explicit.is_some() {
        return Ok(explicit);
    }
    non_empty_var(VIEWER_VAR)
        .map(|raw| {
            raw.parse::<i64>()
                .with_context(|| format!("Invalid {VIEWER_VAR}: {raw}"))
        })
        .transpose()
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.db_path, PathBuf::from("anifeed.db"));
        assert_eq!(config.catalog_ttl, Duration::from_secs(60));
        assert_eq!(config.default_page_size, 20);
    }

    #[test]
    fn test_ttl_is_clamped() {
        let config = FeedConfig::default().with_catalog_ttl(Duration::from_secs(600));
        assert_eq!(config.catalog_ttl, MAX_CATALOG_TTL);
        let config = config.with_catalog_ttl(Duration::ZERO);
        assert_eq!(config.catalog_ttl, Duration::from_secs(1));
    }

    #[test]
    fn test_page_size_is_clamped() {
        assert_eq!(
            FeedConfig::default()
                .with_default_page_size(10_000)
                .default_page_size,
            500
        );
        assert_eq!(
            FeedConfig::default().with_default_page_size(0).default_page_size,
            1
        );
    }

    #[test]
    fn test_explicit_db_path_wins() {
        let config = FeedConfig::from_env(Some(Path::new("/tmp/explicit.db"))).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/explicit.db"));
    }

    #[test]
    fn test_explicit_viewer() {
        assert_eq!(resolve_viewer(Some(9)).unwrap(), Some(9));
    }
}
