//! Service layer for anifeed-core.
//!
//! Provides typed, high-level APIs for users, catalog, ratings, reviews,
//! posts, engagement, comments, feeds, stats, notifications and recovery.
//! Every mutating verb validates its input, builds an event, and applies and
//! logs it inside one write transaction.
//!
//! # Usage
//!
//! ```no_run
//! use anifeed_core::config::FeedConfig;
//! use anifeed_core::core::FeedContext;
//! use anifeed_core::feed::FeedQuery;
//!
//! let ctx = FeedContext::new(FeedConfig::default().with_db_path("/tmp/anifeed.db"));
//! let services = ctx.open().unwrap();
//! let page = services.feed().query(&FeedQuery::default(), None).unwrap();
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod catalog;
pub mod comments;
pub mod engagement;
pub mod errors;
pub mod feed;
pub mod notifications;
pub mod recovery;
pub mod sources;
pub mod stats;
pub mod users;

pub use errors::{CoreError, CoreResult, ErrorKind};

use std::sync::Arc;

use anyhow::Context;
use rusqlite::{Connection, Transaction};

use crate::catalog::CatalogCache;
use crate::config::FeedConfig;
use crate::events::{Event, EventEnvelope};
use crate::store::users::{get_user, UserRow};
use crate::store::FeedDb;
use crate::write::commit;

/// Context for anifeed-core services.
///
/// Holds configuration and the process-wide catalog cache. Create one per
/// process and open as many [`FeedServices`] from it as there are threads.
#[derive(Debug, Clone)]
pub struct FeedContext {
    config: FeedConfig,
    catalog: Arc<CatalogCache>,
}

impl FeedContext {
    #[must_use]
    pub fn new(config: FeedConfig) -> Self {
        let catalog = Arc::new(CatalogCache::new(config.catalog_ttl));
        Self { config, catalog }
    }

    #[must_use]
    pub const fn config(&self) -> &FeedConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.catalog
    }

    /// Open the database at the configured path and apply pending migrations.
    pub fn open(&self) -> CoreResult<FeedServices> {
        let db = FeedDb::open_with(&self.config.db_path, &self.config)?;
        db.init_schema()?;
        Ok(self.services(db))
    }

    /// Services over a fresh in-memory database.
    pub fn open_in_memory(&self) -> CoreResult<FeedServices> {
        let db = FeedDb::open_in_memory()?;
        db.init_schema()?;
        Ok(self.services(db))
    }

    fn services(&self, db: FeedDb) -> FeedServices {
        FeedServices {
            config: self.config.clone(),
            catalog: Arc::clone(&self.catalog),
            db,
        }
    }
}

/// Facade providing all anifeed service APIs.
///
/// Owns one database handle and shares the catalog cache with every other
/// facade opened from the same [`FeedContext`].
pub struct FeedServices {
    config: FeedConfig,
    catalog: Arc<CatalogCache>,
    db: FeedDb,
}

impl FeedServices {
    #[must_use]
    pub fn users(&self) -> users::UserService<'_> {
        users::UserService::new(self)
    }

    #[must_use]
    pub fn catalog(&self) -> catalog::CatalogService<'_> {
        catalog::CatalogService::new(self)
    }

    #[must_use]
    pub fn ratings(&self) -> sources::RatingService<'_> {
        sources::RatingService::new(self)
    }

    #[must_use]
    pub fn reviews(&self) -> sources::ReviewService<'_> {
        sources::ReviewService::new(self)
    }

    #[must_use]
    pub fn posts(&self) -> sources::PostService<'_> {
        sources::PostService::new(self)
    }

    #[must_use]
    pub fn engagement(&self) -> engagement::EngagementService<'_> {
        engagement::EngagementService::new(self)
    }

    #[must_use]
    pub fn comments(&self) -> comments::CommentService<'_> {
        comments::CommentService::new(self)
    }

    #[must_use]
    pub fn feed(&self) -> feed::FeedService<'_> {
        feed::FeedService::new(self)
    }

    #[must_use]
    pub fn stats(&self) -> stats::StatsService<'_> {
        stats::StatsService::new(self)
    }

    #[must_use]
    pub fn notifications(&self) -> notifications::NotificationService<'_> {
        notifications::NotificationService::new(self)
    }

    #[must_use]
    pub fn recovery(&self) -> recovery::RecoveryService<'_> {
        recovery::RecoveryService::new(self)
    }

    /// Get a reference to the underlying database.
    ///
    /// Useful for advanced queries not covered by the service layer.
    #[must_use]
    pub const fn db(&self) -> &FeedDb {
        &self.db
    }

    #[must_use]
    pub const fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Run `f` in a write transaction, committing only if it succeeds.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> CoreResult<T>) -> CoreResult<T> {
        let tx = self.db.begin_write()?;
        let value = f(&tx)?;
        tx.commit().context("Failed to commit write")?;
        Ok(value)
    }

    /// Apply and log one event performed by `actor` at the current time.
    pub(crate) fn emit(&self, conn: &Connection, actor: i64, event: Event) -> CoreResult<EventEnvelope> {
        let mut envelope = EventEnvelope::new(actor, event);
        commit(conn, &self.catalog, &mut envelope)?;
        Ok(envelope)
    }
}

/// Load a user or fail with `NotFound`.
pub(crate) fn require_user(conn: &Connection, user_id: i64) -> CoreResult<UserRow> {
    get_user(conn, user_id)?.ok_or_else(|| CoreError::not_found("user", user_id))
}

/// Reject empty or whitespace-only text.
pub(crate) fn require_text(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::invalid(format!("{field} must not be empty")));
    }
    Ok(())
}
