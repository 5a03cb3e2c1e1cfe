//! Notification service: list and acknowledge a viewer's notifications.

use chrono::Utc;

use crate::config::MAX_PAGE_SIZE;
use crate::notifications::{self as query, Notification};
use crate::store::fmt_ts;
use crate::store::users::set_notification_check;

use super::{require_user, CoreError, CoreResult, FeedServices};

/// Service for notification operations.
pub struct NotificationService<'a> {
    services: &'a FeedServices,
}

impl<'a> NotificationService<'a> {
    pub(crate) const fn new(services: &'a FeedServices) -> Self {
        Self { services }
    }

    /// Newest notifications for `viewer`, at most `limit`.
    pub fn list(&self, viewer: i64, limit: i64) -> CoreResult<Vec<Notification>> {
        if !(1..=i64::from(MAX_PAGE_SIZE)).contains(&limit) {
            return Err(CoreError::invalid(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
            )));
        }
        let conn = self.services.db().conn();
        require_user(conn, viewer)?;
        Ok(query::list(conn, viewer, limit)?)
    }

    pub fn unread_count(&self, viewer: i64) -> CoreResult<i64> {
        let conn = self.services.db().conn();
        require_user(conn, viewer)?;
        Ok(query::unread_count(conn, viewer)?)
    }

    /// Mark everything up to now as seen.
    #[tracing::instrument(skip(self))]
    pub fn mark_checked(&self, viewer: i64) -> CoreResult<String> {
        let ts = fmt_ts(&Utc::now());
        self.services.write(|tx| {
            require_user(tx, viewer)?;
            set_notification_check(tx, viewer, &ts)?;
            Ok(())
        })?;
        Ok(ts)
    }
}
