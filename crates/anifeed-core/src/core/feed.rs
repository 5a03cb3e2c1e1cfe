//! Feed service: paged activity feeds decorated for a viewer.

use crate::feed::{self as query, FeedItem, FeedPage, FeedQuery};

use super::{CoreResult, FeedServices};

/// Service for feed reads.
pub struct FeedService<'a> {
    services: &'a FeedServices,
}

impl<'a> FeedService<'a> {
    pub(crate) const fn new(services: &'a FeedServices) -> Self {
        Self { services }
    }

    #[tracing::instrument(skip(self))]
    pub fn query(&self, request: &FeedQuery, viewer: Option<i64>) -> CoreResult<FeedPage> {
        query::query(self.services.db().conn(), request, viewer)
    }

    /// The configured default page of the global feed.
    pub fn latest(&self, viewer: Option<i64>) -> CoreResult<FeedPage> {
        let limit = i64::from(self.services.config().default_page_size);
        self.query(&FeedQuery::default().page(limit, 0), viewer)
    }

    pub fn get(&self, activity_id: i64, viewer: Option<i64>) -> CoreResult<FeedItem> {
        query::get_item(self.services.db().conn(), activity_id, viewer)
    }
}
