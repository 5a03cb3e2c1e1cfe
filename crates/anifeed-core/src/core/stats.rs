//! Stats service.

use chrono::Utc;
use serde::Serialize;

use crate::stats::{get_stats, rank_for, RankInfo, UserStats};
use crate::store::fmt_ts;

use super::{require_user, CoreResult, FeedServices};

/// Stored stats with the rank derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsView {
    #[serde(flatten)]
    pub stats: UserStats,
    pub rank: RankInfo,
}

/// Service for stats reads.
pub struct StatsService<'a> {
    services: &'a FeedServices,
}

impl<'a> StatsService<'a> {
    pub(crate) const fn new(services: &'a FeedServices) -> Self {
        Self { services }
    }

    /// Stats for a user; zeroed if none have been computed yet.
    pub fn get(&self, user_id: i64) -> CoreResult<StatsView> {
        let conn = self.services.db().conn();
        require_user(conn, user_id)?;
        let stats = get_stats(conn, user_id)?
            .unwrap_or_else(|| UserStats::empty(user_id, &fmt_ts(&Utc::now())));
        Ok(StatsView {
            rank: rank_for(stats.otaku_score),
            stats,
        })
    }
}
