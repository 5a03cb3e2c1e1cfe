//! Engagement service: like, unlike, and engagement reads.

use rusqlite::Connection;

use crate::domain::{ActivityTarget, ActivityType};
use crate::engagement::{self as resolver, Engagement};
use crate::events::{Event, LikeChanged};
use crate::projection::{get_activity, get_activity_by_key, Activity};

use super::{require_user, CoreError, CoreResult, FeedServices};

/// Load the addressed activity or fail with `NotFound`.
pub(crate) fn require_activity(conn: &Connection, target: ActivityTarget) -> CoreResult<Activity> {
    match target {
        ActivityTarget::Id(id) => {
            get_activity(conn, id)?.ok_or_else(|| CoreError::not_found("activity", id))
        }
        ActivityTarget::Key(key) => {
            get_activity_by_key(conn, &key)?.ok_or_else(|| CoreError::not_found("activity", key))
        }
    }
}

/// Load an activity that can carry likes and comments.
pub(crate) fn require_engageable(conn: &Connection, target: ActivityTarget) -> CoreResult<Activity> {
    let activity = require_activity(conn, target)?;
    if activity.activity_type == ActivityType::RankPromotion {
        return Err(CoreError::invalid("rank promotions cannot be liked or commented on"));
    }
    Ok(activity)
}

/// Service for like operations.
pub struct EngagementService<'a> {
    services: &'a FeedServices,
}

impl<'a> EngagementService<'a> {
    pub(crate) const fn new(services: &'a FeedServices) -> Self {
        Self { services }
    }

    /// Like an activity. The like lands in whichever table engagement reads
    /// currently consult for it.
    #[tracing::instrument(skip(self))]
    pub fn like(&self, viewer: i64, target: ActivityTarget) -> CoreResult<Engagement> {
        self.services.write(|tx| {
            require_user(tx, viewer)?;
            let activity = require_engageable(tx, target)?;
            let key = activity.key();
            let branch = resolver::resolve_branch(tx, activity.id, &key)?;
            if resolver::has_liked(tx, viewer, &key, branch)? {
                return Err(CoreError::conflict(format!("user {viewer} already liked {key}")));
            }
            self.services.emit(
                tx,
                viewer,
                Event::Liked(LikeChanged {
                    target: key,
                    branch,
                }),
            )?;
            Ok(resolver::try_resolve(tx, activity.id, &key, Some(viewer))?)
        })
    }

    /// Remove the viewer's like. Fails with `NotFound` if there is none in
    /// the current branch.
    #[tracing::instrument(skip(self))]
    pub fn unlike(&self, viewer: i64, target: ActivityTarget) -> CoreResult<Engagement> {
        self.services.write(|tx| {
            let activity = require_engageable(tx, target)?;
            let key = activity.key();
            let branch = resolver::resolve_branch(tx, activity.id, &key)?;
            if !resolver::has_liked(tx, viewer, &key, branch)? {
                return Err(CoreError::not_found("like", format!("{viewer} on {key}")));
            }
            self.services.emit(
                tx,
                viewer,
                Event::Unliked(LikeChanged {
                    target: key,
                    branch,
                }),
            )?;
            Ok(resolver::try_resolve(tx, activity.id, &key, Some(viewer))?)
        })
    }

    /// Current engagement of an activity for `viewer`.
    pub fn get(&self, target: ActivityTarget, viewer: Option<i64>) -> CoreResult<Engagement> {
        let conn = self.services.db().conn();
        let activity = require_activity(conn, target)?;
        Ok(resolver::resolve(conn, &activity, viewer))
    }
}
