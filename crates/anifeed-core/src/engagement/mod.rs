//! Engagement resolution across the review-bound and activity-bound tables.
//!
//! A rating activity whose `(user, item)` has a review takes its likes and
//! comments from `review_likes`/`review_comments`; every other activity uses
//! `activity_likes`/`activity_comments`, matched by activity id or by the
//! activity key for legacy rows. Writes and reads select the branch the same
//! way, at the moment they run.

#![allow(clippy::missing_errors_doc)]

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::warn;

use crate::domain::{ActivityKey, EngagementBranch};
use crate::projection::Activity;
use crate::store::sources::{adjust_review_likes, get_review};

/// Canonical engagement of one activity for one viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Engagement {
    pub likes_count: i64,
    pub comments_count: i64,
    pub user_liked: bool,
}

/// Select the engagement branch for an activity as of now.
pub fn resolve_branch(conn: &Connection, activity_id: i64, key: &ActivityKey) -> Result<EngagementBranch> {
    if let (Some(kind), Some(item_id)) = (key.activity_type.item_kind(), key.item_id) {
        if let Some(review) = get_review(conn, kind, key.user_id, item_id)? {
            return Ok(EngagementBranch::Review {
                kind,
                review_id: review.id,
            });
        }
    }
    Ok(EngagementBranch::Activity { activity_id })
}

/// Compute engagement for an activity, failing on storage errors.
pub fn try_resolve(
    conn: &Connection,
    activity_id: i64,
    key: &ActivityKey,
    viewer: Option<i64>,
) -> Result<Engagement> {
    let branch = resolve_branch(conn, activity_id, key)?;
    match branch {
        EngagementBranch::Review { kind, review_id } => {
            let likes_count: i64 = conn
                .prepare_cached(&format!(
                    "SELECT likes_count FROM {} WHERE id = ?",
                    kind.review_table()
                ))
                .and_then(|mut stmt| stmt.query_row(params![review_id], |row| row.get(0)))
                .context("Failed to read review likes_count")?;
            let comments_count: i64 = conn
                .prepare_cached(
                    "SELECT COUNT(*) FROM review_comments WHERE review_type = ? AND review_id = ?",
                )
                .and_then(|mut stmt| {
                    stmt.query_row(params![kind, review_id], |row| row.get(0))
                })
                .context("Failed to count review comments")?;
            let user_liked = match viewer {
                Some(viewer) => has_liked(conn, viewer, key, branch)?,
                None => false,
            };
            Ok(Engagement {
                likes_count,
                comments_count,
                user_liked,
            })
        }
        EngagementBranch::Activity { activity_id } => {
            let likes_count: i64 = conn
                .prepare_cached(
                    "SELECT COUNT(*) FROM activity_likes
                     WHERE activity_id = ?1
                        OR (activity_type = ?2 AND activity_user_id = ?3 AND item_id IS ?4)",
                )
                .and_then(|mut stmt| {
                    stmt.query_row(
                        params![activity_id, key.activity_type, key.user_id, key.item_id],
                        |row| row.get(0),
                    )
                })
                .context("Failed to count activity likes")?;
            let comments_count: i64 = conn
                .prepare_cached(
                    "SELECT COUNT(*) FROM activity_comments
                     WHERE parent_comment_id IS NULL
                       AND (activity_id = ?1
                            OR (activity_type = ?2 AND activity_user_id = ?3 AND item_id IS ?4))",
                )
                .and_then(|mut stmt| {
                    stmt.query_row(
                        params![activity_id, key.activity_type, key.user_id, key.item_id],
                        |row| row.get(0),
                    )
                })
                .context("Failed to count activity comments")?;
            let user_liked = match viewer {
                Some(viewer) => has_liked(conn, viewer, key, branch)?,
                None => false,
            };
            Ok(Engagement {
                likes_count,
                comments_count,
                user_liked,
            })
        }
    }
}

/// Compute engagement for an activity; storage errors degrade to zero
/// counts and `user_liked = false`.
pub fn resolve(conn: &Connection, activity: &Activity, viewer: Option<i64>) -> Engagement {
    let key = activity.key();
    try_resolve(conn, activity.id, &key, viewer).unwrap_or_else(|err| {
        warn!(activity_id = activity.id, %key, error = %format!("{err:#}"), "engagement read failed");
        Engagement::default()
    })
}

/// Resolve a page of activities in one pass.
#[must_use]
pub fn resolve_batch(conn: &Connection, activities: &[Activity], viewer: Option<i64>) -> Vec<Engagement> {
    activities
        .iter()
        .map(|activity| resolve(conn, activity, viewer))
        .collect()
}

// ============================================================================
// Likes
// ============================================================================

/// Whether `viewer` has a like on the activity in the given branch.
pub fn has_liked(
    conn: &Connection,
    viewer: i64,
    key: &ActivityKey,
    branch: EngagementBranch,
) -> Result<bool> {
    let count: i64 = match branch {
        EngagementBranch::Review { kind, review_id } => conn
            .prepare_cached(
                "SELECT COUNT(*) FROM review_likes
                 WHERE review_type = ? AND review_id = ? AND user_id = ?",
            )
            .and_then(|mut stmt| stmt.query_row(params![kind, review_id, viewer], |row| row.get(0))),
        EngagementBranch::Activity { activity_id } => conn
            .prepare_cached(
                "SELECT COUNT(*) FROM activity_likes
                 WHERE user_id = ?1
                   AND (activity_id = ?2
                        OR (activity_type = ?3 AND activity_user_id = ?4 AND item_id IS ?5))",
            )
            .and_then(|mut stmt| {
                stmt.query_row(
                    params![viewer, activity_id, key.activity_type, key.user_id, key.item_id],
                    |row| row.get(0),
                )
            }),
    }
    .context("Failed to check like")?;
    Ok(count > 0)
}

/// Record a like in the given branch. Returns false if it already existed.
pub fn insert_like(
    conn: &Connection,
    viewer: i64,
    key: &ActivityKey,
    branch: EngagementBranch,
    ts: &str,
) -> Result<bool> {
    if has_liked(conn, viewer, key, branch)? {
        return Ok(false);
    }
    match branch {
        EngagementBranch::Review { kind, review_id } => {
            conn.execute(
                "INSERT INTO review_likes (review_type, review_id, user_id, created_at)
                 VALUES (?, ?, ?, ?)",
                params![kind, review_id, viewer, ts],
            )
            .context("Failed to insert review like")?;
            adjust_review_likes(conn, kind, review_id, 1)?;
        }
        EngagementBranch::Activity { activity_id } => {
            conn.execute(
                "INSERT INTO activity_likes (
                    user_id, activity_id, activity_type, activity_user_id, item_id, created_at
                ) VALUES (?, ?, ?, ?, ?, ?)",
                params![viewer, activity_id, key.activity_type, key.user_id, key.item_id, ts],
            )
            .context("Failed to insert activity like")?;
        }
    }
    Ok(true)
}

/// Remove a like from the given branch. Returns false if there was none.
pub fn delete_like(
    conn: &Connection,
    viewer: i64,
    key: &ActivityKey,
    branch: EngagementBranch,
) -> Result<bool> {
    let deleted = match branch {
        EngagementBranch::Review { kind, review_id } => {
            let deleted = conn
                .execute(
                    "DELETE FROM review_likes WHERE review_type = ? AND review_id = ? AND user_id = ?",
                    params![kind, review_id, viewer],
                )
                .context("Failed to delete review like")?;
            if deleted > 0 {
                adjust_review_likes(conn, kind, review_id, -1)?;
            }
            deleted
        }
        EngagementBranch::Activity { activity_id } => conn
            .execute(
                "DELETE FROM activity_likes
                 WHERE user_id = ?1
                   AND (activity_id = ?2
                        OR (activity_type = ?3 AND activity_user_id = ?4 AND item_id IS ?5))",
                params![viewer, activity_id, key.activity_type, key.user_id, key.item_id],
            )
            .context("Failed to delete activity like")?,
    };
    Ok(deleted > 0)
}
