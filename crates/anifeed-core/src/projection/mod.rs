//! The `activities` projection.
//!
//! Activity rows are a function of the source tables. The `project_*`
//! functions are pure: given a snapshot of the relevant source rows, author
//! and catalog card they return an [`ActivityCommand`]. [`execute`] applies a
//! command to the store. Applying the same command twice leaves the table in
//! the same state.

#![allow(clippy::missing_errors_doc)]

pub mod primary;

use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogCache, ItemCard};
use crate::core::{CoreError, CoreResult};
use crate::domain::{ActivityKey, ActivityType, ItemKind};
use crate::store::sources::{self, PostRow, RatingRow, ReviewRow};
use crate::store::users::{author_snapshot, AuthorSnapshot};

// ============================================================================
// Types
// ============================================================================

/// Payload of a rank promotion activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionMetadata {
    pub old_level: i64,
    pub new_level: i64,
    pub otaku_score: i64,
}

/// A stored activity row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub id: i64,
    pub activity_type: ActivityType,
    pub user_id: i64,
    pub item_id: Option<i64>,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub otaku_score: i64,
    pub item_title: Option<String>,
    pub item_title_korean: Option<String>,
    pub item_image: Option<String>,
    pub rating: Option<f64>,
    pub review_title: Option<String>,
    pub review_content: Option<String>,
    pub is_spoiler: Option<bool>,
    pub anime_id: Option<i64>,
    pub anime_title: Option<String>,
    pub promotion_threshold: Option<i64>,
    pub metadata: Option<PromotionMetadata>,
    pub activity_time: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Column list matching [`Activity::from_row`], for a query aliasing
/// `activities` as `a`.
pub const ACTIVITY_COLUMNS: &str = "a.id, a.activity_type, a.user_id, a.item_id, a.username,
     a.display_name, a.avatar_url, a.otaku_score, a.item_title, a.item_title_korean,
     a.item_image, a.rating, a.review_title, a.review_content, a.is_spoiler, a.anime_id,
     a.anime_title, a.promotion_threshold, a.metadata, a.activity_time, a.created_at,
     a.updated_at";

/// Number of columns in [`ACTIVITY_COLUMNS`].
pub const ACTIVITY_COLUMN_COUNT: usize = 22;

impl Activity {
    #[must_use]
    pub const fn key(&self) -> ActivityKey {
        ActivityKey::new(self.activity_type, self.user_id, self.item_id)
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let metadata: Option<String> = row.get(18)?;
        let metadata = metadata
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(18, Type::Text, Box::new(e)))?;

        Ok(Self {
            id: row.get(0)?,
            activity_type: row.get(1)?,
            user_id: row.get(2)?,
            item_id: row.get(3)?,
            username: row.get(4)?,
            display_name: row.get(5)?,
            avatar_url: row.get(6)?,
            otaku_score: row.get(7)?,
            item_title: row.get(8)?,
            item_title_korean: row.get(9)?,
            item_image: row.get(10)?,
            rating: row.get(11)?,
            review_title: row.get(12)?,
            review_content: row.get(13)?,
            is_spoiler: row.get(14)?,
            anime_id: row.get(15)?,
            anime_title: row.get(16)?,
            promotion_threshold: row.get(17)?,
            metadata,
            activity_time: row.get(19)?,
            created_at: row.get(20)?,
            updated_at: row.get(21)?,
        })
    }
}

/// Everything an activity row carries apart from its id and bookkeeping
/// timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDraft {
    pub key: ActivityKey,
    pub author: AuthorSnapshot,
    pub item_title: Option<String>,
    pub item_title_korean: Option<String>,
    pub item_image: Option<String>,
    pub rating: Option<f64>,
    pub review_title: Option<String>,
    pub review_content: Option<String>,
    pub is_spoiler: Option<bool>,
    pub anime_id: Option<i64>,
    pub anime_title: Option<String>,
    pub promotion_threshold: Option<i64>,
    pub metadata: Option<PromotionMetadata>,
    pub activity_time: String,
}

impl ActivityDraft {
    fn empty(key: ActivityKey, author: &AuthorSnapshot, activity_time: &str) -> Self {
        Self {
            key,
            author: author.clone(),
            item_title: None,
            item_title_korean: None,
            item_image: None,
            rating: None,
            review_title: None,
            review_content: None,
            is_spoiler: None,
            anime_id: None,
            anime_title: None,
            promotion_threshold: None,
            metadata: None,
            activity_time: activity_time.to_string(),
        }
    }

    /// Whether `row` already holds exactly this content.
    #[must_use]
    pub fn matches(&self, row: &Activity) -> bool {
        row.key() == self.key
            && row.username == self.author.username
            && row.display_name == self.author.display_name
            && row.avatar_url == self.author.avatar_url
            && row.otaku_score == self.author.otaku_score
            && row.item_title == self.item_title
            && row.item_title_korean == self.item_title_korean
            && row.item_image == self.item_image
            && row.rating == self.rating
            && row.review_title == self.review_title
            && row.review_content == self.review_content
            && row.is_spoiler == self.is_spoiler
            && row.anime_id == self.anime_id
            && row.anime_title == self.anime_title
            && row.promotion_threshold == self.promotion_threshold
            && row.metadata == self.metadata
            && row.activity_time == self.activity_time
    }
}

/// A change to the `activities` table.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityCommand {
    /// Insert or overwrite the row with this key
    Upsert(Box<ActivityDraft>),
    /// Remove the row with this key and its activity-bound likes and comments
    Delete(ActivityKey),
    /// Rewrite author fields on every activity of a user
    RefreshAuthor {
        user_id: i64,
        author: AuthorSnapshot,
    },
    /// Insert a rank promotion unless one exists for the same threshold
    InsertPromotion(Box<ActivityDraft>),
}

/// Source rows and lookups a rating activity is derived from.
#[derive(Debug, Clone, Copy)]
pub struct RatingSnapshot<'a> {
    pub kind: ItemKind,
    pub user_id: i64,
    pub item_id: i64,
    pub rating: Option<&'a RatingRow>,
    pub review: Option<&'a ReviewRow>,
    pub author: Option<&'a AuthorSnapshot>,
    pub card: Option<&'a ItemCard>,
}

// ============================================================================
// Pure projection
// ============================================================================

/// Project the rating activity for one `(user, item)`.
///
/// A RATED rating yields an upsert carrying the review fields if a review
/// exists; any other state yields a delete. Fails with `CatalogMissing` when a
/// RATED rating points at an item absent from the catalog.
pub fn project_rating(snapshot: &RatingSnapshot<'_>) -> CoreResult<ActivityCommand> {
    let key = ActivityKey::rating(snapshot.kind, snapshot.user_id, snapshot.item_id);

    let Some(rating) = snapshot.rating.filter(|r| r.is_rated()) else {
        return Ok(ActivityCommand::Delete(key));
    };
    let author = snapshot
        .author
        .ok_or_else(|| CoreError::not_found("user", snapshot.user_id))?;
    let card = snapshot.card.ok_or(CoreError::CatalogMissing {
        kind: snapshot.kind.as_str(),
        id: snapshot.item_id,
    })?;

    let activity_time = snapshot
        .review
        .map_or(rating.updated_at.as_str(), |review| review.created_at.as_str());

    let mut draft = ActivityDraft::empty(key, author, activity_time);
    draft.item_title = Some(card.title.clone());
    draft.item_title_korean.clone_from(&card.title_korean);
    draft.item_image.clone_from(&card.image_url);
    draft.rating = rating.rating;
    if let Some(review) = snapshot.review {
        draft.review_title.clone_from(&review.title);
        draft.review_content = Some(review.content.clone());
        draft.is_spoiler = Some(review.is_spoiler);
    }
    if let Some(parent) = &card.parent {
        draft.anime_id = Some(parent.anime_id);
        draft.anime_title = Some(parent.title.clone());
    }

    Ok(ActivityCommand::Upsert(Box::new(draft)))
}

/// Project the activity for a post; `None` means the post is gone.
#[must_use]
pub fn project_post(
    user_id: i64,
    post_id: i64,
    post: Option<&PostRow>,
    author: &AuthorSnapshot,
) -> ActivityCommand {
    let key = ActivityKey::post(user_id, post_id);
    let Some(post) = post else {
        return ActivityCommand::Delete(key);
    };

    let mut draft = ActivityDraft::empty(key, author, &post.created_at);
    draft.review_content = Some(post.content.clone());
    ActivityCommand::Upsert(Box::new(draft))
}

/// Project a rank promotion for crossing `threshold`.
#[must_use]
pub fn project_promotion(
    user_id: i64,
    author: &AuthorSnapshot,
    threshold: i64,
    metadata: PromotionMetadata,
    activity_time: &str,
) -> ActivityCommand {
    let key = ActivityKey::new(ActivityType::RankPromotion, user_id, None);
    let mut draft = ActivityDraft::empty(key, author, activity_time);
    draft.promotion_threshold = Some(threshold);
    draft.metadata = Some(metadata);
    ActivityCommand::InsertPromotion(Box::new(draft))
}

// ============================================================================
// Execution
// ============================================================================

/// Apply a command; `ts` stamps `created_at`/`updated_at`.
pub fn execute(conn: &Connection, command: &ActivityCommand, ts: &str) -> Result<()> {
    match command {
        ActivityCommand::Upsert(draft) => {
            debug!(key = %draft.key, "upsert activity");
            write_draft(conn, draft, ts, false)
        }
        ActivityCommand::InsertPromotion(draft) => {
            debug!(
                user_id = draft.key.user_id,
                threshold = draft.promotion_threshold,
                "insert promotion"
            );
            write_draft(conn, draft, ts, true)
        }
        ActivityCommand::Delete(key) => {
            if delete_activity(conn, key)? {
                debug!(%key, "deleted activity");
            }
            Ok(())
        }
        ActivityCommand::RefreshAuthor { user_id, author } => {
            conn.execute(
                "UPDATE activities SET username = ?, display_name = ?, avatar_url = ?
                 WHERE user_id = ?",
                params![author.username, author.display_name, author.avatar_url, user_id],
            )
            .context("Failed to refresh author fields")?;
            debug!(user_id, "refreshed author fields");
            Ok(())
        }
    }
}

fn write_draft(conn: &Connection, draft: &ActivityDraft, ts: &str, ignore_existing: bool) -> Result<()> {
    let metadata = draft
        .metadata
        .map(|m| serde_json::to_string(&m))
        .transpose()
        .context("Failed to serialize activity metadata")?;

    let conflict = if ignore_existing {
        "ON CONFLICT DO NOTHING"
    } else {
        "ON CONFLICT (activity_type, user_id, item_id) DO UPDATE SET
            username = excluded.username,
            display_name = excluded.display_name,
            avatar_url = excluded.avatar_url,
            otaku_score = excluded.otaku_score,
            item_title = excluded.item_title,
            item_title_korean = excluded.item_title_korean,
            item_image = excluded.item_image,
            rating = excluded.rating,
            review_title = excluded.review_title,
            review_content = excluded.review_content,
            is_spoiler = excluded.is_spoiler,
            anime_id = excluded.anime_id,
            anime_title = excluded.anime_title,
            activity_time = excluded.activity_time,
            updated_at = excluded.updated_at"
    };

    conn.execute(
        &format!(
            "INSERT INTO activities (
                activity_type, user_id, item_id, username, display_name, avatar_url,
                otaku_score, item_title, item_title_korean, item_image, rating,
                review_title, review_content, is_spoiler, anime_id, anime_title,
                promotion_threshold, metadata, activity_time, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20, ?20
            ) {conflict}"
        ),
        params![
            draft.key.activity_type,
            draft.key.user_id,
            draft.key.item_id,
            draft.author.username,
            draft.author.display_name,
            draft.author.avatar_url,
            draft.author.otaku_score,
            draft.item_title,
            draft.item_title_korean,
            draft.item_image,
            draft.rating,
            draft.review_title,
            draft.review_content,
            draft.is_spoiler,
            draft.anime_id,
            draft.anime_title,
            draft.promotion_threshold,
            metadata,
            draft.activity_time,
            ts,
        ],
    )
    .with_context(|| format!("Failed to write activity {}", draft.key))?;
    Ok(())
}

/// Delete an activity by key together with its activity-bound likes and
/// comments, matched by id or by key. Returns false if no row existed.
pub fn delete_activity(conn: &Connection, key: &ActivityKey) -> Result<bool> {
    let id = find_activity_id(conn, key)?;
    purge_engagement(conn, id, key)?;
    let Some(id) = id else {
        return Ok(false);
    };
    conn.execute("DELETE FROM activities WHERE id = ?", params![id])
        .context("Failed to delete activity")?;
    Ok(true)
}

/// Delete one activity row by id, with its activity-bound engagement.
pub fn delete_activity_by_id(conn: &Connection, id: i64, key: &ActivityKey) -> Result<()> {
    purge_engagement(conn, Some(id), key)?;
    conn.execute("DELETE FROM activities WHERE id = ?", params![id])
        .context("Failed to delete activity")?;
    Ok(())
}

fn purge_engagement(conn: &Connection, id: Option<i64>, key: &ActivityKey) -> Result<()> {
    for table in ["activity_likes", "activity_comments"] {
        conn.execute(
            &format!(
                "DELETE FROM {table}
                 WHERE activity_id = ?1
                    OR (activity_type = ?2 AND activity_user_id = ?3 AND item_id IS ?4)"
            ),
            params![id, key.activity_type, key.user_id, key.item_id],
        )
        .with_context(|| format!("Failed to purge {table}"))?;
    }
    Ok(())
}

// ============================================================================
// Reprojection against the store
// ============================================================================

/// Re-derive the rating activity for `(user, item)` from current source rows
/// and the given catalog card.
pub fn reproject_rating(
    conn: &Connection,
    card: Option<&ItemCard>,
    kind: ItemKind,
    user_id: i64,
    item_id: i64,
    ts: &str,
) -> CoreResult<()> {
    let command = rating_command_with_card(conn, card, kind, user_id, item_id)?;
    execute(conn, &command, ts)?;
    Ok(())
}

/// Command that would bring the rating activity for `(user, item)` in line
/// with the source rows and the live catalog.
pub fn rating_command(
    conn: &Connection,
    catalog: &CatalogCache,
    kind: ItemKind,
    user_id: i64,
    item_id: i64,
) -> CoreResult<ActivityCommand> {
    let card = catalog.item(conn, kind, item_id)?;
    rating_command_with_card(conn, card.as_deref(), kind, user_id, item_id)
}

fn rating_command_with_card(
    conn: &Connection,
    card: Option<&ItemCard>,
    kind: ItemKind,
    user_id: i64,
    item_id: i64,
) -> CoreResult<ActivityCommand> {
    let rating = sources::get_rating(conn, kind, user_id, item_id)?;
    let review = sources::get_review(conn, kind, user_id, item_id)?;
    let author = if rating.as_ref().is_some_and(RatingRow::is_rated) {
        author_snapshot(conn, user_id)?
    } else {
        None
    };

    project_rating(&RatingSnapshot {
        kind,
        user_id,
        item_id,
        rating: rating.as_ref(),
        review: review.as_ref(),
        author: author.as_ref(),
        card,
    })
}

/// Re-derive the activity for a post from the current `user_posts` row.
pub fn reproject_post(conn: &Connection, user_id: i64, post_id: i64, ts: &str) -> CoreResult<()> {
    let command = post_command(conn, user_id, post_id)?;
    execute(conn, &command, ts)?;
    Ok(())
}

pub fn post_command(conn: &Connection, user_id: i64, post_id: i64) -> CoreResult<ActivityCommand> {
    let post = sources::get_post(conn, post_id)?;
    if post.is_none() {
        return Ok(ActivityCommand::Delete(ActivityKey::post(user_id, post_id)));
    }
    let author = author_snapshot(conn, user_id)?.ok_or_else(|| CoreError::not_found("user", user_id))?;
    Ok(project_post(user_id, post_id, post.as_ref(), &author))
}

/// Copy the user's current author fields onto all their activities.
pub fn refresh_author(conn: &Connection, user_id: i64, ts: &str) -> CoreResult<()> {
    let author = author_snapshot(conn, user_id)?.ok_or_else(|| CoreError::not_found("user", user_id))?;
    execute(conn, &ActivityCommand::RefreshAuthor { user_id, author }, ts)?;
    Ok(())
}

// ============================================================================
// Reads
// ============================================================================

pub fn find_activity_id(conn: &Connection, key: &ActivityKey) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM activities
         WHERE activity_type = ? AND user_id = ? AND item_id IS ?
         ORDER BY id LIMIT 1",
        params![key.activity_type, key.user_id, key.item_id],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to look up activity id")
}

pub fn get_activity(conn: &Connection, id: i64) -> Result<Option<Activity>> {
    conn.query_row(
        &format!("SELECT {ACTIVITY_COLUMNS} FROM activities a WHERE a.id = ?"),
        params![id],
        Activity::from_row,
    )
    .optional()
    .context("Failed to query activity")
}

pub fn get_activity_by_key(conn: &Connection, key: &ActivityKey) -> Result<Option<Activity>> {
    conn.query_row(
        &format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities a
             WHERE a.activity_type = ? AND a.user_id = ? AND a.item_id IS ?
             ORDER BY a.id LIMIT 1"
        ),
        params![key.activity_type, key.user_id, key.item_id],
        Activity::from_row,
    )
    .optional()
    .context("Failed to query activity by key")
}

/// Every activity row, ordered by id.
pub fn list_activities(conn: &Connection) -> Result<Vec<Activity>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {ACTIVITY_COLUMNS} FROM activities a ORDER BY a.id"))
        .context("Failed to prepare activity list")?;
    let rows = stmt
        .query_map([], Activity::from_row)
        .context("Failed to list activities")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read activities")?;
    Ok(rows)
}

/// Rank promotions of a user, ordered by threshold.
pub fn list_promotions(conn: &Connection, user_id: i64) -> Result<Vec<Activity>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities a
             WHERE a.activity_type = 'rank_promotion' AND a.user_id = ?
             ORDER BY a.promotion_threshold"
        ))
        .context("Failed to prepare promotion list")?;
    let rows = stmt
        .query_map(params![user_id], Activity::from_row)
        .context("Failed to list promotions")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read promotions")?;
    Ok(rows)
}
