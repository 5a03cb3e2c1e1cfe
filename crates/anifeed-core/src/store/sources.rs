//! Source tables: ratings, reviews and posts.
//!
//! Anime and character rows share one shape and are addressed through
//! [`ItemKind`], which names the physical table and item column.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::domain::ItemKind;

/// Status text shared by both rating families for a scored rating.
pub const RATED: &str = "RATED";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRow {
    pub user_id: i64,
    pub item_id: i64,
    pub rating: Option<f64>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl RatingRow {
    /// Whether this row produces a rating activity.
    #[must_use]
    pub fn is_rated(&self) -> bool {
        self.status == RATED && self.rating.is_some()
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            item_id: row.get(1)?,
            rating: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewRow {
    pub id: i64,
    pub kind: ItemKind,
    pub user_id: i64,
    pub item_id: i64,
    pub title: Option<String>,
    pub content: String,
    pub is_spoiler: bool,
    pub likes_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl ReviewRow {
    fn from_row(kind: ItemKind, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind,
            user_id: row.get(1)?,
            item_id: row.get(2)?,
            title: row.get(3)?,
            content: row.get(4)?,
            is_spoiler: row.get(5)?,
            likes_count: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRow {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

// ============================================================================
// Ratings
// ============================================================================

/// Insert or update a rating; `created_at` survives updates.
pub fn upsert_rating(
    conn: &Connection,
    kind: ItemKind,
    user_id: i64,
    item_id: i64,
    rating: Option<f64>,
    status: &str,
    ts: &str,
) -> Result<()> {
    let table = kind.rating_table();
    let column = kind.item_column();
    conn.execute(
        &format!(
            "INSERT INTO {table} (user_id, {column}, rating, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT (user_id, {column}) DO UPDATE SET
                rating = excluded.rating,
                status = excluded.status,
                updated_at = excluded.updated_at"
        ),
        params![user_id, item_id, rating, status, ts],
    )
    .with_context(|| format!("Failed to upsert {kind} rating ({user_id}, {item_id})"))?;
    Ok(())
}

pub fn get_rating(
    conn: &Connection,
    kind: ItemKind,
    user_id: i64,
    item_id: i64,
) -> Result<Option<RatingRow>> {
    let table = kind.rating_table();
    let column = kind.item_column();
    conn.query_row(
        &format!(
            "SELECT user_id, {column}, rating, status, created_at, updated_at
             FROM {table} WHERE user_id = ? AND {column} = ?"
        ),
        params![user_id, item_id],
        RatingRow::from_row,
    )
    .optional()
    .with_context(|| format!("Failed to query {kind} rating"))
}

/// Delete a rating row. Returns false if there was none.
pub fn delete_rating(conn: &Connection, kind: ItemKind, user_id: i64, item_id: i64) -> Result<bool> {
    let table = kind.rating_table();
    let column = kind.item_column();
    let deleted = conn
        .execute(
            &format!("DELETE FROM {table} WHERE user_id = ? AND {column} = ?"),
            params![user_id, item_id],
        )
        .with_context(|| format!("Failed to delete {kind} rating"))?;
    Ok(deleted > 0)
}

/// Every rating row of one kind, ordered by `(user_id, item_id)`.
pub fn list_ratings(conn: &Connection, kind: ItemKind) -> Result<Vec<RatingRow>> {
    let table = kind.rating_table();
    let column = kind.item_column();
    let mut stmt = conn
        .prepare(&format!(
            "SELECT user_id, {column}, rating, status, created_at, updated_at
             FROM {table} ORDER BY user_id, {column}"
        ))
        .with_context(|| format!("Failed to prepare {kind} rating list"))?;
    let rows = stmt
        .query_map([], RatingRow::from_row)
        .with_context(|| format!("Failed to list {kind} ratings"))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read {kind} ratings"))?;
    Ok(rows)
}

/// Rating rows of one kind for a single user.
pub fn user_ratings(conn: &Connection, kind: ItemKind, user_id: i64) -> Result<Vec<RatingRow>> {
    let table = kind.rating_table();
    let column = kind.item_column();
    let mut stmt = conn
        .prepare(&format!(
            "SELECT user_id, {column}, rating, status, created_at, updated_at
             FROM {table} WHERE user_id = ? ORDER BY {column}"
        ))
        .with_context(|| format!("Failed to prepare {kind} user ratings"))?;
    let rows = stmt
        .query_map(params![user_id], RatingRow::from_row)
        .with_context(|| format!("Failed to list {kind} user ratings"))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read {kind} user ratings"))?;
    Ok(rows)
}

// ============================================================================
// Reviews
// ============================================================================

/// Insert or update a review; returns its id. `created_at` survives updates.
#[allow(clippy::too_many_arguments)]
pub fn upsert_review(
    conn: &Connection,
    kind: ItemKind,
    user_id: i64,
    item_id: i64,
    title: Option<&str>,
    content: &str,
    is_spoiler: bool,
    ts: &str,
) -> Result<i64> {
    let table = kind.review_table();
    let column = kind.item_column();
    let id = conn
        .query_row(
            &format!(
                "INSERT INTO {table} (user_id, {column}, title, content, is_spoiler, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT (user_id, {column}) DO UPDATE SET
                    title = excluded.title,
                    content = excluded.content,
                    is_spoiler = excluded.is_spoiler,
                    updated_at = excluded.updated_at
                 RETURNING id"
            ),
            params![user_id, item_id, title, content, is_spoiler, ts],
            |row| row.get(0),
        )
        .with_context(|| format!("Failed to upsert {kind} review ({user_id}, {item_id})"))?;
    Ok(id)
}

const REVIEW_COLUMNS: &str =
    "id, user_id, {column}, title, content, is_spoiler, likes_count, created_at, updated_at";

fn review_select(kind: ItemKind) -> String {
    format!(
        "SELECT {} FROM {}",
        REVIEW_COLUMNS.replace("{column}", kind.item_column()),
        kind.review_table()
    )
}

pub fn get_review(
    conn: &Connection,
    kind: ItemKind,
    user_id: i64,
    item_id: i64,
) -> Result<Option<ReviewRow>> {
    conn.query_row(
        &format!(
            "{} WHERE user_id = ? AND {} = ?",
            review_select(kind),
            kind.item_column()
        ),
        params![user_id, item_id],
        |row| ReviewRow::from_row(kind, row),
    )
    .optional()
    .with_context(|| format!("Failed to query {kind} review"))
}

pub fn get_review_by_id(conn: &Connection, kind: ItemKind, review_id: i64) -> Result<Option<ReviewRow>> {
    conn.query_row(
        &format!("{} WHERE id = ?", review_select(kind)),
        params![review_id],
        |row| ReviewRow::from_row(kind, row),
    )
    .optional()
    .with_context(|| format!("Failed to query {kind} review {review_id}"))
}

/// Every review of one kind, ordered by `(user_id, item_id)`.
pub fn list_reviews(conn: &Connection, kind: ItemKind) -> Result<Vec<ReviewRow>> {
    let mut stmt = conn
        .prepare(&format!(
            "{} ORDER BY user_id, {}",
            review_select(kind),
            kind.item_column()
        ))
        .with_context(|| format!("Failed to prepare {kind} review list"))?;
    let rows = stmt
        .query_map([], |row| ReviewRow::from_row(kind, row))
        .with_context(|| format!("Failed to list {kind} reviews"))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read {kind} reviews"))?;
    Ok(rows)
}

/// Delete a review together with its review-bound likes and comments.
///
/// Returns the id of the deleted review, or `None` if there was none.
pub fn delete_review(
    conn: &Connection,
    kind: ItemKind,
    user_id: i64,
    item_id: i64,
) -> Result<Option<i64>> {
    let Some(review) = get_review(conn, kind, user_id, item_id)? else {
        return Ok(None);
    };

    conn.execute(
        "DELETE FROM review_likes WHERE review_type = ? AND review_id = ?",
        params![kind, review.id],
    )
    .context("Failed to delete review likes")?;
    conn.execute(
        "DELETE FROM review_comments WHERE review_type = ? AND review_id = ?",
        params![kind, review.id],
    )
    .context("Failed to delete review comments")?;
    conn.execute(
        &format!("DELETE FROM {} WHERE id = ?", kind.review_table()),
        params![review.id],
    )
    .with_context(|| format!("Failed to delete {kind} review"))?;

    Ok(Some(review.id))
}

/// Add `delta` to a review's cached like counter.
pub fn adjust_review_likes(conn: &Connection, kind: ItemKind, review_id: i64, delta: i64) -> Result<()> {
    conn.execute(
        &format!(
            "UPDATE {} SET likes_count = MAX(likes_count + ?, 0) WHERE id = ?",
            kind.review_table()
        ),
        params![delta, review_id],
    )
    .context("Failed to adjust review likes_count")?;
    Ok(())
}

// ============================================================================
// Posts
// ============================================================================

pub fn insert_post(conn: &Connection, id: i64, user_id: i64, content: &str, ts: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO user_posts (id, user_id, content, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![id, user_id, content, ts],
    )
    .with_context(|| format!("Failed to insert post {id}"))?;
    Ok(())
}

pub fn update_post(conn: &Connection, id: i64, content: &str, ts: &str) -> Result<()> {
    conn.execute(
        "UPDATE user_posts SET content = ?, updated_at = ? WHERE id = ?",
        params![content, ts, id],
    )
    .with_context(|| format!("Failed to update post {id}"))?;
    Ok(())
}

pub fn get_post(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    conn.query_row(
        "SELECT id, user_id, content, created_at, updated_at FROM user_posts WHERE id = ?",
        params![id],
        |row| {
            Ok(PostRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        },
    )
    .optional()
    .context("Failed to query post")
}

pub fn delete_post(conn: &Connection, id: i64) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM user_posts WHERE id = ?", params![id])
        .context("Failed to delete post")?;
    Ok(deleted > 0)
}

pub fn list_posts(conn: &Connection) -> Result<Vec<PostRow>> {
    let mut stmt = conn
        .prepare("SELECT id, user_id, content, created_at, updated_at FROM user_posts ORDER BY id")
        .context("Failed to prepare post list")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PostRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })
        .context("Failed to list posts")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read posts")?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::catalog::{upsert_anime, AnimeRecord};
    use crate::store::users::{insert_user, NewUser};
    use crate::store::FeedDb;

    const T1: &str = "2026-01-01T00:00:00.000000Z";
    const T2: &str = "2026-01-02T00:00:00.000000Z";

    fn setup() -> FeedDb {
        let db = FeedDb::open_in_memory().unwrap();
        db.init_schema().unwrap();
        insert_user(
            db.conn(),
            7,
            &NewUser {
                username: "u7".to_string(),
                email: "u7@example.com".to_string(),
                password_hash: "h".to_string(),
                display_name: None,
                avatar_url: None,
                preferred_language: crate::domain::Language::En,
            },
            T1,
        )
        .unwrap();
        upsert_anime(
            db.conn(),
            &AnimeRecord {
                id: 16498,
                title: "Attack on Titan".to_string(),
                title_korean: None,
                title_japanese: None,
                image_url: None,
                episodes: Some(25),
                duration: Some(24),
                start_date: None,
                popularity: None,
                genres: Vec::new(),
            },
        )
        .unwrap();
        db
    }

    #[test]
    fn test_rating_upsert_preserves_created_at() {
        let db = setup();
        upsert_rating(db.conn(), ItemKind::Anime, 7, 16498, Some(4.5), RATED, T1).unwrap();
        upsert_rating(db.conn(), ItemKind::Anime, 7, 16498, None, "PASS", T2).unwrap();

        let row = get_rating(db.conn(), ItemKind::Anime, 7, 16498).unwrap().unwrap();
        assert_eq!(row.created_at, T1);
        assert_eq!(row.updated_at, T2);
        assert!(!row.is_rated());
    }

    #[test]
    fn test_rated_requires_score_in_schema() {
        let db = setup();
        let err = upsert_rating(db.conn(), ItemKind::Anime, 7, 16498, None, RATED, T1);
        assert!(err.is_err());
        let err = upsert_rating(db.conn(), ItemKind::Anime, 7, 16498, Some(5.5), RATED, T1);
        assert!(err.is_err());
    }

    #[test]
    fn test_review_upsert_returns_stable_id() {
        let db = setup();
        upsert_rating(db.conn(), ItemKind::Anime, 7, 16498, Some(4.5), RATED, T1).unwrap();
        let first =
            upsert_review(db.conn(), ItemKind::Anime, 7, 16498, Some("Great"), "...", false, T1)
                .unwrap();
        let second =
            upsert_review(db.conn(), ItemKind::Anime, 7, 16498, None, "edited", true, T2).unwrap();
        assert_eq!(first, second);

        let review = get_review(db.conn(), ItemKind::Anime, 7, 16498).unwrap().unwrap();
        assert_eq!(review.created_at, T1);
        assert_eq!(review.content, "edited");
        assert!(review.is_spoiler);
        assert_eq!(review.title, None);
    }

    #[test]
    fn test_delete_review_cascades_review_engagement() {
        let db = setup();
        let id =
            upsert_review(db.conn(), ItemKind::Anime, 7, 16498, None, "text", false, T1).unwrap();
        db.conn()
            .execute(
                "INSERT INTO review_likes (review_type, review_id, user_id, created_at)
                 VALUES ('anime', ?, 7, ?)",
                params![id, T1],
            )
            .unwrap();

        assert_eq!(delete_review(db.conn(), ItemKind::Anime, 7, 16498).unwrap(), Some(id));
        assert_eq!(delete_review(db.conn(), ItemKind::Anime, 7, 16498).unwrap(), None);

        let likes: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM review_likes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(likes, 0);
    }

    #[test]
    fn test_post_lifecycle() {
        let db = setup();
        insert_post(db.conn(), 1, 7, "hello", T1).unwrap();
        update_post(db.conn(), 1, "hello again", T2).unwrap();

        let post = get_post(db.conn(), 1).unwrap().unwrap();
        assert_eq!(post.content, "hello again");
        assert_eq!(post.created_at, T1);

        assert!(delete_post(db.conn(), 1).unwrap());
        assert!(get_post(db.conn(), 1).unwrap().is_none());
    }
}
