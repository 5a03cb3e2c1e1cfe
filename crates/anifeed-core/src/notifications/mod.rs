//! Notifications for a viewer: engagement by others on their content, and
//! their own rank promotions.

#![allow(clippy::missing_errors_doc)]

use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::domain::{ActivityType, CommentSource};
use crate::store::users::get_user;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Promotion,
}

impl NotificationKind {
    fn from_sql(raw: &str) -> Option<Self> {
        match raw {
            "like" => Some(Self::Like),
            "comment" => Some(Self::Comment),
            "promotion" => Some(Self::Promotion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Who liked or commented; `None` for promotions
    pub actor_id: Option<i64>,
    pub actor_username: Option<String>,
    pub activity_type: ActivityType,
    pub item_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_source: Option<CommentSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_threshold: Option<i64>,
    pub created_at: String,
    /// Newer than the viewer's last notification check
    pub is_new: bool,
}

/// Every notification source as one relation with columns
/// `(kind, actor_id, activity_type, item_id, comment_source, comment_id,
/// content, promotion_threshold, created_at)`. Binds the viewer as `?1`.
const NOTIFICATIONS_SQL: &str = "
    SELECT 'like' AS kind, l.user_id AS actor_id, l.activity_type AS activity_type,
           l.item_id AS item_id, NULL AS comment_source, NULL AS comment_id, NULL AS content,
           NULL AS promotion_threshold, l.created_at AS created_at
      FROM activity_likes l
     WHERE l.activity_user_id = ?1 AND l.user_id <> ?1
    UNION ALL
    SELECT 'like', rl.user_id, 'anime_rating', r.anime_id, NULL, NULL, NULL, NULL, rl.created_at
      FROM review_likes rl JOIN user_reviews r ON rl.review_type = 'anime' AND r.id = rl.review_id
     WHERE r.user_id = ?1 AND rl.user_id <> ?1
    UNION ALL
    SELECT 'like', rl.user_id, 'character_rating', r.character_id, NULL, NULL, NULL, NULL, rl.created_at
      FROM review_likes rl JOIN character_reviews r ON rl.review_type = 'character' AND r.id = rl.review_id
     WHERE r.user_id = ?1 AND rl.user_id <> ?1
    UNION ALL
    SELECT 'comment', c.user_id, c.activity_type, c.item_id, 'activity', c.id, c.content, NULL, c.created_at
      FROM activity_comments c
     WHERE c.activity_user_id = ?1 AND c.user_id <> ?1
    UNION ALL
    SELECT 'comment', c.user_id, 'anime_rating', r.anime_id, 'review', c.id, c.content, NULL, c.created_at
      FROM review_comments c JOIN user_reviews r ON c.review_type = 'anime' AND r.id = c.review_id
     WHERE r.user_id = ?1 AND c.user_id <> ?1
    UNION ALL
    SELECT 'comment', c.user_id, 'character_rating', r.character_id, 'review', c.id, c.content, NULL, c.created_at
      FROM review_comments c JOIN character_reviews r ON c.review_type = 'character' AND r.id = c.review_id
     WHERE r.user_id = ?1 AND c.user_id <> ?1
    UNION ALL
    SELECT 'promotion', NULL, a.activity_type, NULL, NULL, NULL, NULL, a.promotion_threshold, a.activity_time
      FROM activities a
     WHERE a.activity_type = 'rank_promotion' AND a.user_id = ?1
";

/// Notifications for `viewer`, newest first.
pub fn list(conn: &Connection, viewer: i64, limit: i64) -> Result<Vec<Notification>> {
    let last_check = get_user(conn, viewer)?.and_then(|u| u.last_notification_check);

    let mut stmt = conn
        .prepare(&format!(
            "SELECT n.*, u.username FROM ({NOTIFICATIONS_SQL}) n
             LEFT JOIN users u ON u.id = n.actor_id
             ORDER BY n.created_at DESC
             LIMIT ?2"
        ))
        .context("Failed to prepare notifications query")?;

    let rows = stmt
        .query_map(params![viewer, limit], |row| {
            let raw_kind: String = row.get(0)?;
            let kind = NotificationKind::from_sql(&raw_kind).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    Type::Text,
                    format!("unknown notification kind: {raw_kind}").into(),
                )
            })?;
            let created_at: String = row.get(8)?;
            Ok(Notification {
                kind,
                actor_id: row.get(1)?,
                actor_username: row.get(9)?,
                activity_type: row.get(2)?,
                item_id: row.get(3)?,
                comment_source: row.get(4)?,
                comment_id: row.get(5)?,
                content: row.get(6)?,
                promotion_threshold: row.get(7)?,
                is_new: last_check
                    .as_deref()
                    .is_none_or(|check| created_at.as_str() > check),
                created_at,
            })
        })
        .context("Failed to query notifications")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read notifications")?;

    Ok(rows)
}

/// Number of notifications newer than the viewer's last check.
pub fn unread_count(conn: &Connection, viewer: i64) -> Result<i64> {
    let last_check = get_user(conn, viewer)?.and_then(|u| u.last_notification_check);
    conn.query_row(
        &format!("SELECT COUNT(*) FROM ({NOTIFICATIONS_SQL}) n WHERE ?2 IS NULL OR n.created_at > ?2"),
        params![viewer, last_check],
        |row| row.get(0),
    )
    .context("Failed to count notifications")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Language;
    use crate::store::users::{insert_user, set_notification_check, NewUser};
    use crate::store::FeedDb;

    fn setup() -> FeedDb {
        let db = FeedDb::open_in_memory().unwrap();
        db.init_schema().unwrap();
        for (id, name) in [(7, "author"), (9, "fan")] {
            insert_user(
                db.conn(),
                id,
                &NewUser {
                    username: name.to_string(),
                    email: format!("{name}@example.com"),
                    password_hash: "h".to_string(),
                    display_name: None,
                    avatar_url: None,
                    preferred_language: Language::En,
                },
                "2026-01-01T00:00:00.000000Z",
            )
            .unwrap();
        }
        db.conn()
            .execute_batch(
                "INSERT INTO anime (id, title) VALUES (16498, 'Attack on Titan');
                 INSERT INTO user_reviews (id, user_id, anime_id, content, created_at, updated_at)
                     VALUES (1, 7, 16498, 'good', '2026-01-01T00:00:01.000000Z', '2026-01-01T00:00:01.000000Z');
                 INSERT INTO review_likes (review_type, review_id, user_id, created_at)
                     VALUES ('anime', 1, 9, '2026-01-01T00:00:02.000000Z');
                 INSERT INTO review_likes (review_type, review_id, user_id, created_at)
                     VALUES ('anime', 1, 7, '2026-01-01T00:00:02.500000Z');
                 INSERT INTO activity_comments (user_id, activity_type, activity_user_id, item_id, depth, content, created_at)
                     VALUES (9, 'user_post', 7, 3, 1, 'nice post', '2026-01-01T00:00:03.000000Z');",
            )
            .unwrap();
        db
    }

    #[test]
    fn test_lists_both_paths_newest_first() {
        let db = setup();
        let items = list(db.conn(), 7, 50).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, NotificationKind::Comment);
        assert_eq!(items[0].comment_source, Some(CommentSource::Activity));
        assert_eq!(items[0].actor_username.as_deref(), Some("fan"));
        assert_eq!(items[1].kind, NotificationKind::Like);
        assert_eq!(items[1].activity_type, ActivityType::AnimeRating);
        assert_eq!(items[1].item_id, Some(16498));
        assert!(items.iter().all(|n| n.is_new));
    }

    #[test]
    fn test_is_new_relative_to_last_check() {
        let db = setup();
        set_notification_check(db.conn(), 7, "2026-01-01T00:00:02.000000Z").unwrap();
        let items = list(db.conn(), 7, 50).unwrap();
        assert!(items[0].is_new);
        assert!(!items[1].is_new);
        assert_eq!(unread_count(db.conn(), 7).unwrap(), 1);
    }

    #[test]
    fn test_self_engagement_excluded() {
        let db = setup();
        assert!(list(db.conn(), 9, 50).unwrap().is_empty());
    }
}
