//! Feed queries over the `activities` projection.
//!
//! Pages are ordered by `activity_time DESC, id DESC` and decorated with
//! engagement for the viewer in one batch.

#![allow(clippy::missing_errors_doc)]

use anyhow::Context;
use rusqlite::Connection;
use serde::Serialize;

use crate::config::MAX_PAGE_SIZE;
use crate::core::{CoreError, CoreResult};
use crate::domain::ActivityType;
use crate::engagement;
use crate::projection::{Activity, ACTIVITY_COLUMNS};

/// Filters and paging for a feed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub activity_type: Option<ActivityType>,
    pub user_id: Option<i64>,
    /// Requires `activity_type`
    pub item_id: Option<i64>,
    /// Restrict to users the viewer follows; requires a viewer
    pub following_only: bool,
    pub limit: i64,
    pub offset: i64,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            activity_type: None,
            user_id: None,
            item_id: None,
            following_only: false,
            limit: 20,
            offset: 0,
        }
    }
}

impl FeedQuery {
    /// Per-user feed.
    #[must_use]
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    /// Per-item feed.
    #[must_use]
    pub fn for_item(activity_type: ActivityType, item_id: i64) -> Self {
        Self {
            activity_type: Some(activity_type),
            item_id: Some(item_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    #[must_use]
    pub const fn following(mut self) -> Self {
        self.following_only = true;
        self
    }

    pub fn validate(&self, viewer: Option<i64>) -> CoreResult<()> {
        if self.limit < 1 || self.limit > i64::from(MAX_PAGE_SIZE) {
            return Err(CoreError::invalid(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.limit
            )));
        }
        if self.offset < 0 {
            return Err(CoreError::invalid(format!(
                "offset must not be negative, got {}",
                self.offset
            )));
        }
        if self.following_only && viewer.is_none() {
            return Err(CoreError::invalid("following_only requires a viewer"));
        }
        if self.item_id.is_some() && self.activity_type.is_none() {
            return Err(CoreError::invalid("item_id requires activity_type"));
        }
        Ok(())
    }
}

/// An activity decorated for one viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub activity: Activity,
    pub likes_count: i64,
    pub comments_count: i64,
    pub user_liked: bool,
    pub is_my_activity: bool,
}

/// One page of a feed plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Column list with the live `user_stats` score in place of the snapshot.
///
/// Stats recompute rewrites `activities.otaku_score` in the same write, so
/// the two agree after every committed write. The join covers rows written
/// before a failed stats refresh; reads never write the column back.
fn decorated_columns() -> String {
    ACTIVITY_COLUMNS.replacen(
        "a.otaku_score",
        "COALESCE(s.otaku_score, a.otaku_score)",
        1,
    )
}

fn decorate(conn: &Connection, activities: Vec<Activity>, viewer: Option<i64>) -> Vec<FeedItem> {
    let engagement = engagement::resolve_batch(conn, &activities, viewer);
    activities
        .into_iter()
        .zip(engagement)
        .map(|(activity, e)| FeedItem {
            is_my_activity: viewer == Some(activity.user_id),
            activity,
            likes_count: e.likes_count,
            comments_count: e.comments_count,
            user_liked: e.user_liked,
        })
        .collect()
}

/// Run a feed query for `viewer`.
pub fn query(conn: &Connection, request: &FeedQuery, viewer: Option<i64>) -> CoreResult<FeedPage> {
    request.validate(viewer)?;

    let mut filter = String::from(" WHERE 1=1");
    let mut param_values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(activity_type) = request.activity_type {
        filter.push_str(" AND a.activity_type = ?");
        param_values.push(Box::new(activity_type));
    }
    if let Some(user_id) = request.user_id {
        filter.push_str(" AND a.user_id = ?");
        param_values.push(Box::new(user_id));
    }
    if let Some(item_id) = request.item_id {
        filter.push_str(" AND a.item_id = ?");
        param_values.push(Box::new(item_id));
    }
    if request.following_only {
        filter.push_str(" AND a.user_id IN (SELECT following_id FROM user_follows WHERE follower_id = ?)");
        param_values.push(Box::new(viewer));
    }

    let params: Vec<&dyn rusqlite::ToSql> = param_values.iter().map(AsRef::as_ref).collect();

    let total: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM activities a{filter}"),
            params.as_slice(),
            |row| row.get(0),
        )
        .context("Failed to count feed rows")?;

    let sql = format!(
        "SELECT {} FROM activities a
         LEFT JOIN user_stats s ON s.user_id = a.user_id{filter}
         ORDER BY a.activity_time DESC, a.id DESC
         LIMIT {} OFFSET {}",
        decorated_columns(),
        request.limit,
        request.offset
    );
    let mut stmt = conn.prepare(&sql).context("Failed to prepare feed query")?;
    let activities = stmt
        .query_map(params.as_slice(), Activity::from_row)
        .context("Failed to execute feed query")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read feed row")?;

    Ok(FeedPage {
        items: decorate(conn, activities, viewer),
        total,
        limit: request.limit,
        offset: request.offset,
    })
}

/// A single decorated activity.
pub fn get_item(conn: &Connection, activity_id: i64, viewer: Option<i64>) -> CoreResult<FeedItem> {
    use rusqlite::OptionalExtension;

    let activity = conn
        .query_row(
            &format!(
                "SELECT {} FROM activities a
                 LEFT JOIN user_stats s ON s.user_id = a.user_id
                 WHERE a.id = ?",
                decorated_columns()
            ),
            [activity_id],
            Activity::from_row,
        )
        .optional()
        .context("Failed to query activity")?
        .ok_or_else(|| CoreError::not_found("activity", activity_id))?;

    decorate(conn, vec![activity], viewer)
        .pop()
        .ok_or_else(|| CoreError::not_found("activity", activity_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActivityKey, Language};
    use crate::projection::{execute, project_post, ActivityCommand};
    use crate::store::sources::insert_post;
    use crate::store::users::{author_snapshot, insert_follow, insert_user, NewUser};
    use crate::store::FeedDb;

    fn setup() -> FeedDb {
        let db = FeedDb::open_in_memory().unwrap();
        db.init_schema().unwrap();
        for (id, name) in [(7, "author"), (9, "viewer"), (11, "stranger")] {
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
        db
    }

    fn seed_post(db: &FeedDb, user_id: i64, post_id: i64, ts: &str) {
        insert_post(db.conn(), post_id, user_id, "hello", ts).unwrap();
        let post = crate::store::sources::get_post(db.conn(), post_id).unwrap();
        let author = author_snapshot(db.conn(), user_id).unwrap().unwrap();
        let command = project_post(user_id, post_id, post.as_ref(), &author);
        assert!(matches!(command, ActivityCommand::Upsert(_)));
        execute(db.conn(), &command, ts).unwrap();
    }

    #[test]
    fn test_validation() {
        let q = FeedQuery::default();
        assert!(q.clone().page(0, 0).validate(None).is_err());
        assert!(q.clone().page(501, 0).validate(None).is_err());
        assert!(q.clone().page(500, 0).validate(None).is_ok());
        assert!(q.clone().page(10, -1).validate(None).is_err());
        assert!(q.clone().following().validate(None).is_err());
        assert!(q.clone().following().validate(Some(9)).is_ok());
        let bad_item = FeedQuery {
            item_id: Some(1),
            ..FeedQuery::default()
        };
        assert!(bad_item.validate(None).is_err());
    }

    #[test]
    fn test_paging_has_no_overlap() {
        let db = setup();
        for i in 1..=5 {
            seed_post(&db, 7, i, &format!("2026-01-01T00:00:0{i}.000000Z"));
        }

        let first = query(db.conn(), &FeedQuery::default().page(2, 0), None).unwrap();
        let second = query(db.conn(), &FeedQuery::default().page(2, 2), None).unwrap();
        assert_eq!(first.total, 5);
        let ids: Vec<_> = first
            .items
            .iter()
            .chain(&second.items)
            .map(|i| i.activity.item_id)
            .collect();
        assert_eq!(ids, vec![Some(5), Some(4), Some(3), Some(2)]);
    }

    #[test]
    fn test_ties_break_by_id_desc() {
        let db = setup();
        seed_post(&db, 7, 1, "2026-01-01T00:00:01.000000Z");
        seed_post(&db, 7, 2, "2026-01-01T00:00:01.000000Z");

        let page = query(db.conn(), &FeedQuery::default(), None).unwrap();
        assert!(page.items[0].activity.id > page.items[1].activity.id);
    }

    #[test]
    fn test_following_only_and_is_my_activity() {
        let db = setup();
        seed_post(&db, 7, 1, "2026-01-01T00:00:01.000000Z");
        seed_post(&db, 11, 2, "2026-01-01T00:00:02.000000Z");
        seed_post(&db, 9, 3, "2026-01-01T00:00:03.000000Z");
        insert_follow(db.conn(), 9, 7, "2026-01-01T00:00:00.000000Z").unwrap();

        let page = query(db.conn(), &FeedQuery::default().following(), Some(9)).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].activity.key(), ActivityKey::post(7, 1));
        assert!(!page.items[0].is_my_activity);

        let mine = query(db.conn(), &FeedQuery::for_user(9), Some(9)).unwrap();
        assert!(mine.items[0].is_my_activity);
    }

    #[test]
    fn test_live_score_overrides_snapshot() {
        let db = setup();
        seed_post(&db, 7, 1, "2026-01-01T00:00:01.000000Z");
        db.conn()
            .execute(
                "INSERT INTO user_stats (user_id, otaku_score, updated_at) VALUES (7, 42, 'x')",
                [],
            )
            .unwrap();

        let page = query(db.conn(), &FeedQuery::for_item(ActivityType::UserPost, 1), None).unwrap();
        assert_eq!(page.items[0].activity.otaku_score, 42);
        let single = get_item(db.conn(), page.items[0].activity.id, None).unwrap();
        assert_eq!(single.activity.otaku_score, 42);
    }

    #[test]
    fn test_get_item_not_found() {
        let db = setup();
        let err = get_item(db.conn(), 999, None).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
