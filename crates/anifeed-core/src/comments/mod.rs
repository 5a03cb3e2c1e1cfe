//! Two-level comment threads on activities.
//!
//! A comment is a root (`depth = 1`) or a reply to a root (`depth = 2`). The
//! physical table follows the engagement branch of the target activity at the
//! time of writing, so legacy activity-bound threads stay readable through
//! [`CommentRef`] after a review appears.

#![allow(clippy::missing_errors_doc)]

use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::domain::{ActivityKey, CommentSource, EngagementBranch};

/// Depth of a root comment.
pub const ROOT_DEPTH: i64 = 1;
/// Depth of a reply; replies cannot be replied to.
pub const REPLY_DEPTH: i64 = 2;

/// Addresses one comment row in either table family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentRef {
    pub source: CommentSource,
    pub id: i64,
}

/// A stored comment without its replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRow {
    pub id: i64,
    pub source: CommentSource,
    pub user_id: i64,
    pub parent_comment_id: Option<i64>,
    pub depth: i64,
    pub content: String,
    pub created_at: String,
}

impl CommentRow {
    #[must_use]
    pub const fn comment_ref(&self) -> CommentRef {
        CommentRef {
            source: self.source,
            id: self.id,
        }
    }
}

/// A comment as returned to a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: i64,
    pub source: CommentSource,
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub parent_comment_id: Option<i64>,
    pub depth: i64,
    pub content: String,
    pub created_at: String,
    /// Whether the viewer wrote this comment
    pub is_mine: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Comment>,
}

pub(crate) const fn table_for(source: CommentSource) -> &'static str {
    match source {
        CommentSource::Review => "review_comments",
        CommentSource::Activity => "activity_comments",
    }
}

/// SQL predicate (on alias `c`) selecting comments attached to a target, and
/// its bound parameters.
fn target_filter(branch: EngagementBranch, key: &ActivityKey) -> (String, Vec<rusqlite::types::Value>) {
    use rusqlite::types::Value;
    match branch {
        EngagementBranch::Review { kind, review_id } => (
            "c.review_type = ? AND c.review_id = ?".to_string(),
            vec![Value::Text(kind.as_str().to_string()), Value::Integer(review_id)],
        ),
        EngagementBranch::Activity { activity_id } => (
            "(c.activity_id = ? OR (c.activity_type = ? AND c.activity_user_id = ? AND c.item_id IS ?))"
                .to_string(),
            vec![
                Value::Integer(activity_id),
                Value::Text(key.activity_type.as_str().to_string()),
                Value::Integer(key.user_id),
                key.item_id.map_or(Value::Null, Value::Integer),
            ],
        ),
    }
}

// ============================================================================
// Writes
// ============================================================================

/// Depth of `parent_id` if it is a comment on this target, else `None`.
pub fn parent_depth(
    conn: &Connection,
    branch: EngagementBranch,
    key: &ActivityKey,
    parent_id: i64,
) -> Result<Option<i64>> {
    let (filter, mut values) = target_filter(branch, key);
    values.push(rusqlite::types::Value::Integer(parent_id));
    conn.query_row(
        &format!(
            "SELECT c.depth FROM {} c WHERE {filter} AND c.id = ?",
            table_for(branch.comment_source())
        ),
        rusqlite::params_from_iter(values),
        |row| row.get(0),
    )
    .optional()
    .context("Failed to look up parent comment")
}

/// Insert a comment with a pre-allocated id into the table chosen by `branch`.
#[allow(clippy::too_many_arguments)]
pub fn insert_comment(
    conn: &Connection,
    comment_id: i64,
    user_id: i64,
    key: &ActivityKey,
    branch: EngagementBranch,
    parent_comment_id: Option<i64>,
    content: &str,
    ts: &str,
) -> Result<()> {
    let depth = if parent_comment_id.is_some() {
        REPLY_DEPTH
    } else {
        ROOT_DEPTH
    };
    match branch {
        EngagementBranch::Review { kind, review_id } => {
            conn.execute(
                "INSERT INTO review_comments (
                    id, review_type, review_id, user_id, parent_comment_id, depth, content, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![comment_id, kind, review_id, user_id, parent_comment_id, depth, content, ts],
            )
            .context("Failed to insert review comment")?;
        }
        EngagementBranch::Activity { activity_id } => {
            conn.execute(
                "INSERT INTO activity_comments (
                    id, user_id, activity_id, activity_type, activity_user_id, item_id,
                    parent_comment_id, depth, content, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    comment_id,
                    user_id,
                    activity_id,
                    key.activity_type,
                    key.user_id,
                    key.item_id,
                    parent_comment_id,
                    depth,
                    content,
                    ts,
                ],
            )
            .context("Failed to insert activity comment")?;
        }
    }
    Ok(())
}

fn row_from(source: CommentSource, row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        source,
        user_id: row.get(1)?,
        parent_comment_id: row.get(2)?,
        depth: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn get_comment(conn: &Connection, comment: CommentRef) -> Result<Option<CommentRow>> {
    conn.query_row(
        &format!(
            "SELECT id, user_id, parent_comment_id, depth, content, created_at FROM {} WHERE id = ?",
            table_for(comment.source)
        ),
        params![comment.id],
        |row| row_from(comment.source, row),
    )
    .optional()
    .context("Failed to query comment")
}

/// Delete a comment and its replies. Returns false if it did not exist.
pub fn delete_comment(conn: &Connection, comment: CommentRef) -> Result<bool> {
    let table = table_for(comment.source);
    conn.execute(
        &format!("DELETE FROM {table} WHERE parent_comment_id = ?"),
        params![comment.id],
    )
    .context("Failed to delete replies")?;
    let deleted = conn
        .execute(&format!("DELETE FROM {table} WHERE id = ?"), params![comment.id])
        .context("Failed to delete comment")?;
    Ok(deleted > 0)
}

// ============================================================================
// Reads
// ============================================================================

/// Comments on a target: roots oldest first, each with its replies oldest
/// first.
pub fn list_thread(
    conn: &Connection,
    branch: EngagementBranch,
    key: &ActivityKey,
    viewer: Option<i64>,
) -> Result<Vec<Comment>> {
    let source = branch.comment_source();
    let (filter, values) = target_filter(branch, key);
    let mut stmt = conn
        .prepare(&format!(
            "SELECT c.id, c.user_id, c.parent_comment_id, c.depth, c.content, c.created_at,
                    u.username, u.display_name, u.avatar_url
             FROM {} c
             JOIN users u ON u.id = c.user_id
             WHERE {filter}
             ORDER BY c.created_at ASC, c.id ASC",
            table_for(source)
        ))
        .context("Failed to prepare comment query")?;

    let flat = stmt
        .query_map(rusqlite::params_from_iter(values), |row| {
            let base = row_from(source, row)?;
            Ok(Comment {
                id: base.id,
                source,
                user_id: base.user_id,
                username: row.get(6)?,
                display_name: row.get(7)?,
                avatar_url: row.get(8)?,
                parent_comment_id: base.parent_comment_id,
                depth: base.depth,
                content: base.content,
                created_at: base.created_at,
                is_mine: viewer == Some(base.user_id),
                replies: Vec::new(),
            })
        })
        .context("Failed to query comments")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read comments")?;

    Ok(build_tree(flat))
}

/// Nest replies under their roots, keeping input order. Replies whose root is
/// missing are dropped.
fn build_tree(flat: Vec<Comment>) -> Vec<Comment> {
    let mut replies: HashMap<i64, Vec<Comment>> = HashMap::new();
    let mut roots = Vec::new();
    for comment in flat {
        match comment.parent_comment_id {
            Some(parent) => replies.entry(parent).or_default().push(comment),
            None => roots.push(comment),
        }
    }
    for root in &mut roots {
        root.replies = replies.remove(&root.id).unwrap_or_default();
    }
    roots
}
