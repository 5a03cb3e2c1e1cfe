//! Users and the follow graph.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::domain::Language;

/// A registered user. `password_hash` is never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub preferred_language: Language,
    pub last_notification_check: Option<String>,
    pub created_at: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            display_name: row.get(4)?,
            avatar_url: row.get(5)?,
            preferred_language: row.get(6)?,
            last_notification_check: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

/// Fields supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub preferred_language: Language,
}

/// Soft profile fields after a change; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<Language>,
}

/// The denormalized author fields copied onto activities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorSnapshot {
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub otaku_score: i64,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, display_name, avatar_url,
     preferred_language, last_notification_check, created_at";

pub fn insert_user(conn: &Connection, id: i64, user: &NewUser, created_at: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO users (
            id, username, email, password_hash, display_name, avatar_url,
            preferred_language, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            user.username,
            user.email,
            user.password_hash,
            user.display_name,
            user.avatar_url,
            user.preferred_language,
            created_at,
        ],
    )
    .with_context(|| format!("Failed to insert user {}", user.username))?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
        params![id],
        UserRow::from_row,
    )
    .optional()
    .context("Failed to query user")
}

pub fn find_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"),
        params![username],
        UserRow::from_row,
    )
    .optional()
    .context("Failed to query user by username")
}

/// Whether `username` or `email` is already taken by a user other than `except`.
pub fn identity_taken(
    conn: &Connection,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<i64>,
) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM users
             WHERE (username = ?1 OR email = ?2) AND (?3 IS NULL OR id <> ?3)",
            params![username, email, except],
            |row| row.get(0),
        )
        .context("Failed to check identity uniqueness")?;
    Ok(count > 0)
}

pub fn update_profile(conn: &Connection, id: i64, change: &ProfileChange) -> Result<()> {
    conn.execute(
        "UPDATE users SET
            username = COALESCE(?, username),
            display_name = COALESCE(?, display_name),
            avatar_url = COALESCE(?, avatar_url),
            preferred_language = COALESCE(?, preferred_language)
         WHERE id = ?",
        params![
            change.username,
            change.display_name,
            change.avatar_url,
            change.preferred_language,
            id,
        ],
    )
    .context("Failed to update profile")?;
    Ok(())
}

pub fn set_notification_check(conn: &Connection, id: i64, ts: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET last_notification_check = ? WHERE id = ?",
        params![ts, id],
    )
    .context("Failed to update last_notification_check")?;
    Ok(())
}

pub fn list_user_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare("SELECT id FROM users ORDER BY id")
        .context("Failed to prepare user id query")?;
    let ids = stmt
        .query_map([], |row| row.get(0))
        .context("Failed to list users")?
        .collect::<Result<Vec<i64>, _>>()
        .context("Failed to read user ids")?;
    Ok(ids)
}

/// Author fields plus the user's current stored otaku score.
pub fn author_snapshot(conn: &Connection, id: i64) -> Result<Option<AuthorSnapshot>> {
    conn.query_row(
        "SELECT u.username, u.display_name, u.avatar_url, COALESCE(s.otaku_score, 0)
         FROM users u
         LEFT JOIN user_stats s ON s.user_id = u.id
         WHERE u.id = ?",
        params![id],
        |row| {
            Ok(AuthorSnapshot {
                username: row.get(0)?,
                display_name: row.get(1)?,
                avatar_url: row.get(2)?,
                otaku_score: row.get(3)?,
            })
        },
    )
    .optional()
    .context("Failed to query author snapshot")
}

// ============================================================================
// Follow graph
// ============================================================================

/// Insert a follow edge. Returns false if it already existed.
pub fn insert_follow(
    conn: &Connection,
    follower_id: i64,
    following_id: i64,
    ts: &str,
) -> Result<bool> {
    if follows(conn, follower_id, following_id)? {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO user_follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
        params![follower_id, following_id, ts],
    )
    .context("Failed to insert follow")?;
    Ok(true)
}

/// Delete a follow edge. Returns false if there was none.
pub fn delete_follow(conn: &Connection, follower_id: i64, following_id: i64) -> Result<bool> {
    let deleted = conn
        .execute(
            "DELETE FROM user_follows WHERE follower_id = ? AND following_id = ?",
            params![follower_id, following_id],
        )
        .context("Failed to delete follow")?;
    Ok(deleted > 0)
}

pub fn follows(conn: &Connection, follower_id: i64, following_id: i64) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM user_follows WHERE follower_id = ? AND following_id = ?",
            params![follower_id, following_id],
            |row| row.get(0),
        )
        .context("Failed to query follow")?;
    Ok(count > 0)
}

/// Ids of users that `follower_id` follows, ascending.
pub fn followees(conn: &Connection, follower_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare(
            "SELECT following_id FROM user_follows WHERE follower_id = ? ORDER BY following_id",
        )
        .context("Failed to prepare followees query")?;
    let ids = stmt
        .query_map(params![follower_id], |row| row.get(0))
        .context("Failed to query followees")?
        .collect::<Result<Vec<i64>, _>>()
        .context("Failed to read followees")?;
    Ok(ids)
}

/// Ids of users following `following_id`, ascending.
pub fn followers(conn: &Connection, following_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare(
            "SELECT follower_id FROM user_follows WHERE following_id = ? ORDER BY follower_id",
        )
        .context("Failed to prepare followers query")?;
    let ids = stmt
        .query_map(params![following_id], |row| row.get(0))
        .context("Failed to query followers")?
        .collect::<Result<Vec<i64>, _>>()
        .context("Failed to read followers")?;
    Ok(ids)
}
