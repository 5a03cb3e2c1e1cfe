//! Per-user aggregate stats and rank promotions.
//!
//! Stats are always recomputed from the source tables, never incremented, so
//! a refresh after any mutation (or a later repair) converges to the same
//! values. The new score is copied onto the user's activities in the same
//! step.

#![allow(clippy::missing_errors_doc)]

pub mod rank;

pub use rank::{
    crossed_thresholds, otaku_score, plan_promotions, rank_for, PlannedPromotion, RankInfo,
    RANK_THRESHOLDS,
};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use crate::projection::{execute, list_promotions, project_promotion};
use crate::store::users::author_snapshot;

/// Stored `user_stats` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub user_id: i64,
    pub total_rated: i64,
    pub total_character_ratings: i64,
    pub total_reviews: i64,
    pub total_watch_time_minutes: i64,
    pub otaku_score: i64,
    pub favorite_genre: Option<String>,
    pub updated_at: String,
}

impl UserStats {
    /// Zeroed stats for a user with no stats row yet.
    #[must_use]
    pub fn empty(user_id: i64, updated_at: &str) -> Self {
        Self {
            user_id,
            total_rated: 0,
            total_character_ratings: 0,
            total_reviews: 0,
            total_watch_time_minutes: 0,
            otaku_score: 0,
            favorite_genre: None,
            updated_at: updated_at.to_string(),
        }
    }
}

/// Aggregates computed from the source tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsTotals {
    pub total_rated: i64,
    pub total_character_ratings: i64,
    pub total_reviews: i64,
    pub total_watch_time_minutes: i64,
    pub favorite_genre: Option<String>,
}

impl StatsTotals {
    #[must_use]
    pub const fn otaku_score(&self) -> i64 {
        otaku_score(
            self.total_rated,
            self.total_character_ratings,
            self.total_reviews,
        )
    }
}

/// Outcome of a stats refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRefresh {
    pub previous_score: i64,
    pub otaku_score: i64,
    /// Thresholds for which a promotion was inserted
    pub promoted: Vec<i64>,
}

fn count(conn: &Connection, sql: &str, user_id: i64) -> Result<i64> {
    conn.query_row(sql, params![user_id], |row| row.get(0))
        .with_context(|| format!("Failed to compute stat: {sql}"))
}

/// Compute a user's aggregates from the source tables.
pub fn compute_totals(conn: &Connection, user_id: i64) -> Result<StatsTotals> {
    let total_rated = count(
        conn,
        "SELECT COUNT(*) FROM user_ratings WHERE user_id = ? AND status = 'RATED'",
        user_id,
    )?;
    let total_character_ratings = count(
        conn,
        "SELECT COUNT(*) FROM character_ratings WHERE user_id = ? AND rating IS NOT NULL",
        user_id,
    )?;
    let total_reviews = count(
        conn,
        "SELECT (SELECT COUNT(*) FROM user_reviews WHERE user_id = ?1)
              + (SELECT COUNT(*) FROM character_reviews WHERE user_id = ?1)",
        user_id,
    )?;
    let total_watch_time_minutes = count(
        conn,
        "SELECT COALESCE(SUM(COALESCE(a.episodes, 0) * COALESCE(a.duration, 24)), 0)
         FROM user_ratings r
         JOIN anime a ON a.id = r.anime_id
         WHERE r.user_id = ? AND r.status = 'RATED'",
        user_id,
    )?;
    let favorite_genre = conn
        .query_row(
            "SELECT g.genre
             FROM user_ratings r
             JOIN anime_genres g ON g.anime_id = r.anime_id
             WHERE r.user_id = ? AND r.status = 'RATED'
             GROUP BY g.genre
             ORDER BY COUNT(DISTINCT r.anime_id) DESC, g.genre ASC
             LIMIT 1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to compute favorite genre")?;

    Ok(StatsTotals {
        total_rated,
        total_character_ratings,
        total_reviews,
        total_watch_time_minutes,
        favorite_genre,
    })
}

pub fn get_stats(conn: &Connection, user_id: i64) -> Result<Option<UserStats>> {
    conn.query_row(
        "SELECT user_id, total_rated, total_character_ratings, total_reviews,
                total_watch_time_minutes, otaku_score, favorite_genre, updated_at
         FROM user_stats WHERE user_id = ?",
        params![user_id],
        |row| {
            Ok(UserStats {
                user_id: row.get(0)?,
                total_rated: row.get(1)?,
                total_character_ratings: row.get(2)?,
                total_reviews: row.get(3)?,
                total_watch_time_minutes: row.get(4)?,
                otaku_score: row.get(5)?,
                favorite_genre: row.get(6)?,
                updated_at: row.get(7)?,
            })
        },
    )
    .optional()
    .context("Failed to query user stats")
}

/// Stored score, 0 for a user without a stats row.
pub fn stored_score(conn: &Connection, user_id: i64) -> Result<i64> {
    Ok(get_stats(conn, user_id)?.map_or(0, |s| s.otaku_score))
}

fn write_stats(conn: &Connection, user_id: i64, totals: &StatsTotals, ts: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO user_stats (
            user_id, total_rated, total_character_ratings, total_reviews,
            total_watch_time_minutes, otaku_score, favorite_genre, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id) DO UPDATE SET
            total_rated = excluded.total_rated,
            total_character_ratings = excluded.total_character_ratings,
            total_reviews = excluded.total_reviews,
            total_watch_time_minutes = excluded.total_watch_time_minutes,
            otaku_score = excluded.otaku_score,
            favorite_genre = excluded.favorite_genre,
            updated_at = excluded.updated_at",
        params![
            user_id,
            totals.total_rated,
            totals.total_character_ratings,
            totals.total_reviews,
            totals.total_watch_time_minutes,
            totals.otaku_score(),
            totals.favorite_genre,
            ts,
        ],
    )
    .context("Failed to write user stats")?;
    Ok(())
}

/// Copy `score` onto every activity of the user that still carries another
/// value. Returns the number of rows touched.
fn sync_activity_scores(conn: &Connection, user_id: i64, score: i64) -> Result<usize> {
    conn.execute(
        "UPDATE activities SET otaku_score = ?1 WHERE user_id = ?2 AND otaku_score <> ?1",
        params![score, user_id],
    )
    .context("Failed to sync activity scores")
}

/// Recompute and store a user's stats without emitting promotions.
///
/// Returns `(previous_score, new_score)`.
pub fn recompute(conn: &Connection, user_id: i64, ts: &str) -> Result<(i64, i64)> {
    let previous = stored_score(conn, user_id)?;
    let totals = compute_totals(conn, user_id)?;
    write_stats(conn, user_id, &totals, ts)?;
    let score = totals.otaku_score();
    sync_activity_scores(conn, user_id, score)?;
    Ok((previous, score))
}

/// Recompute a user's stats after a source mutation at `ts`, and insert a
/// rank promotion for every threshold the score newly reaches.
///
/// Promotions are never removed when the score drops.
pub fn refresh(conn: &Connection, user_id: i64, ts: &str) -> Result<StatsRefresh> {
    let (previous_score, otaku_score) = recompute(conn, user_id, ts)?;

    let held: Vec<i64> = list_promotions(conn, user_id)?
        .iter()
        .filter_map(|p| p.promotion_threshold)
        .collect();
    let crossings: Vec<_> = crossed_thresholds(previous_score, otaku_score)
        .into_iter()
        .filter(|c| !held.contains(&c.threshold))
        .collect();
    let mut promoted = Vec::with_capacity(crossings.len());
    if !crossings.is_empty() {
        let author = author_snapshot(conn, user_id)?
            .with_context(|| format!("User {user_id} vanished during stats refresh"))?;
        for crossing in crossings {
            let command =
                project_promotion(user_id, &author, crossing.threshold, crossing.metadata, ts);
            execute(conn, &command, ts)?;
            info!(
                user_id,
                threshold = crossing.threshold,
                new_level = crossing.metadata.new_level,
                "rank promotion"
            );
            promoted.push(crossing.threshold);
        }
    }

    Ok(StatsRefresh {
        previous_score,
        otaku_score,
        promoted,
    })
}
