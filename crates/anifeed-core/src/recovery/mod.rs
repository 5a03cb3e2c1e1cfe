//! Offline recovery: backfill of derived state and full replay of the event
//! log.
//!
//! Backfill is idempotent: it brings `user_stats`, the `activities`
//! projection and rank promotions back in line with the source tables
//! without touching sources. Replay is destructive: it rebuilds every
//! non-catalog table from `event_log`.

use std::cmp::Ordering;

use anyhow::Context;
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::CatalogCache;
use crate::core::CoreResult;
use crate::domain::{ActivityType, ItemKind};
use crate::events::{Event, EventEnvelope, RatingSet, ReviewWritten};
use crate::projection::{
    delete_activity_by_id, execute, get_activity_by_key, list_activities, list_promotions,
    post_command, project_promotion, rating_command, Activity, ActivityCommand,
};
use crate::stats::{self, plan_promotions, PlannedPromotion};
use crate::store::event_log::{AppendLog, EventLog};
use crate::store::sources::{list_posts, list_ratings, list_reviews};
use crate::store::users::{author_snapshot, list_user_ids};
use crate::store::{fmt_ts, parse_ts, FeedDb};
use crate::write::apply_event;

/// Counts from one backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub migrations_applied: usize,
    pub users_recomputed: usize,
    pub activities_inserted: usize,
    pub activities_updated: usize,
    pub activities_deleted: usize,
    /// Users whose promotions were rewritten
    pub promotion_users: usize,
    pub promotions_written: usize,
    /// Rated items skipped because the catalog entry is gone
    pub skipped_missing_catalog: usize,
}

/// Tables rebuilt by replay, children first.
const DERIVED_TABLES: &[&str] = &[
    "activity_comments",
    "activity_likes",
    "review_comments",
    "review_likes",
    "activities",
    "user_stats",
    "user_posts",
    "user_reviews",
    "character_reviews",
    "user_ratings",
    "character_ratings",
    "user_follows",
    "users",
];

/// Run migrations, recompute stats, reconcile activities and regenerate
/// promotions, all in one write transaction.
///
/// # Errors
///
/// Returns an error if a migration or any storage step fails; the
/// transaction is rolled back.
pub fn backfill(db: &FeedDb, catalog: &CatalogCache) -> CoreResult<BackfillReport> {
    let mut report = BackfillReport {
        migrations_applied: db.init_schema()?,
        ..BackfillReport::default()
    };
    let ts = fmt_ts(&Utc::now());

    let tx = db.begin_write()?;
    let users = list_user_ids(&tx)?;
    for user_id in &users {
        stats::recompute(&tx, *user_id, &ts)?;
    }
    report.users_recomputed = users.len();

    reconcile_activities(&tx, catalog, &ts, &mut report)?;

    for user_id in &users {
        let written = regenerate_promotions(&tx, *user_id, &ts)?;
        if let Some(count) = written {
            report.promotion_users += 1;
            report.promotions_written += count;
        }
    }

    tx.commit().context("Failed to commit backfill")?;

    info!(
        users = report.users_recomputed,
        inserted = report.activities_inserted,
        updated = report.activities_updated,
        deleted = report.activities_deleted,
        promotions = report.promotions_written,
        "backfill complete"
    );
    Ok(report)
}

fn apply_reconciled(
    conn: &Connection,
    command: &ActivityCommand,
    ts: &str,
    report: &mut BackfillReport,
) -> CoreResult<()> {
    match command {
        ActivityCommand::Upsert(draft) => match get_activity_by_key(conn, &draft.key)? {
            None => {
                execute(conn, command, ts)?;
                report.activities_inserted += 1;
            }
            Some(existing) if !draft.matches(&existing) => {
                execute(conn, command, ts)?;
                report.activities_updated += 1;
            }
            Some(_) => {}
        },
        ActivityCommand::Delete(key) => {
            if let Some(existing) = get_activity_by_key(conn, key)? {
                delete_activity_by_id(conn, existing.id, key)?;
                report.activities_deleted += 1;
            }
        }
        ActivityCommand::RefreshAuthor { .. } | ActivityCommand::InsertPromotion(_) => {}
    }
    Ok(())
}

fn reconcile_activities(
    conn: &Connection,
    catalog: &CatalogCache,
    ts: &str,
    report: &mut BackfillReport,
) -> CoreResult<()> {
    for kind in [ItemKind::Anime, ItemKind::Character] {
        for rating in list_ratings(conn, kind)? {
            match rating_command(conn, catalog, kind, rating.user_id, rating.item_id) {
                Ok(command) => apply_reconciled(conn, &command, ts, report)?,
                Err(crate::CoreError::CatalogMissing { kind, id }) => {
                    warn!(kind, id, user_id = rating.user_id, "rated item missing from catalog");
                    report.skipped_missing_catalog += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
    for post in list_posts(conn)? {
        let command = post_command(conn, post.user_id, post.id)?;
        apply_reconciled(conn, &command, ts, report)?;
    }

    // Orphans: activities whose source row is gone
    for activity in list_activities(conn)? {
        if let Some(command) = source_command(conn, catalog, &activity)? {
            if matches!(command, ActivityCommand::Delete(_)) {
                delete_activity_by_id(conn, activity.id, &activity.key())?;
                report.activities_deleted += 1;
            }
        }
    }
    Ok(())
}

/// Command derived from the source row behind `activity`, `None` for
/// promotions and for rated items whose catalog entry is gone.
fn source_command(
    conn: &Connection,
    catalog: &CatalogCache,
    activity: &Activity,
) -> CoreResult<Option<ActivityCommand>> {
    let Some(item_id) = activity.item_id else {
        return Ok(None);
    };
    let command = match activity.activity_type {
        ActivityType::AnimeRating | ActivityType::CharacterRating => {
            let Some(kind) = activity.activity_type.item_kind() else {
                return Ok(None);
            };
            match rating_command(conn, catalog, kind, activity.user_id, item_id) {
                Ok(command) => command,
                Err(crate::CoreError::CatalogMissing { .. }) => return Ok(None),
                Err(err) => return Err(err),
            }
        }
        ActivityType::UserPost => post_command(conn, activity.user_id, item_id)?,
        ActivityType::RankPromotion => return Ok(None),
    };
    Ok(Some(command))
}

/// The user's stats-relevant history, from the event log when it has any,
/// otherwise synthesized from current source rows.
fn score_history(conn: &Connection, user_id: i64) -> CoreResult<Vec<EventEnvelope>> {
    let logged: Vec<_> = EventLog::new(conn)
        .for_actor(user_id)?
        .into_iter()
        .filter(|e| e.event.affects_stats())
        .collect();
    if !logged.is_empty() {
        return Ok(logged);
    }

    let mut synthesized = Vec::new();
    for kind in [ItemKind::Anime, ItemKind::Character] {
        for rating in crate::store::sources::user_ratings(conn, kind, user_id)? {
            synthesized.push(EventEnvelope::at(
                parse_ts(&rating.created_at)?,
                user_id,
                Event::RatingSet(RatingSet {
                    kind,
                    item_id: rating.item_id,
                    rating: rating.rating,
                    status: rating.status,
                    card: None,
                }),
            ));
        }
        for review in list_reviews(conn, kind)?
            .into_iter()
            .filter(|r| r.user_id == user_id)
        {
            synthesized.push(EventEnvelope::at(
                parse_ts(&review.created_at)?,
                user_id,
                Event::ReviewWritten(ReviewWritten {
                    kind,
                    item_id: review.item_id,
                    title: review.title,
                    content: review.content,
                    is_spoiler: review.is_spoiler,
                    rating: None,
                    card: None,
                }),
            ));
        }
    }
    // Ratings sort before reviews at equal timestamps
    synthesized.sort_by(|a, b| {
        a.ts.cmp(&b.ts).then_with(|| match (&a.event, &b.event) {
            (Event::RatingSet(_), Event::ReviewWritten(_)) => Ordering::Less,
            (Event::ReviewWritten(_), Event::RatingSet(_)) => Ordering::Greater,
            _ => Ordering::Equal,
        })
    });
    Ok(synthesized)
}

fn promotion_matches(existing: &[Activity], planned: &[PlannedPromotion]) -> bool {
    existing.len() == planned.len()
        && existing.iter().zip(planned).all(|(row, plan)| {
            row.promotion_threshold == Some(plan.threshold)
                && row.metadata == Some(plan.metadata)
                && row.activity_time == plan.activity_time
        })
}

/// Rewrite a user's promotions to match their history. Returns the number
/// written, or `None` when they already matched.
fn regenerate_promotions(conn: &Connection, user_id: i64, ts: &str) -> CoreResult<Option<usize>> {
    let history = score_history(conn, user_id)?;
    let mut planned = plan_promotions(&history);
    planned.sort_by_key(|p| p.threshold);

    let existing = list_promotions(conn, user_id)?;
    if promotion_matches(&existing, &planned) {
        return Ok(None);
    }

    for row in &existing {
        delete_activity_by_id(conn, row.id, &row.key())?;
    }
    let Some(author) = author_snapshot(conn, user_id)? else {
        return Ok(Some(0));
    };
    for plan in &planned {
        let command = project_promotion(user_id, &author, plan.threshold, plan.metadata, &plan.activity_time);
        execute(conn, &command, ts)?;
    }
    info!(user_id, promotions = planned.len(), "regenerated promotions");
    Ok(Some(planned.len()))
}

/// Wipe every table derived from the event log and replay the log into
/// them. Returns the number of events replayed.
///
/// # Errors
///
/// Returns an error if the log cannot be read or an event fails to apply;
/// the transaction is rolled back and the store is left unchanged.
pub fn rebuild_from_log(db: &FeedDb, catalog: &CatalogCache) -> CoreResult<usize> {
    let tx = db.begin_write()?;
    let events = EventLog::new(&tx).read_all()?;

    for table in DERIVED_TABLES {
        tx.execute(&format!("DELETE FROM {table}"), [])
            .with_context(|| format!("Failed to clear {table}"))?;
        tx.execute("DELETE FROM sqlite_sequence WHERE name = ?", [table])
            .context("Failed to reset sqlite_sequence")?;
    }
    catalog.clear();

    for envelope in &events {
        apply_event(&tx, catalog, envelope)?;
    }

    tx.commit().context("Failed to commit replay")?;
    info!(events = events.len(), "rebuilt store from event log");
    Ok(events.len())
}
