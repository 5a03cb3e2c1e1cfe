//! Applying events to the store.
//!
//! [`apply_event`] is the single place where an accepted event mutates source
//! tables, re-derives the affected activity and refreshes stats. Service verbs
//! call [`commit`], which applies and logs inside the caller's transaction;
//! log replay calls [`apply_event`] directly.
//!
//! Events that reproject a rating carry the catalog card the live write used,
//! so replay projects the same titles even after later curator edits.

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::catalog::{CatalogCache, ItemCard};
use crate::comments::{self, CommentRef};
use crate::core::{CoreError, CoreResult};
use crate::domain::ItemKind;
use crate::engagement;
use crate::events::{Event, EventEnvelope};
use crate::projection::{refresh_author, reproject_post, reproject_rating};
use crate::stats;
use crate::store::event_log::{AppendLog, EventLog};
use crate::store::sources;
use crate::store::users;
use crate::store::{fmt_ts, with_savepoint};

/// Apply `envelope` and append it to the event log. Returns the log sequence
/// number.
///
/// Catalog cards are resolved into the envelope before it is applied, so the
/// logged payload is exactly what was projected.
///
/// Must run inside a write transaction; on error the caller drops the
/// transaction and nothing is persisted.
///
/// # Errors
///
/// Returns an error if the store mutation, its projection, or the log append
/// fails.
pub fn commit(conn: &Connection, catalog: &CatalogCache, envelope: &mut EventEnvelope) -> CoreResult<i64> {
    capture_card(conn, catalog, &mut envelope.event)?;
    apply_event(conn, catalog, envelope)?;
    let seq = EventLog::new(conn).append(envelope)?;
    debug!(seq, event = envelope.event.name(), actor = envelope.actor, "committed event");
    Ok(seq)
}

/// Apply one event to source tables and the projection, then refresh the
/// actor's stats if the event counts toward them.
///
/// Stats refresh runs in a savepoint; its failure is logged and does not fail
/// the event.
///
/// # Errors
///
/// Returns an error if the source mutation or its projection fails.
pub fn apply_event(conn: &Connection, catalog: &CatalogCache, envelope: &EventEnvelope) -> CoreResult<()> {
    let ts = fmt_ts(&envelope.ts);
    let actor = envelope.actor;

    match &envelope.event {
        Event::UserRegistered(e) => {
            users::insert_user(conn, e.user_id, &e.user, &ts)?;
        }
        Event::ProfileChanged(e) => {
            users::update_profile(conn, actor, &e.change)?;
            refresh_author(conn, actor, &ts)?;
        }
        Event::Followed(e) => {
            if !users::insert_follow(conn, actor, e.following_id, &ts)? {
                return Err(CoreError::conflict(format!(
                    "user {actor} already follows {}",
                    e.following_id
                )));
            }
        }
        Event::Unfollowed(e) => {
            if !users::delete_follow(conn, actor, e.following_id)? {
                return Err(CoreError::not_found(
                    "follow",
                    format!("{actor}->{}", e.following_id),
                ));
            }
        }
        Event::RatingSet(e) => {
            let card = require_card(conn, catalog, e.kind, e.item_id, e.card.as_ref())?;
            sources::upsert_rating(conn, e.kind, actor, e.item_id, e.rating, &e.status, &ts)?;
            reproject_rating(conn, Some(&card), e.kind, actor, e.item_id, &ts)?;
        }
        Event::RatingDeleted(e) => {
            sources::delete_review(conn, e.kind, actor, e.item_id)?;
            sources::delete_rating(conn, e.kind, actor, e.item_id)?;
            reproject_rating(conn, None, e.kind, actor, e.item_id, &ts)?;
        }
        Event::ReviewWritten(e) => {
            let card = require_card(conn, catalog, e.kind, e.item_id, e.card.as_ref())?;
            if let Some(rating) = e.rating {
                sources::upsert_rating(conn, e.kind, actor, e.item_id, Some(rating), sources::RATED, &ts)?;
            }
            sources::upsert_review(
                conn,
                e.kind,
                actor,
                e.item_id,
                e.title.as_deref(),
                &e.content,
                e.is_spoiler,
                &ts,
            )?;
            reproject_rating(conn, Some(&card), e.kind, actor, e.item_id, &ts)?;
        }
        Event::ReviewDeleted(e) => {
            let card = logged_or_live(conn, catalog, e.kind, e.item_id, e.card.as_ref())?;
            sources::delete_review(conn, e.kind, actor, e.item_id)?;
            reproject_rating(conn, card.as_ref(), e.kind, actor, e.item_id, &ts)?;
        }
        Event::PostCreated(e) => {
            sources::insert_post(conn, e.post_id, actor, &e.content, &ts)?;
            reproject_post(conn, actor, e.post_id, &ts)?;
        }
        Event::PostEdited(e) => {
            sources::update_post(conn, e.post_id, &e.content, &ts)?;
            reproject_post(conn, actor, e.post_id, &ts)?;
        }
        Event::PostDeleted(e) => {
            sources::delete_post(conn, e.post_id)?;
            reproject_post(conn, actor, e.post_id, &ts)?;
        }
        Event::Liked(e) => {
            if !engagement::insert_like(conn, actor, &e.target, e.branch, &ts)? {
                return Err(CoreError::conflict(format!(
                    "user {actor} already liked {}",
                    e.target
                )));
            }
        }
        Event::Unliked(e) => {
            if !engagement::delete_like(conn, actor, &e.target, e.branch)? {
                return Err(CoreError::not_found("like", e.target));
            }
        }
        Event::CommentAdded(e) => {
            comments::insert_comment(
                conn,
                e.comment_id,
                actor,
                &e.target,
                e.branch,
                e.parent_comment_id,
                &e.content,
                &ts,
            )?;
        }
        Event::CommentDeleted(e) => {
            let comment = CommentRef {
                source: e.source,
                id: e.comment_id,
            };
            if !comments::delete_comment(conn, comment)? {
                return Err(CoreError::not_found("comment", e.comment_id));
            }
        }
    }

    if envelope.event.affects_stats() {
        if let Err(err) = with_savepoint(conn, "stats_refresh", |c| stats::refresh(c, actor, &ts)) {
            warn!(user_id = actor, error = %format!("{err:#}"), "stats refresh failed");
        }
    }

    Ok(())
}

/// Fill in the catalog card of events that reproject a rating.
fn capture_card(conn: &Connection, catalog: &CatalogCache, event: &mut Event) -> CoreResult<()> {
    let (kind, item_id, slot) = match event {
        Event::RatingSet(e) => (e.kind, e.item_id, &mut e.card),
        Event::ReviewWritten(e) => (e.kind, e.item_id, &mut e.card),
        Event::ReviewDeleted(e) => (e.kind, e.item_id, &mut e.card),
        _ => return Ok(()),
    };
    if slot.is_none() {
        *slot = catalog.item(conn, kind, item_id)?.map(|card| ItemCard::clone(&card));
    }
    Ok(())
}

/// The logged card, or the live catalog entry for entries logged without one.
fn logged_or_live(
    conn: &Connection,
    catalog: &CatalogCache,
    kind: ItemKind,
    id: i64,
    logged: Option<&ItemCard>,
) -> CoreResult<Option<ItemCard>> {
    if let Some(card) = logged {
        return Ok(Some(card.clone()));
    }
    Ok(catalog.item(conn, kind, id)?.map(|card| ItemCard::clone(&card)))
}

fn require_card(
    conn: &Connection,
    catalog: &CatalogCache,
    kind: ItemKind,
    id: i64,
    logged: Option<&ItemCard>,
) -> CoreResult<ItemCard> {
    logged_or_live(conn, catalog, kind, id, logged)?.ok_or(CoreError::CatalogMissing {
        kind: kind.as_str(),
        id,
    })
}
