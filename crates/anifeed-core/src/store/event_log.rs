//! Append-only event log stored in the `event_log` table.
//!
//! Appends happen inside the same transaction as the mutation they describe,
//! so the log and the store never disagree after a commit.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::events::EventEnvelope;
use crate::store::fmt_ts;

/// Trait for append-only event log operations.
pub trait AppendLog {
    /// Append an event to the log, returning its sequence number.
    fn append(&self, event: &EventEnvelope) -> Result<i64>;

    /// Read all events in sequence order.
    fn read_all(&self) -> Result<Vec<EventEnvelope>> {
        self.read_from(0)
    }

    /// Read events with a sequence number greater than `after`.
    fn read_from(&self, after: i64) -> Result<Vec<EventEnvelope>>;

    /// Get the number of events in the log.
    fn len(&self) -> Result<usize>;

    /// Check if the log is empty.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// SQLite-backed event log borrowing a connection or transaction.
#[derive(Debug, Clone, Copy)]
pub struct EventLog<'c> {
    conn: &'c Connection,
}

impl<'c> EventLog<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Events performed by `actor`, in sequence order.
    pub fn for_actor(&self, actor: i64) -> Result<Vec<EventEnvelope>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM event_log WHERE actor = ? ORDER BY seq")
            .context("Failed to prepare actor event query")?;
        let payloads = stmt
            .query_map(params![actor], |row| row.get::<_, String>(0))
            .context("Failed to query actor events")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read actor events")?;
        payloads.iter().map(|p| parse_payload(p)).collect()
    }

    /// Distinct actors that have at least one logged event.
    pub fn actors(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT actor FROM event_log ORDER BY actor")
            .context("Failed to prepare actor list")?;
        let actors = stmt
            .query_map([], |row| row.get(0))
            .context("Failed to list actors")?
            .collect::<Result<Vec<i64>, _>>()
            .context("Failed to read actors")?;
        Ok(actors)
    }
}

impl AppendLog for EventLog<'_> {
    fn append(&self, event: &EventEnvelope) -> Result<i64> {
        let payload = event.to_json_line().context("Failed to serialize event")?;
        self.conn
            .execute(
                "INSERT INTO event_log (ts, actor, event_type, payload) VALUES (?, ?, ?, ?)",
                params![fmt_ts(&event.ts), event.actor, event.event.name(), payload],
            )
            .context("Failed to append event")?;
        Ok(self.conn.last_insert_rowid())
    }

    fn read_from(&self, after: i64) -> Result<Vec<EventEnvelope>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM event_log WHERE seq > ? ORDER BY seq")
            .context("Failed to prepare event query")?;
        let payloads = stmt
            .query_map(params![after], |row| row.get::<_, String>(0))
            .context("Failed to query events")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read events")?;
        payloads.iter().map(|p| parse_payload(p)).collect()
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))
            .context("Failed to count events")?;
        usize::try_from(count).context("Negative event count")
    }
}

fn parse_payload(payload: &str) -> Result<EventEnvelope> {
    EventEnvelope::from_json_line(payload)
        .with_context(|| format!("Failed to parse event: {payload}"))
}
