//! Implementation of `anifeed backfill` and `anifeed rebuild`.

use anyhow::Result;

use crate::cli::commands::helpers::Session;
use crate::output::{Formatter, OutputFormat};

pub fn run_backfill(session: &Session, format: OutputFormat) -> Result<()> {
    let report = session.services.recovery().backfill()?;
    Formatter::new(format).print(&report)
}

pub fn run_rebuild(session: &Session, format: OutputFormat) -> Result<()> {
    let replayed = session.services.recovery().rebuild_from_log()?;
    Formatter::new(format).print(&serde_json::json!({ "events_replayed": replayed }))
}
