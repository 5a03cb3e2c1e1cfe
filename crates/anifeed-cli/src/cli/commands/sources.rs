//! Implementation of rating, review and post commands.

use anyhow::Result;

use anifeed_core::core::sources::ReviewInput;
use anifeed_core::domain::ItemKind;

use crate::cli::commands::helpers::Session;
use crate::cli::{PostCommands, ReviewCommands};
use crate::output::{Formatter, OutputFormat};

/// Rate an item and print the resulting activity, if one exists.
pub fn run_rate(
    session: &Session,
    kind: ItemKind,
    item_id: i64,
    status: &str,
    rating: Option<f64>,
    format: OutputFormat,
) -> Result<()> {
    let user_id = session.actor()?;
    let activity = session.services.ratings().rate(user_id, kind, item_id, rating, status)?;
    let row = session.services.ratings().get(user_id, kind, item_id)?;

    Formatter::new(format).print(&serde_json::json!({
        "rating": row,
        "activity": activity,
    }))
}

pub fn run_unrate(session: &Session, kind: ItemKind, item_id: i64, format: OutputFormat) -> Result<()> {
    let user_id = session.actor()?;
    session.services.ratings().delete(user_id, kind, item_id)?;
    Formatter::new(format).print(&serde_json::json!({
        "user_id": user_id,
        "kind": kind,
        "item_id": item_id,
        "deleted": true,
    }))
}

pub fn run_review(session: &Session, cmd: ReviewCommands, format: OutputFormat) -> Result<()> {
    let reviews = session.services.reviews();
    let formatter = Formatter::new(format);

    match cmd {
        ReviewCommands::Write {
            kind,
            item_id,
            content,
            title,
            spoiler,
            rating,
        } => {
            let review = reviews.write(
                session.actor()?,
                kind,
                item_id,
                ReviewInput {
                    title,
                    content,
                    is_spoiler: spoiler,
                    rating,
                },
            )?;
            formatter.print(&review)?;
        }
        ReviewCommands::Delete { kind, item_id } => {
            let user_id = session.actor()?;
            reviews.delete(user_id, kind, item_id)?;
            formatter.print(&serde_json::json!({
                "user_id": user_id,
                "kind": kind,
                "item_id": item_id,
                "deleted": true,
            }))?;
        }
        ReviewCommands::Show {
            user_id,
            kind,
            item_id,
        } => formatter.print(&reviews.get(user_id, kind, item_id)?)?,
    }

    Ok(())
}

pub fn run_post(session: &Session, cmd: PostCommands, format: OutputFormat) -> Result<()> {
    let posts = session.services.posts();
    let formatter = Formatter::new(format);
    let user_id = session.actor()?;

    match cmd {
        PostCommands::Create { content } => formatter.print(&posts.create(user_id, &content)?)?,
        PostCommands::Edit { post_id, content } => {
            formatter.print(&posts.edit(user_id, post_id, &content)?)?;
        }
        PostCommands::Delete { post_id } => {
            posts.delete(user_id, post_id)?;
            formatter.print(&serde_json::json!({ "id": post_id, "deleted": true }))?;
        }
    }

    Ok(())
}
