//! Implementation of like and comment commands.

use anyhow::Result;

use anifeed_core::domain::ActivityTarget;

use crate::cli::commands::helpers::Session;
use crate::cli::CommentCommands;
use crate::output::{Formatter, OutputFormat};

pub fn run_like(session: &Session, activity_id: i64, like: bool, format: OutputFormat) -> Result<()> {
    let viewer = session.actor()?;
    let engagement = session.services.engagement();
    let target = ActivityTarget::Id(activity_id);
    let state = if like {
        engagement.like(viewer, target)?
    } else {
        engagement.unlike(viewer, target)?
    };

    Formatter::new(format).print(&serde_json::json!({
        "activity_id": activity_id,
        "likes_count": state.likes_count,
        "comments_count": state.comments_count,
        "user_liked": state.user_liked,
    }))
}

pub fn run_comment(session: &Session, cmd: CommentCommands, format: OutputFormat) -> Result<()> {
    let comments = session.services.comments();
    let formatter = Formatter::new(format);

    match cmd {
        CommentCommands::Add {
            activity_id,
            content,
            reply_to,
        } => {
            let row = comments.add(
                session.actor()?,
                ActivityTarget::Id(activity_id),
                &content,
                reply_to,
            )?;
            formatter.print(&row)?;
        }
        CommentCommands::List { activity_id } => {
            let thread = comments.list(ActivityTarget::Id(activity_id), session.viewer)?;
            formatter.print_list(&thread, "No comments yet", "comments")?;
        }
        CommentCommands::Delete { source, comment_id } => {
            comments.delete(
                session.actor()?,
                anifeed_core::comments::CommentRef {
                    source,
                    id: comment_id,
                },
            )?;
            formatter.print(&serde_json::json!({
                "comment_id": comment_id,
                "source": source,
                "deleted": true,
            }))?;
        }
    }

    Ok(())
}
