//! anifeed - activity feed over anime ratings, reviews and posts

use anyhow::Result;
use clap::Parser;

mod cli;
mod output;
mod telemetry;

use cli::commands::{
    open_session, run_activity, run_backfill, run_catalog, run_comment, run_feed, run_like,
    run_notifications, run_post, run_rate, run_rebuild, run_review, run_stats, run_unrate,
    run_user, FeedArgs,
};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_json);

    let session = open_session(cli.db.as_deref(), cli.as_user)?;
    let format = cli.format;

    match cli.command {
        Commands::User(cmd) => run_user(&session, cmd, format)?,
        Commands::Catalog(cmd) => run_catalog(&session, cmd, format)?,

        Commands::Rate {
            kind,
            item_id,
            status,
            rating,
        } => run_rate(&session, kind, item_id, &status, rating, format)?,
        Commands::Unrate { kind, item_id } => run_unrate(&session, kind, item_id, format)?,
        Commands::Review(cmd) => run_review(&session, cmd, format)?,
        Commands::Post(cmd) => run_post(&session, cmd, format)?,

        Commands::Like { activity_id } => run_like(&session, activity_id, true, format)?,
        Commands::Unlike { activity_id } => run_like(&session, activity_id, false, format)?,
        Commands::Comment(cmd) => run_comment(&session, cmd, format)?,

        Commands::Feed {
            activity_type,
            user,
            item,
            following,
            limit,
            offset,
        } => run_feed(
            &session,
            FeedArgs {
                activity_type,
                user_id: user,
                item_id: item,
                following,
                limit,
                offset,
            },
            format,
        )?,
        Commands::Activity {
            activity_id,
            comments,
        } => run_activity(&session, activity_id, comments, format)?,
        Commands::Stats { user_id } => run_stats(&session, user_id, format)?,
        Commands::Notifications(cmd) => run_notifications(&session, cmd, format)?,

        Commands::Backfill => run_backfill(&session, format)?,
        Commands::Rebuild => run_rebuild(&session, format)?,
    }

    Ok(())
}
