//! Implementation of feed, activity, stats and notification commands.

use anyhow::Result;

use anifeed_core::domain::{ActivityTarget, ActivityType};
use anifeed_core::feed::FeedQuery;

use crate::cli::commands::helpers::Session;
use crate::cli::NotificationCommands;
use crate::output::{Formatter, OutputFormat};

/// Filters accepted by `anifeed feed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedArgs {
    pub activity_type: Option<ActivityType>,
    pub user_id: Option<i64>,
    pub item_id: Option<i64>,
    pub following: bool,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl FeedArgs {
    fn to_query(self, default_limit: i64) -> FeedQuery {
        let mut query = FeedQuery {
            activity_type: self.activity_type,
            user_id: self.user_id,
            item_id: self.item_id,
            ..FeedQuery::default()
        }
        .page(self.limit.unwrap_or(default_limit), self.offset);
        if self.following {
            query = query.following();
        }
        query
    }
}

pub fn run_feed(session: &Session, args: FeedArgs, format: OutputFormat) -> Result<()> {
    let default_limit = i64::from(session.services.config().default_page_size);
    let page = session
        .services
        .feed()
        .query(&args.to_query(default_limit), session.viewer)?;

    let formatter = Formatter::new(format);
    match format {
        OutputFormat::Json => formatter.print(&page),
        OutputFormat::Text => formatter.print_list(&page.items, "No activity yet", "items"),
    }
}

pub fn run_activity(
    session: &Session,
    activity_id: i64,
    with_comments: bool,
    format: OutputFormat,
) -> Result<()> {
    let item = session.services.feed().get(activity_id, session.viewer)?;
    let formatter = Formatter::new(format);
    if with_comments {
        let comments = session
            .services
            .comments()
            .list(ActivityTarget::Id(activity_id), session.viewer)?;
        formatter.print(&serde_json::json!({
            "activity": item,
            "comments": comments,
        }))
    } else {
        formatter.print(&item)
    }
}

pub fn run_stats(session: &Session, user_id: i64, format: OutputFormat) -> Result<()> {
    Formatter::new(format).print(&session.services.stats().get(user_id)?)
}

pub fn run_notifications(
    session: &Session,
    cmd: NotificationCommands,
    format: OutputFormat,
) -> Result<()> {
    let viewer = session.actor()?;
    let notifications = session.services.notifications();
    let formatter = Formatter::new(format);

    match cmd {
        NotificationCommands::List { limit } => {
            formatter.print_list(
                &notifications.list(viewer, limit)?,
                "No notifications",
                "notifications",
            )?;
        }
        NotificationCommands::Count => {
            formatter.print(&serde_json::json!({
                "user_id": viewer,
                "unread": notifications.unread_count(viewer)?,
            }))?;
        }
        NotificationCommands::Check => {
            let checked_at = notifications.mark_checked(viewer)?;
            formatter.print(&serde_json::json!({
                "user_id": viewer,
                "last_notification_check": checked_at,
            }))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_args_fall_back_to_default_limit() {
        let query = FeedArgs::default().to_query(20);
        assert_eq!(query.limit, 20);
        assert_eq!(query.offset, 0);
        assert!(!query.following_only);
    }

    #[test]
    fn test_feed_args_carry_filters() {
        let args = FeedArgs {
            activity_type: Some(ActivityType::AnimeRating),
            item_id: Some(16498),
            following: true,
            limit: Some(5),
            offset: 10,
            ..FeedArgs::default()
        };
        let query = args.to_query(20);
        assert_eq!(query.activity_type, Some(ActivityType::AnimeRating));
        assert_eq!(query.item_id, Some(16498));
        assert!(query.following_only);
        assert_eq!((query.limit, query.offset), (5, 10));
    }
}
