//! CLI command implementations.

pub mod admin;
pub mod catalog;
pub mod engagement;
pub mod feed;
pub mod helpers;
pub mod sources;
pub mod users;

pub use admin::{run_backfill, run_rebuild};
pub use catalog::run_catalog;
pub use engagement::{run_comment, run_like};
pub use feed::{run_activity, run_feed, run_notifications, run_stats, FeedArgs};
pub use helpers::open_session;
pub use sources::{run_post, run_rate, run_review, run_unrate};
pub use users::run_user;
