//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use anifeed_core::domain::{ActivityType, CommentSource, ItemKind, Language};

use crate::output::OutputFormat;

pub mod commands;

/// Activity feed over anime ratings, reviews and posts
#[derive(Parser, Debug)]
#[command(name = "anifeed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Database path (default: $ANIFEED_DB or ./anifeed.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Acting user id (default: $ANIFEED_USER)
    #[arg(long = "as", global = true)]
    pub as_user: Option<i64>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users and follows
    #[command(subcommand)]
    User(UserCommands),

    /// Manage the anime and character catalog
    #[command(subcommand)]
    Catalog(CatalogCommands),

    /// Rate an anime or character
    Rate {
        kind: ItemKind,
        item_id: i64,

        /// Rating status (RATED, WANT_TO_WATCH, PASS, WANT_TO_KNOW, NOT_INTERESTED)
        #[arg(long)]
        status: String,

        /// Score from 0.5 to 5.0 in half steps, required when RATED
        #[arg(long)]
        rating: Option<f64>,
    },

    /// Delete a rating together with its review
    Unrate { kind: ItemKind, item_id: i64 },

    /// Manage reviews
    #[command(subcommand)]
    Review(ReviewCommands),

    /// Manage free-form posts
    #[command(subcommand)]
    Post(PostCommands),

    /// Like an activity
    Like { activity_id: i64 },

    /// Remove a like from an activity
    Unlike { activity_id: i64 },

    /// Manage comments on activities
    #[command(subcommand)]
    Comment(CommentCommands),

    /// Show a page of the activity feed
    Feed {
        /// Only activities of this type
        #[arg(long = "type")]
        activity_type: Option<ActivityType>,

        /// Only activities by this user
        #[arg(long)]
        user: Option<i64>,

        /// Only activities about this item (requires --type)
        #[arg(long)]
        item: Option<i64>,

        /// Only activities by users the acting user follows
        #[arg(long)]
        following: bool,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Show one activity with its engagement
    Activity {
        activity_id: i64,

        /// Include the comment thread
        #[arg(long)]
        comments: bool,
    },

    /// Show a user's stats and rank
    Stats { user_id: i64 },

    /// Notifications for the acting user
    #[command(subcommand)]
    Notifications(NotificationCommands),

    /// Reconcile stats, activities and promotions with the source tables
    Backfill,

    /// Rebuild all non-catalog tables by replaying the event log
    Rebuild,
}

// ============================================================================
// User subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a new user
    Create {
        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,

        /// Pre-computed password hash
        #[arg(long)]
        password_hash: String,

        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        avatar_url: Option<String>,

        #[arg(long, default_value_t = Language::default())]
        language: Language,
    },

    /// Change the acting user's profile
    Update {
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        avatar_url: Option<String>,

        #[arg(long)]
        language: Option<Language>,
    },

    /// Show a user profile with stats and follow counts
    Show { user_id: i64 },

    /// Look up a user by username
    Find { username: String },

    /// Follow a user
    Follow { user_id: i64 },

    /// Stop following a user
    Unfollow { user_id: i64 },

    /// Ids of users following this user
    Followers { user_id: i64 },

    /// Ids of users this user follows
    Following { user_id: i64 },
}

// ============================================================================
// Catalog subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum CatalogCommands {
    /// Import anime, characters and appearances from a JSON file
    Import { path: PathBuf },

    /// Show the cached card for an item
    Show { kind: ItemKind, item_id: i64 },

    /// Set or clear an anime's Korean title
    KoreanTitle { anime_id: i64, title: Option<String> },

    /// Set or clear a character's Korean name
    KoreanName {
        character_id: i64,
        name: Option<String>,
    },

    /// Catalog cache counters for this process
    CacheStats,
}

// ============================================================================
// Review subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ReviewCommands {
    /// Write or edit the acting user's review
    Write {
        kind: ItemKind,
        item_id: i64,

        #[arg(long)]
        content: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        spoiler: bool,

        /// Rate the item in the same step
        #[arg(long)]
        rating: Option<f64>,
    },

    /// Delete the acting user's review
    Delete { kind: ItemKind, item_id: i64 },

    /// Show a user's review of an item
    Show {
        user_id: i64,
        kind: ItemKind,
        item_id: i64,
    },
}

// ============================================================================
// Post subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum PostCommands {
    /// Publish a post
    Create { content: String },

    /// Edit one of the acting user's posts
    Edit { post_id: i64, content: String },

    /// Delete one of the acting user's posts
    Delete { post_id: i64 },
}

// ============================================================================
// Comment subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum CommentCommands {
    /// Comment on an activity
    Add {
        activity_id: i64,
        content: String,

        /// Reply to this root comment
        #[arg(long)]
        reply_to: Option<i64>,
    },

    /// List the comment thread of an activity
    List { activity_id: i64 },

    /// Delete one of the acting user's comments
    Delete { source: CommentSource, comment_id: i64 },
}

// ============================================================================
// Notification subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum NotificationCommands {
    /// List recent notifications
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Count notifications newer than the last check
    Count,

    /// Mark all notifications as seen
    Check,
}
