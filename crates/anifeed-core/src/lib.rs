//! anifeed-core: activity fan-out and feed materialization for anifeed.
//!
//! This crate owns the source tables (users, ratings, reviews, posts), the
//! denormalized `activities` projection kept in sync with them, engagement
//! resolution across the review-bound and activity-bound paths, feed queries,
//! per-user stats and rank promotions, threaded comments, and offline recovery.

pub mod catalog;
pub mod comments;
pub mod config;
pub mod core;
pub mod domain;
pub mod engagement;
pub mod events;
pub mod feed;
pub mod notifications;
pub mod projection;
pub mod recovery;
pub mod stats;
pub mod store;
pub mod write;

pub use crate::core::{CoreError, CoreResult, ErrorKind, FeedContext, FeedServices};
