//! User service: registration, profile edits and the follow graph.

use serde::Serialize;

use crate::events::{Event, FollowChanged, ProfileChanged, UserRegistered};
use crate::stats::{get_stats, rank_for, RankInfo, UserStats};
use crate::store::users::{self as store, NewUser, ProfileChange, UserRow};
use crate::store::{fmt_ts, next_id};

use super::{require_text, require_user, CoreError, CoreResult, FeedServices};

/// A user as shown on their profile.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: UserRow,
    pub stats: UserStats,
    pub rank: RankInfo,
    pub followers: usize,
    pub following: usize,
}

/// Service for user operations.
pub struct UserService<'a> {
    services: &'a FeedServices,
}

impl<'a> UserService<'a> {
    pub(crate) const fn new(services: &'a FeedServices) -> Self {
        Self { services }
    }

    /// Register a user. Username and email must be unique.
    #[tracing::instrument(skip(self, user), fields(username = %user.username))]
    pub fn create(&self, user: NewUser) -> CoreResult<UserRow> {
        require_text("username", &user.username)?;
        require_text("email", &user.email)?;
        require_text("password_hash", &user.password_hash)?;

        self.services.write(|tx| {
            if store::identity_taken(tx, Some(&user.username), Some(&user.email), None)? {
                return Err(CoreError::conflict(format!(
                    "username or email already registered: {}",
                    user.username
                )));
            }
            let user_id = next_id(tx, "users")?;
            self.services
                .emit(tx, user_id, Event::UserRegistered(UserRegistered { user_id, user }))?;
            require_user(tx, user_id)
        })
    }

    /// Change soft profile fields and refresh the author fields on the user's
    /// activities.
    #[tracing::instrument(skip(self))]
    pub fn update_profile(&self, user_id: i64, change: ProfileChange) -> CoreResult<UserRow> {
        if let Some(username) = &change.username {
            require_text("username", username)?;
        }

        self.services.write(|tx| {
            require_user(tx, user_id)?;
            if let Some(username) = &change.username {
                if store::identity_taken(tx, Some(username), None, Some(user_id))? {
                    return Err(CoreError::conflict(format!("username already taken: {username}")));
                }
            }
            self.services
                .emit(tx, user_id, Event::ProfileChanged(ProfileChanged { change }))?;
            require_user(tx, user_id)
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn follow(&self, follower_id: i64, following_id: i64) -> CoreResult<()> {
        if follower_id == following_id {
            return Err(CoreError::invalid("users cannot follow themselves"));
        }
        self.services.write(|tx| {
            require_user(tx, follower_id)?;
            require_user(tx, following_id)?;
            if store::follows(tx, follower_id, following_id)? {
                return Err(CoreError::conflict(format!(
                    "user {follower_id} already follows {following_id}"
                )));
            }
            self.services
                .emit(tx, follower_id, Event::Followed(FollowChanged { following_id }))?;
            Ok(())
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn unfollow(&self, follower_id: i64, following_id: i64) -> CoreResult<()> {
        self.services.write(|tx| {
            if !store::follows(tx, follower_id, following_id)? {
                return Err(CoreError::not_found(
                    "follow",
                    format!("{follower_id}->{following_id}"),
                ));
            }
            self.services
                .emit(tx, follower_id, Event::Unfollowed(FollowChanged { following_id }))?;
            Ok(())
        })
    }

    /// Profile with stats and rank.
    pub fn get(&self, user_id: i64) -> CoreResult<UserProfile> {
        let conn = self.services.db().conn();
        let user = require_user(conn, user_id)?;
        let stats = get_stats(conn, user_id)?
            .unwrap_or_else(|| UserStats::empty(user_id, &fmt_ts(&chrono::Utc::now())));
        Ok(UserProfile {
            rank: rank_for(stats.otaku_score),
            stats,
            followers: store::followers(conn, user_id)?.len(),
            following: store::followees(conn, user_id)?.len(),
            user,
        })
    }

    pub fn find_by_username(&self, username: &str) -> CoreResult<UserRow> {
        store::find_user_by_username(self.services.db().conn(), username)?
            .ok_or_else(|| CoreError::not_found("user", username))
    }

    pub fn followees(&self, user_id: i64) -> CoreResult<Vec<i64>> {
        Ok(store::followees(self.services.db().conn(), user_id)?)
    }

    pub fn followers(&self, user_id: i64) -> CoreResult<Vec<i64>> {
        Ok(store::followers(self.services.db().conn(), user_id)?)
    }
}
