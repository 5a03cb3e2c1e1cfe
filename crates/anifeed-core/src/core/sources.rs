//! Source services: ratings, reviews and posts.
//!
//! Each verb mutates one source table and re-derives the matching activity in
//! the same transaction. A projection failure rolls the source write back.

use crate::domain::{ActivityKey, AnimeRatingStatus, CharacterRatingStatus, ItemKind};
use crate::events::{Event, ItemRef, PostRef, PostWritten, RatingSet, ReviewDeleted, ReviewWritten};
use crate::projection::{get_activity_by_key, Activity};
use crate::store::next_id;
use crate::store::sources::{self as store, PostRow, RatingRow, ReviewRow, RATED};

use super::{require_text, require_user, CoreError, CoreResult, FeedServices};

pub const MIN_RATING: f64 = 0.5;
pub const MAX_RATING: f64 = 5.0;

/// Check a status spelling for `kind` and its pairing with `rating`.
///
/// RATED requires a rating in `[0.5, 5.0]`; every other status requires none.
pub fn validate_rating(kind: ItemKind, rating: Option<f64>, status: &str) -> CoreResult<()> {
    let known = match kind {
        ItemKind::Anime => status.parse::<AnimeRatingStatus>().is_ok(),
        ItemKind::Character => status.parse::<CharacterRatingStatus>().is_ok(),
    };
    if !known {
        return Err(CoreError::invalid(format!("unknown {kind} rating status: {status}")));
    }
    match (status == RATED, rating) {
        (true, Some(value)) if (MIN_RATING..=MAX_RATING).contains(&value) => Ok(()),
        (true, Some(value)) => Err(CoreError::invalid(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, got {value}"
        ))),
        (true, None) => Err(CoreError::invalid("status RATED requires a rating")),
        (false, Some(_)) => Err(CoreError::invalid(format!(
            "status {status} must not carry a rating"
        ))),
        (false, None) => Ok(()),
    }
}

/// Review fields supplied by the author.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewInput {
    pub title: Option<String>,
    pub content: String,
    pub is_spoiler: bool,
    /// Written as a RATED rating together with the review when present
    pub rating: Option<f64>,
}

// ============================================================================
// Ratings
// ============================================================================

/// Service for rating operations.
pub struct RatingService<'a> {
    services: &'a FeedServices,
}

impl<'a> RatingService<'a> {
    pub(crate) const fn new(services: &'a FeedServices) -> Self {
        Self { services }
    }

    /// Create or update the user's rating of an item.
    ///
    /// Returns the rating activity, or `None` when the status is not RATED.
    #[tracing::instrument(skip(self))]
    pub fn rate(
        &self,
        user_id: i64,
        kind: ItemKind,
        item_id: i64,
        rating: Option<f64>,
        status: &str,
    ) -> CoreResult<Option<Activity>> {
        validate_rating(kind, rating, status)?;
        self.services.write(|tx| {
            require_user(tx, user_id)?;
            self.services.emit(
                tx,
                user_id,
                Event::RatingSet(RatingSet {
                    kind,
                    item_id,
                    rating,
                    status: status.to_string(),
                    card: None,
                }),
            )?;
            Ok(get_activity_by_key(tx, &ActivityKey::rating(kind, user_id, item_id))?)
        })
    }

    /// Delete the user's rating of an item, its review, and the activity
    /// with all engagement on it.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, user_id: i64, kind: ItemKind, item_id: i64) -> CoreResult<()> {
        self.services.write(|tx| {
            if store::get_rating(tx, kind, user_id, item_id)?.is_none() {
                return Err(CoreError::not_found(
                    "rating",
                    format!("{kind}/{user_id}/{item_id}"),
                ));
            }
            self.services
                .emit(tx, user_id, Event::RatingDeleted(ItemRef { kind, item_id }))?;
            Ok(())
        })
    }

    pub fn get(&self, user_id: i64, kind: ItemKind, item_id: i64) -> CoreResult<RatingRow> {
        store::get_rating(self.services.db().conn(), kind, user_id, item_id)?.ok_or_else(|| {
            CoreError::not_found("rating", format!("{kind}/{user_id}/{item_id}"))
        })
    }

    pub fn list_for_user(&self, user_id: i64, kind: ItemKind) -> CoreResult<Vec<RatingRow>> {
        Ok(store::user_ratings(self.services.db().conn(), kind, user_id)?)
    }
}

// ============================================================================
// Reviews
// ============================================================================

/// Service for review operations.
pub struct ReviewService<'a> {
    services: &'a FeedServices,
}

impl<'a> ReviewService<'a> {
    pub(crate) const fn new(services: &'a FeedServices) -> Self {
        Self { services }
    }

    /// Create or edit the user's review of an item.
    ///
    /// The item must already carry a rating row from this user unless
    /// `input.rating` is given, in which case the rating and the review are
    /// applied as one event and stats are refreshed once for both.
    #[tracing::instrument(skip(self, input), fields(rating = ?input.rating))]
    pub fn write(&self, user_id: i64, kind: ItemKind, item_id: i64, input: ReviewInput) -> CoreResult<ReviewRow> {
        require_text("content", &input.content)?;
        if let Some(rating) = input.rating {
            validate_rating(kind, Some(rating), RATED)?;
        }

        self.services.write(|tx| {
            require_user(tx, user_id)?;
            if input.rating.is_none() && store::get_rating(tx, kind, user_id, item_id)?.is_none() {
                return Err(CoreError::invalid(format!(
                    "a review needs a rating of {kind} {item_id} first"
                )));
            }
            self.services.emit(
                tx,
                user_id,
                Event::ReviewWritten(ReviewWritten {
                    kind,
                    item_id,
                    title: input.title,
                    content: input.content,
                    is_spoiler: input.is_spoiler,
                    rating: input.rating,
                    card: None,
                }),
            )?;
            store::get_review(tx, kind, user_id, item_id)?
                .ok_or_else(|| CoreError::not_found("review", format!("{kind}/{user_id}/{item_id}")))
        })
    }

    /// Delete the user's review; the rating activity loses its review fields.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, user_id: i64, kind: ItemKind, item_id: i64) -> CoreResult<()> {
        self.services.write(|tx| {
            if store::get_review(tx, kind, user_id, item_id)?.is_none() {
                return Err(CoreError::not_found(
                    "review",
                    format!("{kind}/{user_id}/{item_id}"),
                ));
            }
            self.services.emit(
                tx,
                user_id,
                Event::ReviewDeleted(ReviewDeleted {
                    kind,
                    item_id,
                    card: None,
                }),
            )?;
            Ok(())
        })
    }

    pub fn get(&self, user_id: i64, kind: ItemKind, item_id: i64) -> CoreResult<ReviewRow> {
        store::get_review(self.services.db().conn(), kind, user_id, item_id)?.ok_or_else(|| {
            CoreError::not_found("review", format!("{kind}/{user_id}/{item_id}"))
        })
    }
}

// ============================================================================
// Posts
// ============================================================================

/// Service for free-text post operations.
pub struct PostService<'a> {
    services: &'a FeedServices,
}

impl<'a> PostService<'a> {
    pub(crate) const fn new(services: &'a FeedServices) -> Self {
        Self { services }
    }

    #[tracing::instrument(skip(self, content))]
    pub fn create(&self, user_id: i64, content: &str) -> CoreResult<PostRow> {
        require_text("content", content)?;
        self.services.write(|tx| {
            require_user(tx, user_id)?;
            let post_id = next_id(tx, "user_posts")?;
            self.services.emit(
                tx,
                user_id,
                Event::PostCreated(PostWritten {
                    post_id,
                    content: content.to_string(),
                }),
            )?;
            require_post(tx, post_id)
        })
    }

    /// Replace a post's content. Only the author may edit.
    #[tracing::instrument(skip(self, content))]
    pub fn edit(&self, user_id: i64, post_id: i64, content: &str) -> CoreResult<PostRow> {
        require_text("content", content)?;
        self.services.write(|tx| {
            require_owner(tx, user_id, post_id)?;
            self.services.emit(
                tx,
                user_id,
                Event::PostEdited(PostWritten {
                    post_id,
                    content: content.to_string(),
                }),
            )?;
            require_post(tx, post_id)
        })
    }

    /// Delete a post and its activity. Only the author may delete.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, user_id: i64, post_id: i64) -> CoreResult<()> {
        self.services.write(|tx| {
            require_owner(tx, user_id, post_id)?;
            self.services
                .emit(tx, user_id, Event::PostDeleted(PostRef { post_id }))?;
            Ok(())
        })
    }

    pub fn get(&self, post_id: i64) -> CoreResult<PostRow> {
        require_post(self.services.db().conn(), post_id)
    }
}

fn require_post(conn: &rusqlite::Connection, post_id: i64) -> CoreResult<PostRow> {
    store::get_post(conn, post_id)?.ok_or_else(|| CoreError::not_found("post", post_id))
}

fn require_owner(conn: &rusqlite::Connection, user_id: i64, post_id: i64) -> CoreResult<PostRow> {
    let post = require_post(conn, post_id)?;
    if post.user_id != user_id {
        return Err(CoreError::NotAuthorized {
            actor: user_id,
            entity: "post",
            id: post_id.to_string(),
        });
    }
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rating() {
        assert!(validate_rating(ItemKind::Anime, Some(4.5), "RATED").is_ok());
        assert!(validate_rating(ItemKind::Anime, None, "WANT_TO_WATCH").is_ok());
        assert!(validate_rating(ItemKind::Character, None, "NOT_INTERESTED").is_ok());
        assert!(validate_rating(ItemKind::Anime, Some(0.4), "RATED").is_err());
        assert!(validate_rating(ItemKind::Anime, Some(5.5), "RATED").is_err());
        assert!(validate_rating(ItemKind::Anime, None, "RATED").is_err());
        assert!(validate_rating(ItemKind::Anime, Some(3.0), "PASS").is_err());
        // statuses are per kind
        assert!(validate_rating(ItemKind::Anime, None, "WANT_TO_KNOW").is_err());
        assert!(validate_rating(ItemKind::Character, None, "bogus").is_err());
    }
}
