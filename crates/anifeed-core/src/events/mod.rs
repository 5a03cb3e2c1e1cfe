//! Event types for the anifeed event log.
//!
//! Every accepted mutation is described by one [`EventEnvelope`]. The same
//! envelope is applied to the store and appended to `event_log`, so replaying
//! the log reproduces the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ItemCard;
use crate::domain::{ActivityKey, CommentSource, EngagementBranch, ItemKind};
use crate::store::users::{NewUser, ProfileChange};

/// Common envelope for all events in the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Timestamp when the event was accepted
    pub ts: DateTime<Utc>,
    /// User who performed the action
    pub actor: i64,
    /// The event payload
    #[serde(flatten)]
    pub event: Event,
}

/// All possible events in anifeed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    /// A user registered
    UserRegistered(UserRegistered),
    /// Soft profile fields changed
    ProfileChanged(ProfileChanged),
    /// Actor started following a user
    Followed(FollowChanged),
    /// Actor stopped following a user
    Unfollowed(FollowChanged),
    /// A rating row was created or updated
    RatingSet(RatingSet),
    /// A rating row was deleted (cascades to its review)
    RatingDeleted(ItemRef),
    /// A review was created or edited, optionally with its rating
    ReviewWritten(ReviewWritten),
    /// A review was deleted
    ReviewDeleted(ReviewDeleted),
    /// A post was created
    PostCreated(PostWritten),
    /// A post's content changed
    PostEdited(PostWritten),
    /// A post was deleted
    PostDeleted(PostRef),
    /// Actor liked an activity
    Liked(LikeChanged),
    /// Actor removed a like
    Unliked(LikeChanged),
    /// Actor commented on an activity
    CommentAdded(CommentAdded),
    /// A comment and its replies were deleted
    CommentDeleted(CommentDeleted),
}

// ============================================================================
// User Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: i64,
    pub user: NewUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileChanged {
    pub change: ProfileChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowChanged {
    pub following_id: i64,
}

// ============================================================================
// Source Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSet {
    pub kind: ItemKind,
    pub item_id: i64,
    /// Score in `[0.5, 5.0]`; present iff `status` is `RATED`
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rating: Option<f64>,
    /// Stored status spelling for `kind`
    pub status: String,
    /// Catalog card the activity was projected with
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub card: Option<ItemCard>,
}

/// Addresses the actor's rating or review of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub item_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewWritten {
    pub kind: ItemKind,
    pub item_id: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    pub content: String,
    pub is_spoiler: bool,
    /// RATED score written together with the review
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub card: Option<ItemCard>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDeleted {
    pub kind: ItemKind,
    pub item_id: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub card: Option<ItemCard>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostWritten {
    pub post_id: i64,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub post_id: i64,
}

// ============================================================================
// Engagement Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeChanged {
    /// Activity that was liked
    pub target: ActivityKey,
    /// Tables the like was written to
    #[serde(flatten)]
    pub branch: EngagementBranch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAdded {
    /// Id allocated in the comment table selected by `branch`
    pub comment_id: i64,
    pub target: ActivityKey,
    #[serde(flatten)]
    pub branch: EngagementBranch,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_comment_id: Option<i64>,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentDeleted {
    pub source: CommentSource,
    pub comment_id: i64,
}

// ============================================================================
// Constructors and helpers
// ============================================================================

impl EventEnvelope {
    /// Create a new event envelope with the current timestamp.
    #[must_use]
    pub fn new(actor: i64, event: Event) -> Self {
        Self {
            ts: Utc::now(),
            actor,
            event,
        }
    }

    /// Create an envelope with an explicit timestamp.
    #[must_use]
    pub const fn at(ts: DateTime<Utc>, actor: i64, event: Event) -> Self {
        Self { ts, actor, event }
    }

    /// Serialize the envelope to a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an envelope from a JSON line.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

impl Event {
    /// Variant name, as stored in `event_log.event_type`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UserRegistered(_) => "UserRegistered",
            Self::ProfileChanged(_) => "ProfileChanged",
            Self::Followed(_) => "Followed",
            Self::Unfollowed(_) => "Unfollowed",
            Self::RatingSet(_) => "RatingSet",
            Self::RatingDeleted(_) => "RatingDeleted",
            Self::ReviewWritten(_) => "ReviewWritten",
            Self::ReviewDeleted(_) => "ReviewDeleted",
            Self::PostCreated(_) => "PostCreated",
            Self::PostEdited(_) => "PostEdited",
            Self::PostDeleted(_) => "PostDeleted",
            Self::Liked(_) => "Liked",
            Self::Unliked(_) => "Unliked",
            Self::CommentAdded(_) => "CommentAdded",
            Self::CommentDeleted(_) => "CommentDeleted",
        }
    }

    /// Whether the event mutates a source table counted by user stats.
    #[must_use]
    pub const fn affects_stats(&self) -> bool {
        matches!(
            self,
            Self::RatingSet(_)
                | Self::RatingDeleted(_)
                | Self::ReviewWritten(_)
                | Self::ReviewDeleted(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_roundtrip() {
        let event = EventEnvelope::new(
            7,
            Event::RatingSet(RatingSet {
                kind: ItemKind::Anime,
                item_id: 16498,
                rating: Some(4.5),
                status: "RATED".to_string(),
                card: None,
            }),
        );

        let json = event.to_json_line().unwrap();
        let parsed = EventEnvelope::from_json_line(&json).unwrap();

        assert_eq!(parsed.actor, 7);
        match parsed.event {
            Event::RatingSet(r) => {
                assert_eq!(r.item_id, 16498);
                assert_eq!(r.rating, Some(4.5));
            }
            _ => panic!("Expected RatingSet"),
        }
    }

    #[test]
    fn test_envelope_shape() {
        let event = EventEnvelope::new(9, Event::Followed(FollowChanged { following_id: 7 }));
        let value: serde_json::Value = serde_json::from_str(&event.to_json_line().unwrap()).unwrap();

        assert_eq!(value["event"], "Followed");
        assert_eq!(value["actor"], 9);
        assert_eq!(value["data"]["following_id"], 7);
        assert!(value["ts"].is_string());
    }

    #[test]
    fn test_like_carries_branch() {
        let event = Event::Liked(LikeChanged {
            target: ActivityKey::anime(7, 16498),
            branch: EngagementBranch::Review {
                kind: ItemKind::Anime,
                review_id: 1,
            },
        });
        let envelope = EventEnvelope::new(9, event.clone());
        let json = envelope.to_json_line().unwrap();

        assert!(json.contains(r#""branch":"review""#));
        assert!(json.contains("anime_rating"));
        assert_eq!(EventEnvelope::from_json_line(&json).unwrap().event, event);
    }

    #[test]
    fn test_affects_stats() {
        let rated = Event::RatingDeleted(ItemRef {
            kind: ItemKind::Character,
            item_id: 1,
        });
        assert!(rated.affects_stats());
        assert!(!Event::PostDeleted(PostRef { post_id: 1 }).affects_stats());
        assert_eq!(rated.name(), "RatingDeleted");
    }

    #[test]
    fn test_logged_card_survives_roundtrip() {
        let event = Event::ReviewWritten(ReviewWritten {
            kind: ItemKind::Character,
            item_id: 40,
            title: None,
            content: "best boy".to_string(),
            is_spoiler: false,
            rating: Some(5.0),
            card: Some(ItemCard {
                kind: ItemKind::Character,
                id: 40,
                title: "Levi".to_string(),
                title_korean: Some("리바이".to_string()),
                image_url: None,
                parent: None,
            }),
        });
        let json = EventEnvelope::new(7, event.clone()).to_json_line().unwrap();

        assert!(json.contains("리바이"));
        assert_eq!(EventEnvelope::from_json_line(&json).unwrap().event, event);
    }

    #[test]
    fn test_card_is_optional_on_old_entries() {
        let json = r#"{"ts":"2026-01-01T00:00:00Z","actor":7,"event":"ReviewDeleted","data":{"kind":"anime","item_id":1}}"#;
        let parsed = EventEnvelope::from_json_line(json).unwrap();
        assert!(matches!(parsed.event, Event::ReviewDeleted(ReviewDeleted { card: None, .. })));
    }
}
