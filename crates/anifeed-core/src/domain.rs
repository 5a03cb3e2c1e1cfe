//! Shared domain vocabulary: activity kinds, rating statuses, item kinds and
//! the keys that identify an activity.
//!
//! Every enum here round-trips through three representations with the same
//! spelling: SQLite TEXT columns, serde JSON, and `Display`/`FromStr`.

use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored or user-provided string names no known variant.
#[derive(Debug, Clone, Error)]
#[error("unknown {kind} value: '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Declares a fieldless enum persisted as a fixed string.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal, )+
        }
    ) => {
        $(#[$meta])*
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Stored spelling of this variant.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError::new(stringify!($name), other)),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

string_enum! {
    /// Kind of entry in the `activities` projection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
    pub enum ActivityType {
        AnimeRating => "anime_rating",
        CharacterRating => "character_rating",
        UserPost => "user_post",
        /// Synthetic, authored by the system when a rank threshold is crossed
        RankPromotion => "rank_promotion",
    }
}

impl ActivityType {
    /// Item kind backing a rating activity, `None` for posts and promotions.
    #[must_use]
    pub const fn item_kind(self) -> Option<ItemKind> {
        match self {
            Self::AnimeRating => Some(ItemKind::Anime),
            Self::CharacterRating => Some(ItemKind::Character),
            Self::UserPost | Self::RankPromotion => None,
        }
    }
}

string_enum! {
    /// Status of an anime rating row.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
    pub enum AnimeRatingStatus {
        Rated => "RATED",
        WantToWatch => "WANT_TO_WATCH",
        Pass => "PASS",
    }
}

string_enum! {
    /// Status of a character rating row.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
    pub enum CharacterRatingStatus {
        Rated => "RATED",
        WantToKnow => "WANT_TO_KNOW",
        NotInterested => "NOT_INTERESTED",
    }
}

string_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
    pub enum Language {
        #[default]
        En => "en",
        Ko => "ko",
        Ja => "ja",
        Zh => "zh",
    }
}

string_enum! {
    /// Role of a character within an anime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
    pub enum CharacterRole {
        Main => "MAIN",
        Supporting => "SUPPORTING",
        Background => "BACKGROUND",
    }
}

string_enum! {
    /// Catalog item kind that can be rated and reviewed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
    pub enum ItemKind {
        Anime => "anime",
        Character => "character",
    }
}

impl ItemKind {
    /// Activity type produced by a RATED rating of this kind.
    #[must_use]
    pub const fn activity_type(self) -> ActivityType {
        match self {
            Self::Anime => ActivityType::AnimeRating,
            Self::Character => ActivityType::CharacterRating,
        }
    }

    /// Table holding rating rows of this kind.
    #[must_use]
    pub const fn rating_table(self) -> &'static str {
        match self {
            Self::Anime => "user_ratings",
            Self::Character => "character_ratings",
        }
    }

    /// Table holding review rows of this kind.
    #[must_use]
    pub const fn review_table(self) -> &'static str {
        match self {
            Self::Anime => "user_reviews",
            Self::Character => "character_reviews",
        }
    }

    /// Foreign-key column naming the item in rating and review tables.
    #[must_use]
    pub const fn item_column(self) -> &'static str {
        match self {
            Self::Anime => "anime_id",
            Self::Character => "character_id",
        }
    }
}

string_enum! {
    /// Physical table family a comment lives in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
    pub enum CommentSource {
        /// `review_comments`, keyed by review
        Review => "review",
        /// `activity_comments`, keyed by activity identity
        Activity => "activity",
    }
}

/// Unique identity of an activity: `(activity_type, user_id, item_id)`.
///
/// `item_id` is the anime id, character id or post id; it is `None` only for
/// rank promotions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityKey {
    pub activity_type: ActivityType,
    pub user_id: i64,
    pub item_id: Option<i64>,
}

impl ActivityKey {
    #[must_use]
    pub const fn new(activity_type: ActivityType, user_id: i64, item_id: Option<i64>) -> Self {
        Self {
            activity_type,
            user_id,
            item_id,
        }
    }

    #[must_use]
    pub const fn anime(user_id: i64, anime_id: i64) -> Self {
        Self::new(ActivityType::AnimeRating, user_id, Some(anime_id))
    }

    #[must_use]
    pub const fn character(user_id: i64, character_id: i64) -> Self {
        Self::new(ActivityType::CharacterRating, user_id, Some(character_id))
    }

    #[must_use]
    pub const fn post(user_id: i64, post_id: i64) -> Self {
        Self::new(ActivityType::UserPost, user_id, Some(post_id))
    }

    /// Key of the rating activity for `(user, item)` of the given kind.
    #[must_use]
    pub const fn rating(kind: ItemKind, user_id: i64, item_id: i64) -> Self {
        Self::new(kind.activity_type(), user_id, Some(item_id))
    }
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item_id {
            Some(item) => write!(f, "{}/{}/{}", self.activity_type, self.user_id, item),
            None => write!(f, "{}/{}", self.activity_type, self.user_id),
        }
    }
}

/// Which physical tables hold an activity's likes and comments at the moment
/// of a write.
///
/// Rating activities whose `(user, item)` has a review use the review-bound
/// tables; everything else uses the activity-bound tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "branch", rename_all = "snake_case")]
pub enum EngagementBranch {
    Review { kind: ItemKind, review_id: i64 },
    Activity { activity_id: i64 },
}

impl EngagementBranch {
    /// Comment table family used by this branch.
    #[must_use]
    pub const fn comment_source(self) -> CommentSource {
        match self {
            Self::Review { .. } => CommentSource::Review,
            Self::Activity { .. } => CommentSource::Activity,
        }
    }
}

/// How a caller addresses an activity: by row id or by its unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityTarget {
    Id(i64),
    Key(ActivityKey),
}

impl From<ActivityKey> for ActivityTarget {
    fn from(key: ActivityKey) -> Self {
        Self::Key(key)
    }
}
