//! Otaku score formula, rank thresholds and promotion planning.

#![allow(clippy::cast_possible_wrap)]

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::domain::ItemKind;
use crate::events::{Event, EventEnvelope};
use crate::projection::PromotionMetadata;
use crate::store::fmt_ts;
use crate::store::sources::RATED;

/// Scores at which a user is promoted to the next level.
pub const RANK_THRESHOLDS: [i64; 9] = [50, 120, 220, 350, 550, 800, 1100, 1450, 1800];

pub const RATED_ANIME_POINTS: i64 = 2;
pub const RATED_CHARACTER_POINTS: i64 = 1;
pub const REVIEW_POINTS: i64 = 5;

#[must_use]
pub const fn otaku_score(total_rated: i64, total_character_ratings: i64, total_reviews: i64) -> i64 {
    RATED_ANIME_POINTS * total_rated
        + RATED_CHARACTER_POINTS * total_character_ratings
        + REVIEW_POINTS * total_reviews
}

/// A user's rank as derived from their score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankInfo {
    /// 1 plus the number of thresholds reached
    pub level: i64,
    /// Highest threshold reached, if any
    pub current_threshold: Option<i64>,
    /// Next threshold to reach, `None` at the top level
    pub next_threshold: Option<i64>,
}

#[must_use]
pub fn rank_for(score: i64) -> RankInfo {
    let reached = RANK_THRESHOLDS.iter().take_while(|t| **t <= score).count();
    RankInfo {
        level: 1 + reached as i64,
        current_threshold: reached.checked_sub(1).map(|i| RANK_THRESHOLDS[i]),
        next_threshold: RANK_THRESHOLDS.get(reached).copied(),
    }
}

/// A threshold crossed by a score change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    pub threshold: i64,
    pub metadata: PromotionMetadata,
}

/// Thresholds `t` with `prev < t <= curr`, lowest first.
#[must_use]
pub fn crossed_thresholds(prev: i64, curr: i64) -> Vec<Crossing> {
    RANK_THRESHOLDS
        .iter()
        .enumerate()
        .filter(|(_, t)| prev < **t && **t <= curr)
        .map(|(i, t)| Crossing {
            threshold: *t,
            metadata: PromotionMetadata {
                old_level: i as i64 + 1,
                new_level: i as i64 + 2,
                otaku_score: curr,
            },
        })
        .collect()
}

/// A promotion as it should exist after a replay of the user's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPromotion {
    pub threshold: i64,
    pub metadata: PromotionMetadata,
    pub activity_time: String,
}

/// Replays one user's chronological source events through the score formula.
///
/// Only the rows that count toward the score are tracked: which items have a
/// rating row and whether it is RATED, and which items carry a review.
#[derive(Debug, Default)]
pub struct ScoreTimeline {
    ratings: HashMap<(ItemKind, i64), bool>,
    reviews: HashSet<(ItemKind, i64)>,
    score: i64,
    emitted: BTreeSet<i64>,
    planned: Vec<PlannedPromotion>,
}

impl ScoreTimeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn score(&self) -> i64 {
        self.score
    }

    /// Feed the next event performed by the user.
    pub fn push(&mut self, envelope: &EventEnvelope) {
        match &envelope.event {
            Event::RatingSet(e) => {
                self.ratings
                    .insert((e.kind, e.item_id), e.status == RATED && e.rating.is_some());
            }
            Event::RatingDeleted(e) => {
                self.ratings.remove(&(e.kind, e.item_id));
                self.reviews.remove(&(e.kind, e.item_id));
            }
            Event::ReviewWritten(e) => {
                if e.rating.is_some() {
                    self.ratings.insert((e.kind, e.item_id), true);
                }
                if self.ratings.contains_key(&(e.kind, e.item_id)) {
                    self.reviews.insert((e.kind, e.item_id));
                }
            }
            Event::ReviewDeleted(e) => {
                self.reviews.remove(&(e.kind, e.item_id));
            }
            _ => return,
        }

        let prev = self.score;
        self.score = self.current_score();
        for crossing in crossed_thresholds(prev, self.score) {
            if self.emitted.insert(crossing.threshold) {
                self.planned.push(PlannedPromotion {
                    threshold: crossing.threshold,
                    metadata: crossing.metadata,
                    activity_time: fmt_ts(&envelope.ts),
                });
            }
        }
    }

    fn current_score(&self) -> i64 {
        let rated = |kind| {
            self.ratings
                .iter()
                .filter(|((k, _), rated)| *k == kind && **rated)
                .count() as i64
        };
        otaku_score(
            rated(ItemKind::Anime),
            rated(ItemKind::Character),
            self.reviews.len() as i64,
        )
    }

    /// Promotions in the order they were first earned.
    #[must_use]
    pub fn into_planned(self) -> Vec<PlannedPromotion> {
        self.planned
    }
}

/// Plan the promotions a user should hold given their chronological events.
#[must_use]
pub fn plan_promotions(events: &[EventEnvelope]) -> Vec<PlannedPromotion> {
    let mut timeline = ScoreTimeline::new();
    for envelope in events {
        timeline.push(envelope);
    }
    timeline.into_planned()
}
