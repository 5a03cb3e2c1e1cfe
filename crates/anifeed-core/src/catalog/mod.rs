//! In-process catalog cache.
//!
//! Projections snapshot catalog fields (titles, images, a character's primary
//! parent anime) at write time. Those lookups go through [`CatalogCache`],
//! which holds resolved [`ItemCard`]s for at most the configured TTL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use dashmap::DashMap;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MAX_CATALOG_TTL;
use crate::domain::ItemKind;
use crate::projection::primary::choose_primary;
use crate::store::catalog::{get_anime, get_character, parent_candidates};

/// Cache key: one catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatalogKey {
    pub kind: ItemKind,
    pub id: i64,
}

/// The parent anime shown on a character activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentAnime {
    pub anime_id: i64,
    pub title: String,
}

/// Catalog fields copied onto a rating activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCard {
    pub kind: ItemKind,
    pub id: i64,
    /// Anime title or character name
    pub title: String,
    pub title_korean: Option<String>,
    pub image_url: Option<String>,
    /// Primary parent anime, characters only
    pub parent: Option<ParentAnime>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    card: Arc<ItemCard>,
    created_at: Instant,
}

impl CacheEntry {
    fn new(card: Arc<ItemCard>) -> Self {
        Self {
            card,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Process-wide catalog cache, shared through an `Arc` by every handle
/// opened from the same context.
#[derive(Debug)]
pub struct CatalogCache {
    entries: DashMap<CatalogKey, CacheEntry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(MAX_CATALOG_TTL)
    }
}

impl CatalogCache {
    /// Create a cache; `ttl` is capped at 60 seconds.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: ttl.min(MAX_CATALOG_TTL),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up an item, loading it from `conn` on a miss.
    ///
    /// Returns `Ok(None)` if the item is not in the catalog. Absent items are
    /// not cached, so a fresh import is visible on the next lookup.
    pub fn item(&self, conn: &Connection, kind: ItemKind, id: i64) -> Result<Option<Arc<ItemCard>>> {
        let key = CatalogKey { kind, id };

        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired(self.ttl) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(%kind, id, "catalog cache hit");
                return Ok(Some(Arc::clone(&entry.card)));
            }
        }
        // The read guard above must be gone before removing.
        self.entries.remove_if(&key, |_, entry| entry.is_expired(self.ttl));

        self.misses.fetch_add(1, Ordering::Relaxed);
        let Some(card) = load_card(conn, kind, id)? else {
            return Ok(None);
        };
        let card = Arc::new(card);
        self.entries.insert(key, CacheEntry::new(Arc::clone(&card)));
        Ok(Some(card))
    }

    /// Drop one item.
    pub fn invalidate(&self, kind: ItemKind, id: i64) {
        self.entries.remove(&CatalogKey { kind, id });
    }

    /// Drop an anime and every character card, since any character may name
    /// it as primary parent.
    pub fn invalidate_anime(&self, anime_id: i64) {
        self.invalidate(ItemKind::Anime, anime_id);
        self.entries.retain(|key, _| key.kind != ItemKind::Character);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

fn load_card(conn: &Connection, kind: ItemKind, id: i64) -> Result<Option<ItemCard>> {
    match kind {
        ItemKind::Anime => Ok(get_anime(conn, id)?.map(|anime| ItemCard {
            kind,
            id,
            title: anime.title,
            title_korean: anime.title_korean,
            image_url: anime.image_url,
            parent: None,
        })),
        ItemKind::Character => {
            let Some(character) = get_character(conn, id)? else {
                return Ok(None);
            };
            let candidates = parent_candidates(conn, id)?;
            let parent = choose_primary(&candidates).map(|c| ParentAnime {
                anime_id: c.anime_id,
                title: c.title.clone(),
            });
            Ok(Some(ItemCard {
                kind,
                id,
                title: character.name,
                title_korean: character.name_korean,
                image_url: character.image_url,
                parent,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CharacterRole;
    use crate::store::catalog::{
        link_character, set_anime_korean_title, upsert_anime, upsert_character, AnimeRecord,
        CharacterLink, CharacterRecord,
    };
    use crate::store::FeedDb;

    fn setup() -> FeedDb {
        let db = FeedDb::open_in_memory().unwrap();
        db.init_schema().unwrap();
        upsert_anime(
            db.conn(),
            &AnimeRecord {
                id: 16498,
                title: "Attack on Titan".to_string(),
                title_korean: None,
                title_japanese: None,
                image_url: Some("https://img/aot.jpg".to_string()),
                episodes: Some(25),
                duration: Some(24),
                start_date: Some("2013-04-07".to_string()),
                popularity: Some(900),
                genres: vec![],
            },
        )
        .unwrap();
        db
    }

    #[test]
    fn test_hit_after_miss() {
        let db = setup();
        let cache = CatalogCache::default();

        let first = cache.item(db.conn(), ItemKind::Anime, 16498).unwrap().unwrap();
        let second = cache.item(db.conn(), ItemKind::Anime, 16498).unwrap().unwrap();
        assert_eq!(first, second);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_missing_items_are_not_cached() {
        let db = setup();
        let cache = CatalogCache::default();
        assert!(cache.item(db.conn(), ItemKind::Anime, 1).unwrap().is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_stale_until_invalidated() {
        let db = setup();
        let cache = CatalogCache::default();
        cache.item(db.conn(), ItemKind::Anime, 16498).unwrap();

        set_anime_korean_title(db.conn(), 16498, Some("진격의 거인")).unwrap();
        let stale = cache.item(db.conn(), ItemKind::Anime, 16498).unwrap().unwrap();
        assert_eq!(stale.title_korean, None);

        cache.invalidate_anime(16498);
        let fresh = cache.item(db.conn(), ItemKind::Anime, 16498).unwrap().unwrap();
        assert_eq!(fresh.title_korean.as_deref(), Some("진격의 거인"));
    }

    #[test]
    fn test_ttl_is_capped() {
        let cache = CatalogCache::new(Duration::from_secs(3600));
        assert_eq!(cache.ttl(), MAX_CATALOG_TTL);
    }

    #[test]
    fn test_character_card_carries_parent() {
        let db = setup();
        upsert_character(
            db.conn(),
            &CharacterRecord {
                id: 40,
                name: "Levi".to_string(),
                name_korean: Some("리바이".to_string()),
                name_japanese: None,
                image_url: None,
            },
        )
        .unwrap();
        link_character(
            db.conn(),
            &CharacterLink {
                anime_id: 16498,
                character_id: 40,
                role: CharacterRole::Supporting,
            },
        )
        .unwrap();

        let cache = CatalogCache::default();
        let card = cache.item(db.conn(), ItemKind::Character, 40).unwrap().unwrap();
        assert_eq!(card.title, "Levi");
        assert_eq!(
            card.parent,
            Some(ParentAnime {
                anime_id: 16498,
                title: "Attack on Titan".to_string(),
            })
        );
    }
}
