//! Catalog service: the import and curation contract for anime and
//! characters.
//!
//! Catalog writes are not logged events. Activities snapshot catalog values
//! when they are projected and the snapshot is logged with the rating event,
//! so edits show up on the next write of the underlying rating and replay
//! keeps what each write saw.

use std::sync::Arc;

use crate::catalog::{CacheStats, ItemCard};
use crate::domain::ItemKind;
use crate::store::catalog::{self as store, AnimeRecord, CharacterLink, CharacterRecord};

use super::{CoreError, CoreResult, FeedServices};

/// Service for catalog operations.
pub struct CatalogService<'a> {
    services: &'a FeedServices,
}

impl<'a> CatalogService<'a> {
    pub(crate) const fn new(services: &'a FeedServices) -> Self {
        Self { services }
    }

    /// Insert or replace an anime and its genres.
    #[tracing::instrument(skip(self, anime), fields(anime_id = anime.id))]
    pub fn upsert_anime(&self, anime: &AnimeRecord) -> CoreResult<()> {
        self.services.write(|tx| Ok(store::upsert_anime(tx, anime)?))?;
        self.services.catalog.invalidate_anime(anime.id);
        Ok(())
    }

    #[tracing::instrument(skip(self, genres))]
    pub fn set_anime_genres(&self, anime_id: i64, genres: &[String]) -> CoreResult<()> {
        self.services.write(|tx| {
            if store::get_anime(tx, anime_id)?.is_none() {
                return Err(CoreError::not_found("anime", anime_id));
            }
            Ok(store::set_anime_genres(tx, anime_id, genres)?)
        })
    }

    #[tracing::instrument(skip(self, character), fields(character_id = character.id))]
    pub fn upsert_character(&self, character: &CharacterRecord) -> CoreResult<()> {
        self.services
            .write(|tx| Ok(store::upsert_character(tx, character)?))?;
        self.services
            .catalog
            .invalidate(ItemKind::Character, character.id);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn link_character(&self, link: CharacterLink) -> CoreResult<()> {
        self.services.write(|tx| {
            if store::get_anime(tx, link.anime_id)?.is_none() {
                return Err(CoreError::not_found("anime", link.anime_id));
            }
            if store::get_character(tx, link.character_id)?.is_none() {
                return Err(CoreError::not_found("character", link.character_id));
            }
            Ok(store::link_character(tx, &link)?)
        })?;
        self.services
            .catalog
            .invalidate(ItemKind::Character, link.character_id);
        Ok(())
    }

    /// Curator edit; `None` clears the Korean title.
    #[tracing::instrument(skip(self))]
    pub fn set_anime_korean_title(&self, anime_id: i64, title: Option<&str>) -> CoreResult<()> {
        let found = self
            .services
            .write(|tx| Ok(store::set_anime_korean_title(tx, anime_id, title)?))?;
        if !found {
            return Err(CoreError::not_found("anime", anime_id));
        }
        self.services.catalog.invalidate(ItemKind::Anime, anime_id);
        Ok(())
    }

    /// Curator edit; `None` clears the Korean name.
    #[tracing::instrument(skip(self))]
    pub fn set_character_korean_name(&self, character_id: i64, name: Option<&str>) -> CoreResult<()> {
        let found = self
            .services
            .write(|tx| Ok(store::set_character_korean_name(tx, character_id, name)?))?;
        if !found {
            return Err(CoreError::not_found("character", character_id));
        }
        self.services
            .catalog
            .invalidate(ItemKind::Character, character_id);
        Ok(())
    }

    /// Display card for an item, served from the cache when fresh.
    pub fn item(&self, kind: ItemKind, id: i64) -> CoreResult<Arc<ItemCard>> {
        self.services
            .catalog
            .item(self.services.db().conn(), kind, id)?
            .ok_or(CoreError::CatalogMissing {
                kind: kind.as_str(),
                id,
            })
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.services.catalog.stats()
    }
}
