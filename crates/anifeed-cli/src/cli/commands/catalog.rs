//! Implementation of `anifeed catalog` subcommands.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use anifeed_core::core::FeedServices;
use anifeed_core::domain::ItemKind;
use anifeed_core::store::catalog::{AnimeRecord, CharacterLink, CharacterRecord};

use crate::cli::commands::helpers::Session;
use crate::cli::CatalogCommands;
use crate::output::{Formatter, OutputFormat};

/// Shape of a catalog import file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogImport {
    pub anime: Vec<AnimeRecord>,
    pub characters: Vec<CharacterRecord>,
    pub appearances: Vec<CharacterLink>,
}

pub fn run_catalog(session: &Session, cmd: CatalogCommands, format: OutputFormat) -> Result<()> {
    let catalog = session.services.catalog();
    let formatter = Formatter::new(format);

    match cmd {
        CatalogCommands::Import { path } => {
            let import = read_import(&path)?;
            let counts = import_catalog(&session.services, &import)?;
            formatter.print(&counts)?;
        }
        CatalogCommands::Show { kind, item_id } => formatter.print(&*catalog.item(kind, item_id)?)?,
        CatalogCommands::KoreanTitle { anime_id, title } => {
            catalog.set_anime_korean_title(anime_id, title.as_deref())?;
            formatter.print(&*catalog.item(ItemKind::Anime, anime_id)?)?;
        }
        CatalogCommands::KoreanName { character_id, name } => {
            catalog.set_character_korean_name(character_id, name.as_deref())?;
            formatter.print(&*catalog.item(ItemKind::Character, character_id)?)?;
        }
        CatalogCommands::CacheStats => formatter.print(&catalog.cache_stats())?,
    }

    Ok(())
}

fn read_import(path: &Path) -> Result<CatalogImport> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid catalog file {}", path.display()))
}

/// Upsert anime before characters before appearances so links resolve.
pub fn import_catalog(services: &FeedServices, import: &CatalogImport) -> Result<serde_json::Value> {
    let catalog = services.catalog();
    for anime in &import.anime {
        catalog.upsert_anime(anime)?;
    }
    for character in &import.characters {
        catalog.upsert_character(character)?;
    }
    for link in &import.appearances {
        catalog.link_character(*link)?;
    }
    tracing::info!(
        anime = import.anime.len(),
        characters = import.characters.len(),
        appearances = import.appearances.len(),
        "catalog imported"
    );
    Ok(serde_json::json!({
        "anime": import.anime.len(),
        "characters": import.characters.len(),
        "appearances": import.appearances.len(),
    }))
}
