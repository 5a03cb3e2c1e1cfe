//! Anime and character catalog tables.
//!
//! The catalog is imported from external metadata sources and is read-mostly;
//! the only in-app edits are curator changes to localized titles.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::domain::CharacterRole;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimeRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub title_korean: Option<String>,
    #[serde(default)]
    pub title_japanese: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub episodes: Option<i64>,
    /// Minutes per episode
    #[serde(default)]
    pub duration: Option<i64>,
    /// ISO date (`YYYY-MM-DD`)
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub name_korean: Option<String>,
    #[serde(default)]
    pub name_japanese: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Appearance of a character in an anime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterLink {
    pub anime_id: i64,
    pub character_id: i64,
    pub role: CharacterRole,
}

/// An anime a character appears in, with the fields used to rank it as the
/// character's primary parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentCandidate {
    pub anime_id: i64,
    pub title: String,
    pub role: CharacterRole,
    pub start_date: Option<String>,
    pub popularity: Option<i64>,
}

impl AnimeRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            title_korean: row.get(2)?,
            title_japanese: row.get(3)?,
            image_url: row.get(4)?,
            episodes: row.get(5)?,
            duration: row.get(6)?,
            start_date: row.get(7)?,
            popularity: row.get(8)?,
            genres: Vec::new(),
        })
    }
}

pub fn upsert_anime(conn: &Connection, anime: &AnimeRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO anime (
            id, title, title_korean, title_japanese, image_url,
            episodes, duration, start_date, popularity
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            title = excluded.title,
            title_korean = excluded.title_korean,
            title_japanese = excluded.title_japanese,
            image_url = excluded.image_url,
            episodes = excluded.episodes,
            duration = excluded.duration,
            start_date = excluded.start_date,
            popularity = excluded.popularity",
        params![
            anime.id,
            anime.title,
            anime.title_korean,
            anime.title_japanese,
            anime.image_url,
            anime.episodes,
            anime.duration,
            anime.start_date,
            anime.popularity,
        ],
    )
    .with_context(|| format!("Failed to upsert anime {}", anime.id))?;

    set_anime_genres(conn, anime.id, &anime.genres)
}

/// Replace the genre set of an anime.
pub fn set_anime_genres(conn: &Connection, anime_id: i64, genres: &[String]) -> Result<()> {
    conn.execute("DELETE FROM anime_genres WHERE anime_id = ?", params![anime_id])
        .context("Failed to clear anime genres")?;
    for genre in genres {
        conn.execute(
            "INSERT OR IGNORE INTO anime_genres (anime_id, genre) VALUES (?, ?)",
            params![anime_id, genre],
        )
        .context("Failed to insert anime genre")?;
    }
    Ok(())
}

pub fn upsert_character(conn: &Connection, character: &CharacterRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO characters (id, name, name_korean, name_japanese, image_url)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            name_korean = excluded.name_korean,
            name_japanese = excluded.name_japanese,
            image_url = excluded.image_url",
        params![
            character.id,
            character.name,
            character.name_korean,
            character.name_japanese,
            character.image_url,
        ],
    )
    .with_context(|| format!("Failed to upsert character {}", character.id))?;
    Ok(())
}

pub fn link_character(conn: &Connection, link: &CharacterLink) -> Result<()> {
    conn.execute(
        "INSERT INTO anime_character (anime_id, character_id, role) VALUES (?, ?, ?)
         ON CONFLICT (anime_id, character_id) DO UPDATE SET role = excluded.role",
        params![link.anime_id, link.character_id, link.role],
    )
    .context("Failed to link character")?;
    Ok(())
}

/// Curator edit of the Korean title. Returns false if the anime is unknown.
pub fn set_anime_korean_title(conn: &Connection, anime_id: i64, title: Option<&str>) -> Result<bool> {
    let updated = conn
        .execute(
            "UPDATE anime SET title_korean = ? WHERE id = ?",
            params![title, anime_id],
        )
        .context("Failed to update anime title_korean")?;
    Ok(updated > 0)
}

/// Curator edit of the Korean name. Returns false if the character is unknown.
pub fn set_character_korean_name(
    conn: &Connection,
    character_id: i64,
    name: Option<&str>,
) -> Result<bool> {
    let updated = conn
        .execute(
            "UPDATE characters SET name_korean = ? WHERE id = ?",
            params![name, character_id],
        )
        .context("Failed to update character name_korean")?;
    Ok(updated > 0)
}

pub fn get_anime(conn: &Connection, anime_id: i64) -> Result<Option<AnimeRecord>> {
    let anime = conn
        .query_row(
            "SELECT id, title, title_korean, title_japanese, image_url,
                    episodes, duration, start_date, popularity
             FROM anime WHERE id = ?",
            params![anime_id],
            AnimeRecord::from_row,
        )
        .optional()
        .context("Failed to query anime")?;

    let Some(mut anime) = anime else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare_cached("SELECT genre FROM anime_genres WHERE anime_id = ? ORDER BY genre")
        .context("Failed to prepare genre query")?;
    anime.genres = stmt
        .query_map(params![anime_id], |row| row.get(0))
        .context("Failed to query genres")?
        .collect::<Result<Vec<String>, _>>()
        .context("Failed to read genres")?;

    Ok(Some(anime))
}

pub fn get_character(conn: &Connection, character_id: i64) -> Result<Option<CharacterRecord>> {
    conn.query_row(
        "SELECT id, name, name_korean, name_japanese, image_url FROM characters WHERE id = ?",
        params![character_id],
        |row| {
            Ok(CharacterRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                name_korean: row.get(2)?,
                name_japanese: row.get(3)?,
                image_url: row.get(4)?,
            })
        },
    )
    .optional()
    .context("Failed to query character")
}

/// All anime a character appears in, unordered.
pub fn parent_candidates(conn: &Connection, character_id: i64) -> Result<Vec<ParentCandidate>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT a.id, a.title, ac.role, a.start_date, a.popularity
             FROM anime_character ac
             JOIN anime a ON a.id = ac.anime_id
             WHERE ac.character_id = ?",
        )
        .context("Failed to prepare parent candidate query")?;
    let candidates = stmt
        .query_map(params![character_id], |row| {
            Ok(ParentCandidate {
                anime_id: row.get(0)?,
                title: row.get(1)?,
                role: row.get(2)?,
                start_date: row.get(3)?,
                popularity: row.get(4)?,
            })
        })
        .context("Failed to query parent candidates")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read parent candidates")?;
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FeedDb;

    fn setup() -> FeedDb {
        let db = FeedDb::open_in_memory().unwrap();
        db.init_schema().unwrap();
        db
    }

    fn make_anime(id: i64, title: &str) -> AnimeRecord {
        AnimeRecord {
            id,
            title: title.to_string(),
            title_korean: None,
            title_japanese: None,
            image_url: Some(format!("https://img/{id}.jpg")),
            episodes: Some(12),
            duration: Some(24),
            start_date: Some("2013-04-07".to_string()),
            popularity: Some(100),
            genres: vec!["Action".to_string(), "Drama".to_string()],
        }
    }

    #[test]
    fn test_upsert_anime_replaces_fields_and_genres() {
        let db = setup();
        upsert_anime(db.conn(), &make_anime(16498, "Shingeki no Kyojin")).unwrap();

        let mut updated = make_anime(16498, "Attack on Titan");
        updated.genres = vec!["Action".to_string()];
        upsert_anime(db.conn(), &updated).unwrap();

        let anime = get_anime(db.conn(), 16498).unwrap().unwrap();
        assert_eq!(anime.title, "Attack on Titan");
        assert_eq!(anime.genres, vec!["Action".to_string()]);
        assert!(get_anime(db.conn(), 1).unwrap().is_none());
    }

    #[test]
    fn test_korean_title_edit() {
        let db = setup();
        upsert_anime(db.conn(), &make_anime(1, "Title")).unwrap();
        assert!(set_anime_korean_title(db.conn(), 1, Some("진격의 거인")).unwrap());
        assert!(!set_anime_korean_title(db.conn(), 2, Some("x")).unwrap());

        let anime = get_anime(db.conn(), 1).unwrap().unwrap();
        assert_eq!(anime.title_korean.as_deref(), Some("진격의 거인"));
    }

    #[test]
    fn test_parent_candidates() {
        let db = setup();
        upsert_anime(db.conn(), &make_anime(1, "First")).unwrap();
        upsert_anime(db.conn(), &make_anime(2, "Second")).unwrap();
        upsert_character(
            db.conn(),
            &CharacterRecord {
                id: 40,
                name: "Levi".to_string(),
                name_korean: None,
                name_japanese: None,
                image_url: None,
            },
        )
        .unwrap();
        link_character(
            db.conn(),
            &CharacterLink {
                anime_id: 1,
                character_id: 40,
                role: CharacterRole::Supporting,
            },
        )
        .unwrap();
        link_character(
            db.conn(),
            &CharacterLink {
                anime_id: 2,
                character_id: 40,
                role: CharacterRole::Main,
            },
        )
        .unwrap();

        let mut candidates = parent_candidates(db.conn(), 40).unwrap();
        candidates.sort_by_key(|c| c.anime_id);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].role, CharacterRole::Main);
        assert_eq!(candidates[1].title, "Second");
    }
}
