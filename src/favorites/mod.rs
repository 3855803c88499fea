// Favorites store - which stories and songs the family has starred
// The in-memory sets are the operative truth for the current run; SQLite
// persistence is best-effort and a failed write never changes an answer.

use crate::catalog::{Catalog, ContentType, Track};
use anyhow::Result;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Clone)]
pub struct FavoritesStore {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    stories: HashSet<i64>,
    songs: HashSet<i64>,
    db: Option<Connection>,
}

impl FavoritesStore {
    /// No persistence; favorites live for the process only.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                stories: HashSet::new(),
                songs: HashSet::new(),
                db: None,
            })),
        }
    }

    /// Open (or create) the favorites database and load what's in it.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS favorites (
                content_type TEXT NOT NULL,
                content_id INTEGER NOT NULL,
                added_at TEXT NOT NULL,
                PRIMARY KEY (content_type, content_id)
            )",
            [],
        )?;

        let mut stories = HashSet::new();
        let mut songs = HashSet::new();
        {
            let mut stmt = conn.prepare("SELECT content_type, content_id FROM favorites")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (content_type, id) = row?;
                match content_type.as_str() {
                    "story" => {
                        stories.insert(id);
                    }
                    "song" => {
                        songs.insert(id);
                    }
                    other => warn!("Ignoring favorite with unknown content type '{}'", other),
                }
            }
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                stories,
                songs,
                db: Some(conn),
            })),
        })
    }

    /// Flip membership; returns whether the content is a favorite afterwards.
    pub fn toggle(&self, content_type: ContentType, id: i64) -> bool {
        let mut inner = self.inner.lock().unwrap();

        let set = match content_type {
            ContentType::Story => &mut inner.stories,
            ContentType::Song => &mut inner.songs,
        };

        let now_favorite = if set.remove(&id) {
            false
        } else {
            set.insert(id);
            true
        };

        if let Some(conn) = &inner.db {
            let result = if now_favorite {
                conn.execute(
                    "INSERT OR REPLACE INTO favorites (content_type, content_id, added_at)
                     VALUES (?1, ?2, ?3)",
                    params![
                        content_type.to_string(),
                        id,
                        chrono::Utc::now().to_rfc3339()
                    ],
                )
            } else {
                conn.execute(
                    "DELETE FROM favorites WHERE content_type = ?1 AND content_id = ?2",
                    params![content_type.to_string(), id],
                )
            };
            if let Err(e) = result {
                warn!("Failed to persist favorite {} #{}: {}", content_type, id, e);
            }
        }

        now_favorite
    }

    pub fn is_favorite(&self, content_type: ContentType, id: i64) -> bool {
        let inner = self.inner.lock().unwrap();
        match content_type {
            ContentType::Story => inner.stories.contains(&id),
            ContentType::Song => inner.songs.contains(&id),
        }
    }

    /// Favorited tracks of one type, resolved against the catalog.
    pub fn list_favorites(&self, catalog: &Catalog, content_type: ContentType) -> Vec<Track> {
        let inner = self.inner.lock().unwrap();
        let ids = match content_type {
            ContentType::Story => &inner.stories,
            ContentType::Song => &inner.songs,
        };
        catalog
            .all(content_type)
            .into_iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_pair_is_idempotent() {
        let store = FavoritesStore::in_memory();

        let before = store.is_favorite(ContentType::Story, 5);
        store.toggle(ContentType::Story, 5);
        store.toggle(ContentType::Story, 5);
        assert_eq!(store.is_favorite(ContentType::Story, 5), before);
    }

    #[test]
    fn test_story_and_song_ids_do_not_collide() {
        let store = FavoritesStore::in_memory();

        assert!(store.toggle(ContentType::Story, 1));
        assert!(!store.is_favorite(ContentType::Song, 1));
        assert!(store.is_favorite(ContentType::Story, 1));
    }

    #[test]
    fn test_favorites_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favorites.db");

        {
            let store = FavoritesStore::open(&path).unwrap();
            store.toggle(ContentType::Song, 7);
            store.toggle(ContentType::Story, 9);
            store.toggle(ContentType::Story, 9); // un-favorited again
        }

        let reopened = FavoritesStore::open(&path).unwrap();
        assert!(reopened.is_favorite(ContentType::Song, 7));
        assert!(!reopened.is_favorite(ContentType::Story, 9));
    }

    #[test]
    fn test_list_favorites_resolves_tracks() {
        let store = FavoritesStore::in_memory();
        let catalog = Catalog::builtin();

        store.toggle(ContentType::Song, 2);
        store.toggle(ContentType::Song, 7);

        let favorites = store.list_favorites(&catalog, ContentType::Song);
        let mut titles: Vec<_> = favorites.iter().map(|t| t.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["Little Star", "Lullaby"]);
        assert!(store.list_favorites(&catalog, ContentType::Story).is_empty());
    }
}
