//! SQLite-backed record of playlists and songs.
//!
//! Playlists and songs live in two tables with independent upstream-id
//! uniqueness. Song membership is a join table, so adding or removing a
//! playlist from a song is a single idempotent statement.
//!
//! Every write is durable as soon as the method returns; there is no batching
//! at this layer.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{LocalId, PlaylistRecord, SongRecord};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS playlists (
        local_id TEXT PRIMARY KEY NOT NULL,
        upstream_id TEXT NOT NULL UNIQUE,
        enabled INTEGER NOT NULL,
        storage_path TEXT NOT NULL,
        display_name TEXT NOT NULL,
        last_synced_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS songs (
        local_id TEXT PRIMARY KEY NOT NULL,
        upstream_id TEXT NOT NULL UNIQUE,
        file_path TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS song_playlists (
        song_id TEXT NOT NULL REFERENCES songs(local_id),
        playlist_id TEXT NOT NULL REFERENCES playlists(local_id),
        PRIMARY KEY (song_id, playlist_id)
    );
"#;

/// Errors raised by the playlist store
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this upstream id already exists. Callers must look up
    /// before creating; hitting this is a bug in the caller.
    #[error("{table} record with upstream id '{upstream_id}' already exists")]
    ConstraintViolation {
        table: &'static str,
        upstream_id: String,
    },

    #[error("Song not found: {0}")]
    SongNotFound(LocalId),

    #[error("Playlist not found: {0}")]
    PlaylistNotFound(LocalId),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of fresh identifiers
pub type IdSource = Box<dyn FnMut() -> Uuid + Send>;

/// Durable store for playlist and song records
pub struct PlaylistStore {
    conn: Connection,
    id_source: IdSource,
}

impl PlaylistStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        debug!(path = %path.display(), "Opening playlist store");
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a throwaway in-memory store
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn,
            id_source: Box::new(Uuid::new_v4),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Replace the identifier source (random v4 UUIDs by default)
    pub fn with_id_source(mut self, source: impl FnMut() -> Uuid + Send + 'static) -> Self {
        self.id_source = Box::new(source);
        self
    }

    /// Ensure all tables exist. Safe to call repeatedly.
    pub fn initialize(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Draw an identifier unused by any playlist or song.
    ///
    /// With `check_collision` unset the first draw is returned as is.
    pub fn generate_id(&mut self, check_collision: bool) -> Result<LocalId, StoreError> {
        loop {
            let id = LocalId::from_uuid((self.id_source)());
            if !check_collision || !self.id_in_use(&id)? {
                return Ok(id);
            }
            debug!(%id, "Identifier collision, drawing again");
        }
    }

    fn id_in_use(&self, id: &LocalId) -> Result<bool, StoreError> {
        let in_use = self.conn.query_row(
            "SELECT EXISTS (
                SELECT 1 FROM playlists WHERE local_id = ?1
                UNION ALL
                SELECT 1 FROM songs WHERE local_id = ?1
            )",
            params![id],
            |row| row.get(0),
        )?;
        Ok(in_use)
    }

    // ------------------------------------------------------------------
    // Playlists
    // ------------------------------------------------------------------

    pub fn find_playlist_by_upstream_id(
        &self,
        upstream_id: &str,
    ) -> Result<Option<PlaylistRecord>, StoreError> {
        let playlist = self
            .conn
            .query_row(
                "SELECT local_id, upstream_id, enabled, storage_path, display_name, last_synced_at
                 FROM playlists WHERE upstream_id = ?1",
                params![upstream_id],
                map_playlist,
            )
            .optional()?;
        Ok(playlist)
    }

    /// Insert a new playlist stamped with the current time.
    ///
    /// Does not upsert: an existing upstream id is a `ConstraintViolation`.
    pub fn create_playlist(
        &mut self,
        enabled: bool,
        upstream_id: &str,
        storage_path: &Path,
        display_name: &str,
    ) -> Result<LocalId, StoreError> {
        if self.find_playlist_by_upstream_id(upstream_id)?.is_some() {
            return Err(StoreError::ConstraintViolation {
                table: "playlists",
                upstream_id: upstream_id.to_string(),
            });
        }

        let local_id = self.generate_id(true)?;
        self.conn.execute(
            "INSERT INTO playlists
                (local_id, upstream_id, enabled, storage_path, display_name, last_synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                local_id,
                upstream_id,
                enabled,
                storage_path.to_string_lossy().into_owned(),
                display_name,
                Utc::now(),
            ],
        )?;

        debug!(%local_id, upstream_id, "Created playlist record");
        Ok(local_id)
    }

    /// Stamp a playlist as synchronized now
    pub fn touch_playlist(&self, playlist_id: &LocalId) -> Result<(), StoreError> {
        let updated = self.conn.execute(
            "UPDATE playlists SET last_synced_at = ?1 WHERE local_id = ?2",
            params![Utc::now(), playlist_id],
        )?;
        if updated == 0 {
            return Err(StoreError::PlaylistNotFound(*playlist_id));
        }
        Ok(())
    }

    /// Toggle the selective-sync flag. Returns false for unknown playlists.
    pub fn set_playlist_enabled(&self, upstream_id: &str, enabled: bool) -> Result<bool, StoreError> {
        let updated = self.conn.execute(
            "UPDATE playlists SET enabled = ?1 WHERE upstream_id = ?2",
            params![enabled, upstream_id],
        )?;
        Ok(updated > 0)
    }

    /// All playlists ordered by display name
    pub fn list_playlists(&self) -> Result<Vec<PlaylistRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT local_id, upstream_id, enabled, storage_path, display_name, last_synced_at
             FROM playlists ORDER BY display_name ASC",
        )?;
        let playlists = stmt
            .query_map([], map_playlist)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(playlists)
    }

    // ------------------------------------------------------------------
    // Songs
    // ------------------------------------------------------------------

    pub fn find_song_by_upstream_id(
        &self,
        upstream_id: &str,
    ) -> Result<Option<SongRecord>, StoreError> {
        let song = self
            .conn
            .query_row(
                "SELECT local_id, upstream_id, file_path FROM songs WHERE upstream_id = ?1",
                params![upstream_id],
                map_song,
            )
            .optional()?;

        match song {
            Some(mut song) => {
                song.member_playlists = self.memberships(&song.local_id)?;
                Ok(Some(song))
            }
            None => Ok(None),
        }
    }

    /// Insert a new song and its initial memberships in one transaction.
    ///
    /// Relative `file_path`s are made absolute against the working directory.
    pub fn create_song(
        &mut self,
        file_path: &Path,
        upstream_id: &str,
        initial_playlists: &BTreeSet<LocalId>,
    ) -> Result<LocalId, StoreError> {
        if self.find_song_by_upstream_id(upstream_id)?.is_some() {
            return Err(StoreError::ConstraintViolation {
                table: "songs",
                upstream_id: upstream_id.to_string(),
            });
        }

        let local_id = self.generate_id(true)?;
        let file_path = std::path::absolute(file_path)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO songs (local_id, upstream_id, file_path) VALUES (?1, ?2, ?3)",
            params![local_id, upstream_id, file_path.to_string_lossy().into_owned()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO song_playlists (song_id, playlist_id) VALUES (?1, ?2)",
            )?;
            for playlist_id in initial_playlists {
                stmt.execute(params![local_id, playlist_id])?;
            }
        }
        tx.commit()?;

        debug!(%local_id, upstream_id, path = %file_path.display(), "Created song record");
        Ok(local_id)
    }

    /// Record that a song belongs to a playlist. No-op if it already does.
    pub fn add_song_to_playlist(
        &self,
        song_id: &LocalId,
        playlist_id: &LocalId,
    ) -> Result<(), StoreError> {
        self.ensure_song_exists(song_id)?;
        self.ensure_playlist_exists(playlist_id)?;

        self.conn.execute(
            "INSERT OR IGNORE INTO song_playlists (song_id, playlist_id) VALUES (?1, ?2)",
            params![song_id, playlist_id],
        )?;
        Ok(())
    }

    /// Drop a song's membership in a playlist. No-op if it is not a member.
    ///
    /// The song record itself is kept even when no memberships remain.
    pub fn remove_song_from_playlist(
        &self,
        song_id: &LocalId,
        playlist_id: &LocalId,
    ) -> Result<(), StoreError> {
        self.ensure_song_exists(song_id)?;

        self.conn.execute(
            "DELETE FROM song_playlists WHERE song_id = ?1 AND playlist_id = ?2",
            params![song_id, playlist_id],
        )?;
        Ok(())
    }

    /// All songs ordered by file path
    pub fn list_songs(&self) -> Result<Vec<SongRecord>, StoreError> {
        let mut memberships: HashMap<LocalId, BTreeSet<LocalId>> = HashMap::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT song_id, playlist_id FROM song_playlists")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, LocalId>(0)?, row.get::<_, LocalId>(1)?))
            })?;
            for row in rows {
                let (song_id, playlist_id) = row?;
                memberships.entry(song_id).or_default().insert(playlist_id);
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT local_id, upstream_id, file_path FROM songs ORDER BY file_path ASC")?;
        let mut songs = stmt
            .query_map([], map_song)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;

        for song in &mut songs {
            song.member_playlists = memberships.remove(&song.local_id).unwrap_or_default();
        }
        Ok(songs)
    }

    /// Songs that currently belong to a playlist
    pub fn songs_in_playlist(&self, playlist_id: &LocalId) -> Result<Vec<SongRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.local_id, s.upstream_id, s.file_path
             FROM songs s
             JOIN song_playlists sp ON sp.song_id = s.local_id
             WHERE sp.playlist_id = ?1
             ORDER BY s.file_path ASC",
        )?;
        let mut songs = stmt
            .query_map(params![playlist_id], map_song)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;

        for song in &mut songs {
            song.member_playlists = self.memberships(&song.local_id)?;
        }
        Ok(songs)
    }

    fn memberships(&self, song_id: &LocalId) -> Result<BTreeSet<LocalId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT playlist_id FROM song_playlists WHERE song_id = ?1")?;
        let ids = stmt
            .query_map(params![song_id], |row| row.get(0))?
            .collect::<Result<BTreeSet<LocalId>, rusqlite::Error>>()?;
        Ok(ids)
    }

    fn ensure_song_exists(&self, song_id: &LocalId) -> Result<(), StoreError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM songs WHERE local_id = ?1)",
            params![song_id],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::SongNotFound(*song_id))
        }
    }

    fn ensure_playlist_exists(&self, playlist_id: &LocalId) -> Result<(), StoreError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM playlists WHERE local_id = ?1)",
            params![playlist_id],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::PlaylistNotFound(*playlist_id))
        }
    }
}

fn map_playlist(row: &Row<'_>) -> rusqlite::Result<PlaylistRecord> {
    Ok(PlaylistRecord {
        local_id: row.get(0)?,
        upstream_id: row.get(1)?,
        enabled: row.get(2)?,
        storage_path: PathBuf::from(row.get::<_, String>(3)?),
        display_name: row.get(4)?,
        last_synced_at: row.get::<_, DateTime<Utc>>(5)?,
    })
}

fn map_song(row: &Row<'_>) -> rusqlite::Result<SongRecord> {
    Ok(SongRecord {
        local_id: row.get(0)?,
        upstream_id: row.get(1)?,
        file_path: PathBuf::from(row.get::<_, String>(2)?),
        member_playlists: BTreeSet::new(),
    })
}

impl ToSql for LocalId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for LocalId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn store() -> PlaylistStore {
        PlaylistStore::in_memory().unwrap()
    }

    fn playlist(store: &mut PlaylistStore, upstream_id: &str) -> LocalId {
        store
            .create_playlist(true, upstream_id, Path::new("/music/Mix"), "Mix")
            .unwrap()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut store = store();
        let id = playlist(&mut store, "PL1");

        store.initialize().unwrap();
        store.initialize().unwrap();

        let found = store.find_playlist_by_upstream_id("PL1").unwrap().unwrap();
        assert_eq!(found.local_id, id);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let temp = tempfile::TempDir::new().unwrap();
        let db_path = temp.path().join("nested").join("dir").join("msync.db");

        let mut store = PlaylistStore::open(&db_path).unwrap();
        playlist(&mut store, "PL1");
        drop(store);

        let reopened = PlaylistStore::open(&db_path).unwrap();
        assert!(reopened.find_playlist_by_upstream_id("PL1").unwrap().is_some());
    }

    #[test]
    fn test_create_and_find_playlist() {
        let mut store = store();
        let id = store
            .create_playlist(false, "PL1", Path::new("/music/Road Trip"), "Road Trip")
            .unwrap();

        let found = store.find_playlist_by_upstream_id("PL1").unwrap().unwrap();
        assert_eq!(found.local_id, id);
        assert_eq!(found.upstream_id, "PL1");
        assert!(!found.enabled);
        assert_eq!(found.storage_path, PathBuf::from("/music/Road Trip"));
        assert_eq!(found.display_name, "Road Trip");

        assert!(store.find_playlist_by_upstream_id("PL2").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_playlist_is_constraint_violation() {
        let mut store = store();
        playlist(&mut store, "PL1");

        let err = store
            .create_playlist(true, "PL1", Path::new("/elsewhere"), "Other")
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConstraintViolation { table: "playlists", .. }
        ));
        assert_eq!(store.list_playlists().unwrap().len(), 1);
    }

    #[test]
    fn test_create_and_find_song() {
        let mut store = store();
        let pl = playlist(&mut store, "PL1");

        let id = store
            .create_song(Path::new("/storage/a.m4a"), "S1", &[pl].into_iter().collect())
            .unwrap();

        let song = store.find_song_by_upstream_id("S1").unwrap().unwrap();
        assert_eq!(song.local_id, id);
        assert_eq!(song.file_path, PathBuf::from("/storage/a.m4a"));
        assert_eq!(song.member_playlists, [pl].into_iter().collect());
    }

    #[test]
    fn test_song_path_is_made_absolute() {
        let mut store = store();
        let pl = playlist(&mut store, "PL1");

        store
            .create_song(Path::new("relative.m4a"), "S1", &[pl].into_iter().collect())
            .unwrap();

        let song = store.find_song_by_upstream_id("S1").unwrap().unwrap();
        assert!(song.file_path.is_absolute());
        assert!(song.file_path.ends_with("relative.m4a"));
    }

    #[test]
    fn test_duplicate_song_is_constraint_violation() {
        let mut store = store();
        let pl = playlist(&mut store, "PL1");
        let members: BTreeSet<_> = [pl].into_iter().collect();

        store.create_song(Path::new("/s/a.m4a"), "S1", &members).unwrap();
        let err = store
            .create_song(Path::new("/s/b.m4a"), "S1", &members)
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::ConstraintViolation { table: "songs", .. }
        ));
    }

    #[test]
    fn test_playlist_and_song_upstream_ids_are_separate_domains() {
        let mut store = store();
        let pl = playlist(&mut store, "SAME");

        store
            .create_song(Path::new("/s/a.m4a"), "SAME", &[pl].into_iter().collect())
            .unwrap();

        assert!(store.find_playlist_by_upstream_id("SAME").unwrap().is_some());
        assert!(store.find_song_by_upstream_id("SAME").unwrap().is_some());
    }

    #[test]
    fn test_membership_add_and_remove_are_idempotent() {
        let mut store = store();
        let a = playlist(&mut store, "A");
        let b = store
            .create_playlist(true, "B", Path::new("/music/B"), "B")
            .unwrap();
        let song = store
            .create_song(Path::new("/s/a.m4a"), "S1", &[a].into_iter().collect())
            .unwrap();

        store.add_song_to_playlist(&song, &b).unwrap();
        store.add_song_to_playlist(&song, &b).unwrap();
        let record = store.find_song_by_upstream_id("S1").unwrap().unwrap();
        assert_eq!(record.member_playlists, [a, b].into_iter().collect());

        store.remove_song_from_playlist(&song, &a).unwrap();
        store.remove_song_from_playlist(&song, &a).unwrap();
        let record = store.find_song_by_upstream_id("S1").unwrap().unwrap();
        assert_eq!(record.member_playlists, [b].into_iter().collect());
    }

    #[test]
    fn test_song_retained_without_memberships() {
        let mut store = store();
        let a = playlist(&mut store, "A");
        let song = store
            .create_song(Path::new("/s/a.m4a"), "S1", &[a].into_iter().collect())
            .unwrap();

        store.remove_song_from_playlist(&song, &a).unwrap();

        let record = store.find_song_by_upstream_id("S1").unwrap().unwrap();
        assert!(record.member_playlists.is_empty());
    }

    #[test]
    fn test_membership_on_unknown_records() {
        let mut store = store();
        let a = playlist(&mut store, "A");
        let song = store
            .create_song(Path::new("/s/a.m4a"), "S1", &[a].into_iter().collect())
            .unwrap();

        let ghost = LocalId::random();
        assert!(matches!(
            store.add_song_to_playlist(&ghost, &a),
            Err(StoreError::SongNotFound(_))
        ));
        assert!(matches!(
            store.add_song_to_playlist(&song, &ghost),
            Err(StoreError::PlaylistNotFound(_))
        ));
    }

    #[test]
    fn test_touch_playlist_advances_timestamp() {
        let mut store = store();
        let id = playlist(&mut store, "PL1");
        let before = store
            .find_playlist_by_upstream_id("PL1")
            .unwrap()
            .unwrap()
            .last_synced_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.touch_playlist(&id).unwrap();

        let after = store
            .find_playlist_by_upstream_id("PL1")
            .unwrap()
            .unwrap()
            .last_synced_at;
        assert!(after > before);

        assert!(matches!(
            store.touch_playlist(&LocalId::random()),
            Err(StoreError::PlaylistNotFound(_))
        ));
    }

    #[test]
    fn test_set_playlist_enabled() {
        let mut store = store();
        playlist(&mut store, "PL1");

        assert!(store.set_playlist_enabled("PL1", false).unwrap());
        assert!(!store.find_playlist_by_upstream_id("PL1").unwrap().unwrap().enabled);
        assert!(!store.set_playlist_enabled("missing", false).unwrap());
    }

    #[test]
    fn test_songs_in_playlist() {
        let mut store = store();
        let a = playlist(&mut store, "A");
        let b = store
            .create_playlist(true, "B", Path::new("/music/B"), "B")
            .unwrap();

        store
            .create_song(Path::new("/s/1.m4a"), "S1", &[a].into_iter().collect())
            .unwrap();
        store
            .create_song(Path::new("/s/2.m4a"), "S2", &[a, b].into_iter().collect())
            .unwrap();

        let in_a = store.songs_in_playlist(&a).unwrap();
        let in_b = store.songs_in_playlist(&b).unwrap();
        assert_eq!(in_a.len(), 2);
        assert_eq!(in_b.len(), 1);
        assert_eq!(in_b[0].upstream_id, "S2");
        assert_eq!(in_b[0].member_playlists.len(), 2);

        let all = store.list_songs().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].member_playlists, [a, b].into_iter().collect());
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let mut store = store();
        let mut seen = BTreeSet::new();

        for i in 0..50 {
            let id = store
                .create_playlist(true, &format!("PL{i}"), Path::new("/m"), "m")
                .unwrap();
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn test_generate_id_redraws_on_collision() {
        let taken = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let fresh = Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap();

        let draws = Arc::new(Mutex::new(VecDeque::from([taken, taken, fresh])));
        let source = {
            let draws = Arc::clone(&draws);
            move || draws.lock().unwrap().pop_front().unwrap_or_else(Uuid::new_v4)
        };

        let mut store = store().with_id_source(source);
        let first = playlist(&mut store, "A");
        assert_eq!(first.as_uuid(), taken);

        // Next two draws are `taken` (in use) then `fresh`
        let pl = first;
        let song = store
            .create_song(Path::new("/s/a.m4a"), "S1", &[pl].into_iter().collect())
            .unwrap();
        assert_eq!(song.as_uuid(), fresh);
        assert!(draws.lock().unwrap().is_empty());
    }

    #[test]
    fn test_generate_id_without_check_takes_first_draw() {
        let taken = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let mut store = store().with_id_source(move || taken);
        playlist(&mut store, "A");

        let id = store.generate_id(false).unwrap();
        assert_eq!(id.as_uuid(), taken);
    }
}
