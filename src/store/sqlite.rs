use crate::error::{Error, Result};
use crate::store::{
    ArchiveRecord, LibraryStore, NewArchive, NewSyncFolder, OpenTab, RecordId, SyncFolder,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::spawn_blocking;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sync_folders (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id    INTEGER REFERENCES sync_folders(id) ON DELETE CASCADE,
    name         TEXT NOT NULL,
    path         TEXT NOT NULL UNIQUE,
    created_at   TEXT NOT NULL,
    last_sync_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS archives (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    sync_folder_id INTEGER NOT NULL REFERENCES sync_folders(id) ON DELETE CASCADE,
    name           TEXT NOT NULL,
    path           TEXT NOT NULL UNIQUE,
    created_at     TEXT NOT NULL,
    last_opened_at TEXT,
    was_read       INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS open_tabs (
    archive_id   INTEGER PRIMARY KEY REFERENCES archives(id) ON DELETE CASCADE,
    current_page TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sync_folders_parent ON sync_folders(parent_id);
CREATE INDEX IF NOT EXISTS idx_archives_folder ON archives(sync_folder_id);
";

const FOLDER_COLUMNS: &str = "id, parent_id, name, path, created_at, last_sync_at";
const ARCHIVE_COLUMNS: &str =
    "id, sync_folder_id, name, path, created_at, last_opened_at, was_read";

fn path_text(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<SyncFolder> {
    Ok(SyncFolder {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        name: row.get(2)?,
        path: PathBuf::from(row.get::<_, String>(3)?),
        created_at: row.get(4)?,
        last_sync_at: row.get(5)?,
    })
}

fn archive_from_row(row: &Row<'_>) -> rusqlite::Result<ArchiveRecord> {
    Ok(ArchiveRecord {
        id: row.get(0)?,
        sync_folder_id: row.get(1)?,
        name: row.get(2)?,
        path: PathBuf::from(row.get::<_, String>(3)?),
        created_at: row.get(4)?,
        last_opened_at: row.get(5)?,
        was_read: row.get(6)?,
    })
}

fn expect_updated(changed: usize, what: &str, id: RecordId) -> Result<()> {
    if changed == 0 {
        Err(Error::NotFound(format!("{} {}", what, id)))
    } else {
        Ok(())
    }
}

/// A [`LibraryStore`] backed by a SQLite database.
///
/// The connection is shared behind a mutex and every call runs as one statement (or one
/// transaction) on the blocking thread pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (creating if needed) the database file at `path` and applies the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = spawn_blocking(move || Connection::open(path)).await??;
        Self::initialize(conn).await
    }

    /// Opens a private in-memory database.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = spawn_blocking(Connection::open_in_memory).await??;
        Self::initialize(conn).await
    }

    async fn initialize(conn: Connection) -> Result<Self> {
        let store = SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        };
        store
            .with_conn(|conn| {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(store)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| Error::InvalidOperation("Store connection is poisoned".to_string()))?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl LibraryStore for SqliteStore {
    async fn find_folder_by_path(&self, path: &Path) -> Result<Option<SyncFolder>> {
        let path = path_text(path);
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM sync_folders WHERE path = ?1", FOLDER_COLUMNS),
                    params![path],
                    folder_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn folder(&self, id: RecordId) -> Result<Option<SyncFolder>> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM sync_folders WHERE id = ?1", FOLDER_COLUMNS),
                    params![id],
                    folder_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn insert_folder(&self, folder: NewSyncFolder) -> Result<SyncFolder> {
        self.with_conn(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO sync_folders (parent_id, name, path, created_at, last_sync_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![folder.parent_id, folder.name, path_text(&folder.path), now],
            )?;
            Ok(SyncFolder {
                id: conn.last_insert_rowid(),
                parent_id: folder.parent_id,
                name: folder.name,
                path: folder.path,
                created_at: now,
                last_sync_at: now,
            })
        })
        .await
    }

    async fn touch_folder(&self, id: RecordId, synced_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE sync_folders SET last_sync_at = ?2 WHERE id = ?1",
                params![id, synced_at],
            )?;
            expect_updated(changed, "Sync folder", id)
        })
        .await
    }

    async fn child_folders(&self, parent: Option<RecordId>) -> Result<Vec<SyncFolder>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM sync_folders WHERE parent_id IS ?1 ORDER BY id",
                FOLDER_COLUMNS
            ))?;
            let folders = stmt
                .query_map(params![parent], folder_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(folders)
        })
        .await
    }

    async fn delete_folder(&self, id: RecordId) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM sync_folders WHERE id = ?1", params![id])?;
            expect_updated(changed, "Sync folder", id)
        })
        .await
    }

    async fn archive_exists(&self, path: &Path) -> Result<bool> {
        let path = path_text(path);
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT 1 FROM archives WHERE path = ?1",
                    params![path],
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
        })
        .await
    }

    async fn archive(&self, id: RecordId) -> Result<Option<ArchiveRecord>> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM archives WHERE id = ?1", ARCHIVE_COLUMNS),
                    params![id],
                    archive_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn insert_archive(&self, archive: NewArchive) -> Result<ArchiveRecord> {
        self.with_conn(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO archives (sync_folder_id, name, path, created_at, was_read)
                 VALUES (?1, ?2, ?3, ?4, 0)",
                params![
                    archive.sync_folder_id,
                    archive.name,
                    path_text(&archive.path),
                    now
                ],
            )?;
            Ok(ArchiveRecord {
                id: conn.last_insert_rowid(),
                sync_folder_id: archive.sync_folder_id,
                name: archive.name,
                path: archive.path,
                created_at: now,
                last_opened_at: None,
                was_read: false,
            })
        })
        .await
    }

    async fn archives_in(&self, folder: RecordId) -> Result<Vec<ArchiveRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM archives WHERE sync_folder_id = ?1 ORDER BY id",
                ARCHIVE_COLUMNS
            ))?;
            let archives = stmt
                .query_map(params![folder], archive_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(archives)
        })
        .await
    }

    async fn set_read(&self, id: RecordId, was_read: bool) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE archives SET was_read = ?2 WHERE id = ?1",
                params![id, was_read],
            )?;
            expect_updated(changed, "Archive", id)
        })
        .await
    }

    async fn mark_opened(&self, id: RecordId, opened_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE archives SET last_opened_at = ?2 WHERE id = ?1",
                params![id, opened_at],
            )?;
            expect_updated(changed, "Archive", id)
        })
        .await
    }

    async fn save_tab(&self, tab: OpenTab) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO open_tabs (archive_id, current_page) VALUES (?1, ?2)
                 ON CONFLICT(archive_id) DO UPDATE SET current_page = excluded.current_page",
                params![tab.archive_id, tab.current_page],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_tab(&self, archive_id: RecordId) -> Result<Option<OpenTab>> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT archive_id, current_page FROM open_tabs WHERE archive_id = ?1",
                    params![archive_id],
                    |row| {
                        Ok(OpenTab {
                            archive_id: row.get(0)?,
                            current_page: row.get(1)?,
                        })
                    },
                )
                .optional()?)
        })
        .await
    }

    async fn close_tab(&self, archive_id: RecordId) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM open_tabs WHERE archive_id = ?1",
                params![archive_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn folder_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM sync_folders", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn archive_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM archives", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}
