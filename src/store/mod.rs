//! Store module defines the persisted library state and the interface used to access it.
//!
//! The library remembers three kinds of records:
//!
//! - [`SyncFolder`]: a folder tree node below a synced path, linked to its parent by id
//! - [`ArchiveRecord`]: a volume found inside a sync folder, with its reading state
//! - [`OpenTab`]: the reading position of an archive currently open for reading
//!
//! The core never keeps a store transaction open across archive I/O. Every [`LibraryStore`]
//! call is a short, independent operation, and the store is handed to the components that need
//! it ([`crate::sync::Reconciler`], [`crate::session::ReadingSession`], [`crate::Library`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::Result;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Identifier of a persisted record.
pub type RecordId = i64;

/// A folder node of a synced tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SyncFolder {
    pub id: RecordId,
    /// `None` for the root of a synced path.
    pub parent_id: Option<RecordId>,
    pub name: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_sync_at: DateTime<Utc>,
}

/// A volume (archive file or image folder) belonging to one sync folder.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ArchiveRecord {
    pub id: RecordId,
    pub sync_folder_id: RecordId,
    pub name: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_opened_at: Option<DateTime<Utc>>,
    pub was_read: bool,
}

/// Reading position of an open archive. At most one per archive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OpenTab {
    pub archive_id: RecordId,
    /// Entry key of the page being read.
    pub current_page: String,
}

/// Fields of a sync folder about to be inserted.
#[derive(Debug, Clone)]
pub struct NewSyncFolder {
    pub parent_id: Option<RecordId>,
    pub name: String,
    pub path: PathBuf,
}

/// Fields of an archive record about to be inserted.
#[derive(Debug, Clone)]
pub struct NewArchive {
    pub sync_folder_id: RecordId,
    pub name: String,
    pub path: PathBuf,
}

/// Persistence operations over the library records.
///
/// Deleting a folder deletes its descendant folders, their archives and those archives' open
/// tabs. Folder paths and archive paths are unique.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Looks up a sync folder by its exact path.
    async fn find_folder_by_path(&self, path: &Path) -> Result<Option<SyncFolder>>;

    async fn folder(&self, id: RecordId) -> Result<Option<SyncFolder>>;

    /// Inserts a folder, stamping both timestamps with the current time.
    async fn insert_folder(&self, folder: NewSyncFolder) -> Result<SyncFolder>;

    /// Sets `last_sync_at` of a folder.
    async fn touch_folder(&self, id: RecordId, synced_at: DateTime<Utc>) -> Result<()>;

    /// Direct children of `parent`, or the synced roots for `None`. Ordered by id.
    async fn child_folders(&self, parent: Option<RecordId>) -> Result<Vec<SyncFolder>>;

    /// Deletes a folder with everything below it.
    async fn delete_folder(&self, id: RecordId) -> Result<()>;

    /// Returns true if an archive record with this exact path exists.
    async fn archive_exists(&self, path: &Path) -> Result<bool>;

    async fn archive(&self, id: RecordId) -> Result<Option<ArchiveRecord>>;

    /// Inserts an unread, never opened archive record.
    async fn insert_archive(&self, archive: NewArchive) -> Result<ArchiveRecord>;

    /// Archives directly owned by a folder. Ordered by id.
    async fn archives_in(&self, folder: RecordId) -> Result<Vec<ArchiveRecord>>;

    async fn set_read(&self, id: RecordId, was_read: bool) -> Result<()>;

    /// Sets `last_opened_at` of an archive.
    async fn mark_opened(&self, id: RecordId, opened_at: DateTime<Utc>) -> Result<()>;

    /// Inserts or replaces the open tab of `tab.archive_id`.
    async fn save_tab(&self, tab: OpenTab) -> Result<()>;

    async fn find_tab(&self, archive_id: RecordId) -> Result<Option<OpenTab>>;

    /// Removes the open tab of an archive, if any.
    async fn close_tab(&self, archive_id: RecordId) -> Result<()>;

    /// Total number of folder records.
    async fn folder_count(&self) -> Result<usize>;

    /// Total number of archive records.
    async fn archive_count(&self) -> Result<usize>;
}
