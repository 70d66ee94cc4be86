use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::path_utils::ENTRY_SEPARATORS;
use crate::session::{EditSession, ReadingSession};
use crate::store::{ArchiveRecord, LibraryStore, RecordId, SyncFolder};
use crate::sync::{MergeReport, Reconciler};

/// Compression applied to entries of saved zip archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ZipCompression {
    /// Entries are stored as-is. Pages are usually already compressed images.
    Stored,
    Deflated,
}

/// Library configuration, built declaratively using the builder pattern.
///
/// ```rust,no_run
/// # use mangaman::prelude::*;
/// let config = LibraryConfig::builder()
///     .zip_compression(ZipCompression::Stored)
///     .max_concurrent_reads(4usize)
///     .build()
///     .expect("Invalid configuration");
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LibraryConfig {
    /// Suffix of the temporary sibling a save is staged into.
    ///
    /// `vol.cbz` is staged as `vol{suffix}.cbz`, a folder `vol` as `vol{suffix}`.
    #[builder(default = "\"__TEMP__\".to_string()")]
    pub temp_suffix: String,

    /// Compression of entries in saved zip archives.
    #[builder(default = "ZipCompression::Deflated")]
    pub zip_compression: ZipCompression,

    /// Number of entries read ahead while staging a save.
    #[builder(default = "num_cpus::get().min(8).max(1)")]
    pub max_concurrent_reads: usize,

    /// Ignore dot-files in folder archives and folder scans.
    #[builder(default = "true")]
    pub skip_hidden: bool,
}

impl LibraryConfig {
    /// Creates a new builder for configuring `LibraryConfig`.
    pub fn builder() -> LibraryConfigBuilder {
        LibraryConfigBuilder::default()
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            temp_suffix: "__TEMP__".to_string(),
            zip_compression: ZipCompression::Deflated,
            max_concurrent_reads: num_cpus::get().min(8).max(1),
            skip_hidden: true,
        }
    }
}

impl LibraryConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(suffix) = &self.temp_suffix {
            if suffix.is_empty() {
                return Err("Temporary suffix must not be empty".to_string());
            }
            if suffix.contains(ENTRY_SEPARATORS) {
                return Err(format!(
                    "Temporary suffix '{}' must not contain a path separator",
                    suffix
                ));
            }
        }
        if let Some(0) = self.max_concurrent_reads {
            return Err("At least one concurrent read is required".to_string());
        }
        Ok(())
    }
}

/// Entry point tying configuration, persistence and archive access together.
///
/// The store is injected; everything the library persists goes through it.
pub struct Library<S: LibraryStore> {
    config: LibraryConfig,
    store: Arc<S>,
    reconciler: Reconciler<S>,
}

impl<S: LibraryStore> Library<S> {
    pub fn new(config: LibraryConfig, store: Arc<S>) -> Self {
        let reconciler = Reconciler::new(Arc::clone(&store), &config);
        Library {
            config,
            store,
            reconciler,
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Adds a directory to the library as a new synced root.
    pub async fn add_folder(&self, path: impl AsRef<Path>) -> Result<(SyncFolder, MergeReport)> {
        self.reconciler.sync(path.as_ref(), None).await
    }

    /// Re-scans a stored folder and adds whatever appeared since the last sync.
    pub async fn refresh(&self, folder: RecordId) -> Result<MergeReport> {
        let record = self
            .store
            .folder(folder)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Sync folder {}", folder)))?;
        let (_, report) = self.reconciler.sync(&record.path, record.parent_id).await?;
        Ok(report)
    }

    /// Child folders of `parent`, or the synced roots.
    pub async fn folders(&self, parent: Option<RecordId>) -> Result<Vec<SyncFolder>> {
        self.store.child_folders(parent).await
    }

    /// Archives directly inside a folder.
    pub async fn archives(&self, folder: RecordId) -> Result<Vec<ArchiveRecord>> {
        self.store.archives_in(folder).await
    }

    pub async fn set_read(&self, archive: RecordId, was_read: bool) -> Result<()> {
        self.store.set_read(archive, was_read).await
    }

    /// Forgets a folder and everything below it. Nothing is deleted on disk.
    pub async fn remove_folder(&self, folder: RecordId) -> Result<()> {
        self.store.delete_folder(folder).await
    }

    /// Opens a stored archive for reading, restoring its last reading position.
    pub async fn open_reader(&self, archive: RecordId) -> Result<ReadingSession<S>> {
        let record = self
            .store
            .archive(archive)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Archive {}", archive)))?;
        ReadingSession::open(Arc::clone(&self.store), record, &self.config).await
    }

    /// Opens an archive on disk for editing.
    pub async fn open_editor(&self, path: impl AsRef<Path>) -> Result<EditSession> {
        EditSession::open(path.as_ref(), self.config.clone()).await
    }
}
