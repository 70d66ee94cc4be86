//! Mangaman - Comic and Manga Library Core
//!
//! This crate provides an asynchronous API for managing a personal library of comic and manga
//! volumes stored either as zip-family archives (`.zip`, `.cbz`) or as plain directories of
//! images.
//!
//! It covers three areas:
//!
//! - **Reading**: [`Archive`] opens either representation as an ordered list of pages (in
//!   natural, numeric-aware order) and as a nested file tree.
//! - **Editing**: [`PageEditor`] joins pages into two-page spreads, splits them again, deletes,
//!   renames and renumbers; [`EditSession`] writes the result back, replacing the original
//!   only once the new archive is complete.
//! - **Library**: [`Reconciler`] scans folders for volumes and merges them into a
//!   [`LibraryStore`] without ever duplicating existing records.
//!
//! # Getting Started
//!
//! ```rust,no_run
//! use mangaman::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> mangaman::error::Result<()> {
//!     let config = LibraryConfig::builder().build()?;
//!     let store = Arc::new(SqliteStore::open("library.db").await?);
//!     let library = Library::new(config, store);
//!
//!     // 1. Discover the volumes below a directory
//!     let (root, report) = library.add_folder("./manga").await?;
//!     println!("Added {} archives", report.archives_added);
//!
//!     // 2. Read the first volume
//!     if let Some(archive) = library.archives(root.id).await?.first() {
//!         let mut reading = library.open_reader(archive.id).await?;
//!         while reading.go_next().await? {}
//!         reading.finish().await?;
//!     }
//!
//!     // 3. Join the first two pages of a volume and save it
//!     let mut session = library.open_editor("./manga/Vol 1.cbz").await?;
//!     let pages: Vec<PageId> = session
//!         .editor()
//!         .images()
//!         .iter()
//!         .filter_map(|e| e.page_id())
//!         .collect();
//!     if let [first, second, ..] = pages[..] {
//!         session.editor_mut().join(first, second)?;
//!     }
//!     session.save(&CancellationToken::new()).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod editor;
pub mod error;
pub mod imaging;
pub mod library;
pub mod natural;
pub mod path_utils;
pub mod reader;
pub mod session;
pub mod store;
pub mod sync;
pub mod tree;
pub mod types;
pub mod writer;

// Publicly expose the library entry point and its configuration
pub use library::{Library, LibraryConfig, LibraryConfigBuilder, ZipCompression};

// Re-export the core types for direct access
pub use editor::{Element, FolderGroup, FolderId, JoinedPage, PageEditor, PageEntry, PageId};
pub use reader::{Archive, ArchiveReader, FolderReader, ZipReader};
pub use session::{EditSession, ReadingSession};
pub use store::{
    ArchiveRecord, LibraryStore, MemoryStore, OpenTab, RecordId, SqliteStore, SyncFolder,
};
pub use sync::{ArchiveDescriptor, FolderDescriptor, MergeReport, Reconciler};
pub use types::{ArchiveEntry, ArchiveFolder, ArchiveKind, ImageFormatInfo};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and traits, allowing you to
/// import everything you need with a single `use mangaman::prelude::*;` statement.
pub mod prelude {
    pub use super::{
        Archive, ArchiveEntry, ArchiveFolder, ArchiveKind, ArchiveReader, ArchiveRecord,
        EditSession, Element, FolderDescriptor, FolderId, Library, LibraryConfig,
        LibraryConfigBuilder, LibraryStore, MemoryStore, MergeReport, PageEditor, PageId,
        ReadingSession, Reconciler, SqliteStore, SyncFolder, ZipCompression, error, natural,
        types,
    };
    pub use std::path::{Path, PathBuf};
    pub use tokio_util::sync::CancellationToken;
}
