//! Reader module provides the uniform read-only view over both archive representations.
//!
//! A volume is either a zip-family container (`.zip`, `.cbz`) or a plain directory of images.
//! Both are exposed through the [`ArchiveReader`] trait as an ordered list of page images, a
//! nested file tree, and byte access by entry key. [`Archive`] is the sum of the two concrete
//! readers and is what [`Archive::open`] hands out.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::{ArchiveFolder, ArchiveKind};

pub mod cbz;
pub mod folder;

pub use cbz::ZipReader;
pub use folder::FolderReader;

/// Common interface for all archive readers.
///
/// Readers are opened read-only and their image list never changes after construction, so
/// byte reads may run concurrently with each other.
#[async_trait]
pub trait ArchiveReader: Send + Sync {
    /// Path the reader was opened from.
    fn path(&self) -> &Path;

    /// Physical representation behind this reader.
    fn kind(&self) -> ArchiveKind;

    /// Entry keys of every page image, in natural order.
    fn images(&self) -> &[String];

    /// Returns true if `entry` is a file entry of this archive.
    fn contains(&self, entry: &str) -> bool;

    /// Reads the whole content of an entry.
    ///
    /// # Parameters
    /// * `entry` - Entry key, as found in [`images`](ArchiveReader::images) or an
    ///   [`ArchiveFolder`] file's `path`
    /// * `cancel` - Token that aborts the read promptly
    ///
    /// # Returns
    /// * `Ok(None)` - `entry` is not a member of this archive
    /// * `Ok(Some(bytes))` - The full entry content
    /// * `Err(Error)` - I/O failure, or [`Error::Cancelled`]
    async fn read_bytes(&self, entry: &str, cancel: &CancellationToken)
    -> Result<Option<Vec<u8>>>;

    /// Builds the nested file tree of the archive.
    async fn read_folder_tree(&self) -> Result<ArchiveFolder>;
}

/// An opened archive of either representation.
pub enum Archive {
    Zip(ZipReader),
    Folder(FolderReader),
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("kind", &self.kind())
            .field("path", &self.path())
            .field("images", &self.images().len())
            .finish()
    }
}

impl Archive {
    /// Opens `path`, choosing the reader by extension only.
    ///
    /// Hidden files inside folder archives are skipped.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, true).await
    }

    /// Opens `path`, choosing the reader by extension only.
    ///
    /// # Returns
    /// * `Err(Error::NotFound)` - Nothing exists at `path`
    /// * `Err(Error::UnsupportedFormat)` - `path` is neither a zip-family file nor a directory
    pub async fn open_with(path: impl AsRef<Path>, skip_hidden: bool) -> Result<Self> {
        let path = path.as_ref();
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("Archive '{}'", path.display())));
            }
            Err(e) => return Err(e.into()),
        };

        match ArchiveKind::classify(path) {
            ArchiveKind::Zip if metadata.is_file() => Ok(Archive::Zip(ZipReader::open(path).await?)),
            ArchiveKind::Folder if metadata.is_dir() => Ok(Archive::Folder(
                FolderReader::open(path, skip_hidden).await?,
            )),
            _ => Err(Error::UnsupportedFormat(format!(
                "'{}' is neither a zip archive nor a folder",
                path.display()
            ))),
        }
    }

    /// Releases the underlying handles. Dropping the archive has the same effect.
    pub fn close(self) {
        log::debug!("Closing archive {:?}", self.path());
    }

    fn inner(&self) -> &dyn ArchiveReader {
        match self {
            Archive::Zip(reader) => reader,
            Archive::Folder(reader) => reader,
        }
    }
}

#[async_trait]
impl ArchiveReader for Archive {
    fn path(&self) -> &Path {
        self.inner().path()
    }

    fn kind(&self) -> ArchiveKind {
        self.inner().kind()
    }

    fn images(&self) -> &[String] {
        self.inner().images()
    }

    fn contains(&self, entry: &str) -> bool {
        self.inner().contains(entry)
    }

    async fn read_bytes(
        &self,
        entry: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        self.inner().read_bytes(entry, cancel).await
    }

    async fn read_folder_tree(&self) -> Result<ArchiveFolder> {
        self.inner().read_folder_tree().await
    }
}
