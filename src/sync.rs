//! Folder synchronization: discovering volumes on disk and merging them into the store.
//!
//! [`scan`] walks a directory and describes which entries are volumes:
//!
//! - every file with an archive extension (`.zip`, `.cbz`)
//! - every sub-directory that directly contains at least one image
//!
//! Image directories are still descended into, so volumes nested below them are found too.
//! Folders with no volume anywhere below them are pruned from the result.
//!
//! [`Reconciler`] merges a scan into a [`LibraryStore`]. Existing folders and archives are
//! matched by path and never duplicated or overwritten, so running a sync twice over an
//! unchanged directory adds nothing.

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, try_join_all};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{ReadDir, read_dir};

use crate::error::{Error, Result};
use crate::library::LibraryConfig;
use crate::natural::compare_stems;
use crate::path_utils::{get_file_name_lossy, get_file_stem_lossy, is_hidden_file};
use crate::store::{LibraryStore, NewArchive, NewSyncFolder, RecordId, SyncFolder};
use crate::types::{is_archive_path, is_image_name};

/// A volume found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ArchiveDescriptor {
    pub path: PathBuf,
    /// File name without extension, or the directory name of an image folder.
    pub name: String,
}

/// A folder found by a scan, with the volumes it directly holds and its surviving children.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FolderDescriptor {
    pub path: PathBuf,
    pub name: String,
    pub archives: Vec<ArchiveDescriptor>,
    pub children: Vec<FolderDescriptor>,
}

impl FolderDescriptor {
    /// True if no volume exists anywhere below this folder.
    pub fn is_empty(&self) -> bool {
        self.archives.is_empty() && self.children.is_empty()
    }

    /// Number of volumes in this folder and all its descendants.
    pub fn archive_count(&self) -> usize {
        self.archives.len()
            + self
                .children
                .iter()
                .map(FolderDescriptor::archive_count)
                .sum::<usize>()
    }
}

/// Files and sub-directories of one directory.
struct Listing {
    dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

async fn list_dir(directory: &Path, skip_hidden: bool) -> Result<Listing> {
    let mut listing = Listing {
        dirs: Vec::new(),
        files: Vec::new(),
    };

    let mut entries: ReadDir = read_dir(directory).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if skip_hidden && is_hidden_file(&path) {
            continue;
        }

        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            listing.dirs.push(path);
        } else if file_type.is_file() {
            listing.files.push(path);
        }
    }
    Ok(listing)
}

/// Scans one directory. The flag tells whether it directly contains images.
fn scan_dir(directory: PathBuf, skip_hidden: bool) -> BoxFuture<'static, Result<(FolderDescriptor, bool)>> {
    async move {
        let listing = list_dir(&directory, skip_hidden).await?;

        let has_images = listing
            .files
            .iter()
            .any(|file| is_image_name(&get_file_name_lossy(file)));

        let mut archives: Vec<ArchiveDescriptor> = listing
            .files
            .iter()
            .filter(|file| is_archive_path(file))
            .map(|file| ArchiveDescriptor {
                path: file.clone(),
                name: get_file_stem_lossy(file),
            })
            .collect();

        let scanned = try_join_all(
            listing
                .dirs
                .into_iter()
                .map(|dir| scan_dir(dir, skip_hidden)),
        )
        .await?;

        let mut children = Vec::new();
        for (child, child_has_images) in scanned {
            if child_has_images {
                archives.push(ArchiveDescriptor {
                    path: child.path.clone(),
                    name: child.name.clone(),
                });
            }
            if child.is_empty() {
                log::debug!("Pruning folder without volumes {:?}", child.path);
            } else {
                children.push(child);
            }
        }

        archives.sort_by(|a, b| compare_stems(&a.name, &b.name));
        children.sort_by(|a, b| compare_stems(&a.name, &b.name));

        let descriptor = FolderDescriptor {
            name: get_file_name_lossy(&directory),
            path: directory,
            archives,
            children,
        };
        Ok((descriptor, has_images))
    }
    .boxed()
}

/// Scans `path` recursively.
///
/// Descriptor paths are canonical (absolute, symlinks resolved), whatever spelling of `path`
/// was passed in.
///
/// # Returns
///
/// * `Ok(FolderDescriptor)` - The root descriptor; [`FolderDescriptor::is_empty`] tells whether
///   anything survived pruning
/// * `Err(Error::NotFound)` - `path` is not a directory
pub async fn scan(path: &Path, skip_hidden: bool) -> Result<FolderDescriptor> {
    // Records are keyed by path, so every spelling of a folder must map to the same one
    let path = &match tokio::fs::canonicalize(path).await {
        Ok(canonical) => canonical,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(format!("Folder '{}'", path.display())));
        }
        Err(e) => return Err(e.into()),
    };
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return Err(Error::InvalidPath(
                path.to_path_buf(),
                "Not a directory".to_string(),
            ));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(format!("Folder '{}'", path.display())));
        }
        Err(e) => return Err(e.into()),
    }

    let (descriptor, _) = scan_dir(path.to_path_buf(), skip_hidden).await?;
    log::debug!(
        "Scanned {:?}: {} volumes",
        path,
        descriptor.archive_count()
    );
    Ok(descriptor)
}

/// Records added by one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MergeReport {
    pub folders_added: usize,
    pub archives_added: usize,
}

impl MergeReport {
    /// True if the merge did not add anything.
    pub fn is_unchanged(&self) -> bool {
        self.folders_added == 0 && self.archives_added == 0
    }
}

/// Merges folder scans into a library store.
pub struct Reconciler<S: LibraryStore> {
    store: Arc<S>,
    skip_hidden: bool,
}

impl<S: LibraryStore> Reconciler<S> {
    pub fn new(store: Arc<S>, config: &LibraryConfig) -> Self {
        Reconciler {
            store,
            skip_hidden: config.skip_hidden,
        }
    }

    /// Scans `path` and merges the result below `parent` (or as a new root).
    pub async fn sync(
        &self,
        path: &Path,
        parent: Option<RecordId>,
    ) -> Result<(SyncFolder, MergeReport)> {
        let descriptor = scan(path, self.skip_hidden).await?;
        let (root, report) = self.merge(&descriptor, parent).await?;
        log::info!(
            "Synced {:?}: {} folders and {} archives added",
            path,
            report.folders_added,
            report.archives_added
        );
        Ok((root, report))
    }

    /// Merges a scan into the store.
    ///
    /// Folders are matched by path: missing ones are inserted under their parent, existing ones
    /// only get `last_sync_at` updated. Archives are inserted only if no record shares their
    /// path. The root folder is always persisted, even when the scan found nothing.
    pub async fn merge(
        &self,
        descriptor: &FolderDescriptor,
        parent: Option<RecordId>,
    ) -> Result<(SyncFolder, MergeReport)> {
        let mut report = MergeReport::default();
        let now = Utc::now();

        let mut root = None;
        let mut pending: Vec<(&FolderDescriptor, Option<RecordId>)> = vec![(descriptor, parent)];

        while let Some((folder, parent_id)) = pending.pop() {
            let record = match self.store.find_folder_by_path(&folder.path).await? {
                Some(mut existing) => {
                    self.store.touch_folder(existing.id, now).await?;
                    existing.last_sync_at = now;
                    existing
                }
                None => {
                    report.folders_added += 1;
                    self.store
                        .insert_folder(NewSyncFolder {
                            parent_id,
                            name: folder.name.clone(),
                            path: folder.path.clone(),
                        })
                        .await?
                }
            };

            for archive in &folder.archives {
                if self.store.archive_exists(&archive.path).await? {
                    continue;
                }
                self.store
                    .insert_archive(NewArchive {
                        sync_folder_id: record.id,
                        name: archive.name.clone(),
                        path: archive.path.clone(),
                    })
                    .await?;
                report.archives_added += 1;
            }

            for child in folder.children.iter().rev() {
                pending.push((child, Some(record.id)));
            }
            if root.is_none() {
                root = Some(record);
            }
        }

        root.map(|root| (root, report))
            .ok_or_else(|| Error::InvalidOperation("Nothing to merge".to_string()))
    }
}
