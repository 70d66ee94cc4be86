use crate::error::{Error, Result};
use crate::natural::sort_names;
use crate::path_utils::{entry_key, get_file_name_lossy, is_hidden_file, resolve_entry};
use crate::reader::ArchiveReader;
use crate::tree::TreeBuilder;
use crate::types::{ArchiveFolder, ArchiveKind, is_image_name};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// A reader for volumes stored as a plain directory of images.
///
/// The directory is walked once when opened; entry keys are `/`-joined paths relative to the
/// directory. Only images placed directly in the directory count as pages, nested files are
/// still part of the tree.
pub struct FolderReader {
    path: PathBuf,
    folders: Vec<String>,
    files: HashSet<String>,
    images: Vec<String>,
}

/// Snapshot of a directory walk: (folder keys, file keys).
fn walk(root: &Path, skip_hidden: bool) -> Result<(Vec<String>, Vec<String>)> {
    let mut folders = Vec::new();
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !(skip_hidden && e.depth() > 0 && is_hidden_file(e.path())));

    for entry in walker {
        let entry = entry?;
        let Some(key) = entry_key(root, entry.path()) else {
            continue;
        };
        if entry.file_type().is_dir() {
            folders.push(key);
        } else if entry.file_type().is_file() {
            files.push(key);
        }
    }
    Ok((folders, files))
}

impl FolderReader {
    /// Walks and indexes a directory.
    pub async fn open(path: &Path, skip_hidden: bool) -> Result<Self> {
        let root = path.to_path_buf();
        let (folders, files) = spawn_blocking(move || walk(&root, skip_hidden)).await??;

        let mut images: Vec<String> = files
            .iter()
            .filter(|key| !key.contains('/') && is_image_name(key))
            .cloned()
            .collect();
        sort_names(&mut images);

        log::debug!(
            "Opened folder archive {:?}: {} files, {} images",
            path,
            files.len(),
            images.len()
        );

        Ok(FolderReader {
            path: path.to_path_buf(),
            folders,
            files: files.into_iter().collect(),
            images,
        })
    }
}

#[async_trait]
impl ArchiveReader for FolderReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Folder
    }

    fn images(&self) -> &[String] {
        &self.images
    }

    fn contains(&self, entry: &str) -> bool {
        self.files.contains(entry)
    }

    async fn read_bytes(
        &self,
        entry: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        if !self.contains(entry) {
            return Ok(None);
        }
        let file_path = resolve_entry(&self.path, entry)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            read = tokio::fs::read(&file_path) => Ok(Some(read?)),
        }
    }

    async fn read_folder_tree(&self) -> Result<ArchiveFolder> {
        let mut builder = TreeBuilder::new(get_file_name_lossy(&self.path));
        for folder in &self.folders {
            builder.add_folder(folder);
        }
        for file in &self.files {
            builder.add_file(file, file);
        }
        Ok(builder.build())
    }
}
