//! Writer module serializes an edited page model back into an archive.
//!
//! Saving is split in two steps. [`stage`] builds the complete replacement next to the original
//! (at a temporary sibling path) from the editor state and the original reader's bytes.
//! [`commit`] then removes the original and renames the staged artifact into place. The original
//! is never touched before staging has fully succeeded, and a cancelled staging removes its
//! artifact before returning.
//!
//! [`ArchiveWriter`] is implemented once per archive representation:
//! [`cbz::CbzWriter`] for zip containers and [`folder::DirectoryWriter`] for plain directories.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lazy_static::lazy_static;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;

use crate::editor::{Element, FolderId, PageEditor};
use crate::error::{Error, Result};
use crate::imaging;
use crate::library::LibraryConfig;
use crate::path_utils::temp_sibling;
use crate::reader::{Archive, ArchiveReader};
use crate::types::ArchiveKind;

pub mod cbz;
pub mod folder;

pub use cbz::CbzWriter;
pub use folder::DirectoryWriter;

/// Common interface for all archive writers.
///
/// A writer receives folders and files in depth-first order, parents before children, with
/// `/`-joined paths relative to the archive root.
#[async_trait]
pub trait ArchiveWriter: Send {
    /// Creates a writer producing a new archive at `target`.
    ///
    /// # Parameters
    /// * `target` - Path of the artifact to create; must not exist yet
    /// * `config` - Library configuration (compression settings)
    fn new(target: &Path, config: &LibraryConfig) -> Result<Self>
    where
        Self: Sized;

    /// Adds a folder, which may stay empty.
    async fn add_folder(&mut self, path: &str) -> Result<&mut Self>
    where
        Self: Sized;

    /// Adds a file with its complete content.
    async fn add_file(&mut self, path: &str, bytes: Vec<u8>) -> Result<&mut Self>
    where
        Self: Sized;

    /// Flushes and closes the artifact.
    async fn finish(self) -> Result<()>;
}

lazy_static! {
    /// Archive paths with a save currently running in this process.
    static ref SAVES_IN_FLIGHT: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());
}

/// Exclusive claim on saving one archive path, released on drop.
#[derive(Debug)]
pub struct SaveGuard {
    path: PathBuf,
}

impl SaveGuard {
    /// Claims `path` for saving.
    ///
    /// # Returns
    ///
    /// * `Err(Error::SaveInProgress)` - Another save on the same path has not finished yet
    pub fn acquire(path: &Path) -> Result<Self> {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut in_flight = SAVES_IN_FLIGHT
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(path.clone()) {
            return Err(Error::SaveInProgress(path));
        }
        Ok(SaveGuard { path })
    }
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        let mut in_flight = SAVES_IN_FLIGHT
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.path);
    }
}

/// One unit of output, in archive order.
#[derive(Debug, Clone)]
enum Step {
    Folder(String),
    Copy {
        target: String,
        entry: String,
    },
    Join {
        target: String,
        left: String,
        left_name: String,
        right: String,
        right_name: String,
    },
}

enum Output {
    Folder(String),
    File(String, Vec<u8>),
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Flattens the editor into output steps. Deleted elements are left out.
///
/// Fails with `Error::InvalidOperation` when two outputs would land on the same path.
fn plan(
    editor: &PageEditor,
    folder: FolderId,
    prefix: &str,
    targets: &mut HashSet<String>,
    steps: &mut Vec<Step>,
) -> Result<()> {
    for element in editor.elements(folder) {
        let step = match element {
            Element::Folder(child) => {
                let Some(group) = editor.folder(*child) else {
                    continue;
                };
                let path = join_path(prefix, &group.name);
                claim_target(targets, &path)?;
                steps.push(Step::Folder(path.clone()));
                plan(editor, *child, &path, targets, steps)?;
                continue;
            }
            Element::Single(page) if !page.deleted => Step::Copy {
                target: join_path(prefix, &page.name),
                entry: page.path.clone(),
            },
            Element::Joined(joined) if !joined.deleted => Step::Join {
                target: join_path(prefix, &joined.name),
                left: joined.left.path.clone(),
                left_name: joined.left.name.clone(),
                right: joined.right.path.clone(),
                right_name: joined.right.name.clone(),
            },
            _ => continue,
        };
        if let Step::Copy { target, .. } | Step::Join { target, .. } = &step {
            claim_target(targets, target)?;
        }
        steps.push(step);
    }
    Ok(())
}

fn claim_target(targets: &mut HashSet<String>, path: &str) -> Result<()> {
    if !targets.insert(path.to_string()) {
        return Err(Error::InvalidOperation(format!(
            "More than one entry would be saved as '{}'",
            path
        )));
    }
    Ok(())
}

async fn read_entry(
    reader: &dyn ArchiveReader,
    entry: &str,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    reader
        .read_bytes(entry, cancel)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Entry '{}' in '{}'", entry, reader.path().display())))
}

async fn produce(step: Step, reader: &dyn ArchiveReader, cancel: &CancellationToken) -> Result<Output> {
    match step {
        Step::Folder(path) => Ok(Output::Folder(path)),
        Step::Copy { target, entry } => {
            let bytes = read_entry(reader, &entry, cancel).await?;
            Ok(Output::File(target, bytes))
        }
        Step::Join {
            target,
            left,
            left_name,
            right,
            right_name,
        } => {
            let left_bytes = read_entry(reader, &left, cancel).await?;
            let right_bytes = read_entry(reader, &right, cancel).await?;
            let hint = target.clone();
            let bytes = spawn_blocking(move || {
                imaging::join_pages(&left_bytes, &left_name, &right_bytes, &right_name, &hint)
            })
            .await??;
            Ok(Output::File(target, bytes))
        }
    }
}

/// Writes every step into `writer`, reading ahead at most `limit` entries.
async fn write_steps<W: ArchiveWriter>(
    mut writer: W,
    steps: Vec<Step>,
    reader: &dyn ArchiveReader,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<usize> {
    let mut written = 0;
    let mut outputs = stream::iter(steps)
        .map(|step| produce(step, reader, cancel))
        .buffered(limit.max(1));

    while let Some(output) = outputs.next().await {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match output? {
            Output::Folder(path) => {
                writer.add_folder(&path).await?;
            }
            Output::File(path, bytes) => {
                log::debug!("Writing entry '{}' ({} bytes)", path, bytes.len());
                writer.add_file(&path, bytes).await?;
                written += 1;
            }
        }
    }
    writer.finish().await?;
    Ok(written)
}

async fn remove_artifact(path: &Path) -> Result<()> {
    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path).await?,
        Ok(_) => fs::remove_file(path).await?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Builds the replacement for `reader`'s archive at its temporary sibling path.
///
/// # Parameters
/// * `editor` - Edited page model of the archive
/// * `reader` - Reader over the original archive, used for page bytes
/// * `config` - Supplies the temporary suffix, compression and read-ahead limit
/// * `cancel` - Aborts staging; the partial artifact is removed before returning
///
/// # Returns
/// * `Ok(PathBuf)` - Path of the complete staged artifact
/// * `Err(Error::Cancelled)` - Staging was cancelled and nothing is left on disk
/// * `Err(Error::InvalidOperation)` - Two entries share a target path; nothing was written
/// * `Err(Error::Incomplete)` - Staging failed and left the artifact behind for inspection
pub async fn stage(
    editor: &PageEditor,
    reader: &dyn ArchiveReader,
    config: &LibraryConfig,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let mut steps = Vec::new();
    plan(editor, editor.root(), "", &mut HashSet::new(), &mut steps)?;

    let kind = reader.kind();
    let staged = temp_sibling(reader.path(), &config.temp_suffix, kind == ArchiveKind::Zip)?;

    if fs::try_exists(&staged).await? {
        log::warn!("Removing leftover temporary artifact {:?}", staged);
        remove_artifact(&staged).await?;
    }

    let result = match kind {
        ArchiveKind::Zip => match CbzWriter::new(&staged, config) {
            Ok(writer) => {
                write_steps(writer, steps, reader, config.max_concurrent_reads, cancel).await
            }
            Err(e) => Err(e),
        },
        ArchiveKind::Folder => match DirectoryWriter::new(&staged, config) {
            Ok(writer) => {
                write_steps(writer, steps, reader, config.max_concurrent_reads, cancel).await
            }
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(written) => {
            log::debug!("Staged {} entries into {:?}", written, staged);
            Ok(staged)
        }
        Err(Error::Cancelled) => {
            remove_artifact(&staged)
                .await
                .map_err(|e| e.with_artifact(&staged))?;
            log::info!("Save of {:?} cancelled", reader.path());
            Err(Error::Cancelled)
        }
        Err(e) => {
            log::warn!("Staging {:?} failed: {}", staged, e);
            Err(e.with_artifact(&staged))
        }
    }
}

/// Replaces `original` with the staged artifact.
///
/// The original is deleted first and the artifact renamed into its place. Any reader over
/// `original` must be closed before calling this.
pub async fn commit(original: &Path, staged: &Path) -> Result<()> {
    remove_artifact(original)
        .await
        .map_err(|e| e.with_artifact(staged))?;
    fs::rename(staged, original)
        .await
        .map_err(|e| Error::from(e).with_artifact(staged))?;
    log::info!("Replaced {:?}", original);
    Ok(())
}

/// Saves `editor` over the archive `reader` was opened from.
///
/// Concurrent saves of the same path are rejected with [`Error::SaveInProgress`]. The reader
/// is closed before the original is replaced.
pub async fn save(
    editor: &PageEditor,
    reader: Archive,
    config: &LibraryConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let original = reader.path().to_path_buf();
    let _guard = SaveGuard::acquire(&original)?;

    let staged = stage(editor, &reader, config, cancel).await?;
    reader.close();
    commit(&original, &staged).await
}
