use crate::error::{Error, Result};
use crate::natural::sort_names;
use crate::path_utils::{entry_segments, is_folder_marker};
use crate::reader::ArchiveReader;
use crate::tree::TreeBuilder;
use crate::types::{ArchiveFolder, ArchiveKind, is_image_name};
use async_trait::async_trait;
use memmap2::{Mmap, MmapOptions};
use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

/// Upper bound for buffer reservation from an entry's declared size.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Read-only memory map of a container, shared by every clone of the archive index.
#[derive(Clone)]
struct SharedMap(Arc<Mmap>);

impl AsRef<[u8]> for SharedMap {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

/// A reader for zip-family containers (`.zip`, `.cbz`).
///
/// The container is memory-mapped once; each byte read works on its own clone of the parsed
/// central directory, so reads never contend for a shared cursor. The map and file handle are
/// released when the reader is dropped.
pub struct ZipReader {
    path: PathBuf,
    archive: ZipArchive<Cursor<SharedMap>>,
    entry_names: Vec<String>,
    files: HashSet<String>,
    images: Vec<String>,
}

impl ZipReader {
    /// Opens and indexes a zip container.
    pub async fn open(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        let file = tokio::fs::File::open(&path).await?;
        let file_std = file.into_std().await;

        // Create the read-only memory map and parse the central directory off the runtime
        let archive = spawn_blocking(move || -> Result<ZipArchive<Cursor<SharedMap>>> {
            let mmap = unsafe { MmapOptions::new().map(&file_std) }?;
            Ok(ZipArchive::new(Cursor::new(SharedMap(Arc::new(mmap))))?)
        })
        .await??;

        Ok(Self::index(path, archive))
    }

    fn index(path: PathBuf, archive: ZipArchive<Cursor<SharedMap>>) -> Self {
        let entry_names: Vec<String> = archive.file_names().map(|n| n.to_string()).collect();

        let files: HashSet<String> = entry_names
            .iter()
            .filter(|name| !is_folder_marker(name))
            .cloned()
            .collect();

        let mut images: Vec<String> = files
            .iter()
            .filter(|name| {
                entry_segments(name)
                    .last()
                    .map(|leaf| is_image_name(leaf))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        sort_names(&mut images);

        log::debug!(
            "Opened zip archive {:?}: {} entries, {} images",
            path,
            entry_names.len(),
            images.len()
        );

        ZipReader {
            path,
            archive,
            entry_names,
            files,
            images,
        }
    }
}

#[async_trait]
impl ArchiveReader for ZipReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Zip
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
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut archive = self.archive.clone();
        let name = entry.to_string();
        // zip decompression is blocking, and the clone keeps the shared index untouched
        let task = spawn_blocking(move || -> Result<Vec<u8>> {
            let mut file = archive.by_name(&name)?;
            let expected = file.size();
            // The declared size is untrusted; the length check below catches lies
            let mut bytes = Vec::with_capacity(expected.min(MAX_PREALLOCATION) as usize);
            file.read_to_end(&mut bytes)?;
            if bytes.len() as u64 != expected {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("entry '{}' is truncated", name),
                )));
            }
            Ok(bytes)
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            joined = task => Ok(Some(joined??)),
        }
    }

    async fn read_folder_tree(&self) -> Result<ArchiveFolder> {
        let mut builder = TreeBuilder::new("");
        for name in &self.entry_names {
            builder.add_container_entry(name);
        }
        Ok(builder.build())
    }
}
