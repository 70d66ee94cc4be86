use crate::error::Result;
use crate::library::LibraryConfig;
use crate::path_utils::resolve_entry;
use crate::writer::ArchiveWriter;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A writer producing a plain directory tree.
///
/// Files are written with their full content; the original directory is only read, never
/// moved from, so it stays intact until the save commits.
pub struct DirectoryWriter {
    root: PathBuf,
}

#[async_trait]
impl ArchiveWriter for DirectoryWriter {
    fn new(target: &Path, _config: &LibraryConfig) -> Result<Self> {
        std::fs::create_dir_all(target)?;
        log::debug!("Creating folder archive {:?}", target);
        Ok(DirectoryWriter {
            root: target.to_path_buf(),
        })
    }

    async fn add_folder(&mut self, path: &str) -> Result<&mut Self> {
        fs::create_dir_all(resolve_entry(&self.root, path)?).await?;
        Ok(self)
    }

    async fn add_file(&mut self, path: &str, bytes: Vec<u8>) -> Result<&mut Self> {
        let target = resolve_entry(&self.root, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        // create_new refuses to overwrite a page saved earlier in the same pass
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(self)
    }

    async fn finish(self) -> Result<()> {
        log::debug!("Finished folder archive {:?}", self.root);
        Ok(())
    }
}
