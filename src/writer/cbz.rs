use crate::error::{Error, Result};
use crate::library::{LibraryConfig, ZipCompression};
use crate::writer::ArchiveWriter;
use async_trait::async_trait;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A writer producing zip containers (`.zip`, `.cbz`).
///
/// Entries are written in the order they are added; folders become directory entries so that
/// empty folders survive a save.
pub struct CbzWriter {
    zip: Option<ZipWriter<File>>,
    options: SimpleFileOptions,
    target: PathBuf,
}

impl CbzWriter {
    fn zip(&mut self) -> Result<&mut ZipWriter<File>> {
        self.zip
            .as_mut()
            .ok_or_else(|| Error::InvalidOperation("Zip writer already finished".to_string()))
    }
}

#[async_trait]
impl ArchiveWriter for CbzWriter {
    fn new(target: &Path, config: &LibraryConfig) -> Result<Self> {
        let method = match config.zip_compression {
            ZipCompression::Stored => CompressionMethod::Stored,
            ZipCompression::Deflated => CompressionMethod::Deflated,
        };
        let options: SimpleFileOptions = SimpleFileOptions::default()
            .compression_method(method)
            .unix_permissions(0o644);

        let file = File::create(target)?;
        log::debug!("Creating zip archive {:?}", target);

        Ok(CbzWriter {
            zip: Some(ZipWriter::new(file)),
            options,
            target: target.to_path_buf(),
        })
    }

    async fn add_folder(&mut self, path: &str) -> Result<&mut Self> {
        let options = self.options;
        let marker = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };
        self.zip()?.add_directory(marker, options)?;
        Ok(self)
    }

    async fn add_file(&mut self, path: &str, bytes: Vec<u8>) -> Result<&mut Self> {
        let options = self.options;
        let zip = self.zip()?;
        zip.start_file(path, options)?;
        zip.write_all(&bytes)?;
        Ok(self)
    }

    async fn finish(mut self) -> Result<()> {
        let zip = self.zip.take().ok_or_else(|| {
            Error::InvalidOperation("Zip writer already finished".to_string())
        })?;

        // Write the central directory and flush the file before anyone renames it
        spawn_blocking(move || -> Result<()> {
            let file = zip.finish()?;
            file.sync_all()?;
            Ok(())
        })
        .await??;

        log::debug!("Finished zip archive {:?}", self.target);
        Ok(())
    }
}
