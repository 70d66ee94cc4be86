//! Reading and editing sessions over one archive.
//!
//! A [`ReadingSession`] pages through an archive and keeps its reading position in the
//! library store. An [`EditSession`] owns the reader and the [`PageEditor`] of one editing
//! session and writes the edits back when saved.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::editor::{Element, PageEditor, PageId};
use crate::error::{Error, Result};
use crate::imaging;
use crate::library::LibraryConfig;
use crate::reader::{Archive, ArchiveReader};
use crate::store::{ArchiveRecord, LibraryStore, OpenTab};
use crate::writer::{self, SaveGuard};

/// Sequential reading of one stored archive.
pub struct ReadingSession<S: LibraryStore> {
    store: Arc<S>,
    record: ArchiveRecord,
    reader: Archive,
    index: usize,
}

impl<S: LibraryStore> ReadingSession<S> {
    /// Opens the archive of `record`.
    ///
    /// The archive is marked as opened. Reading resumes at the page saved in its open tab if
    /// that page still exists, otherwise at the first page.
    pub async fn open(store: Arc<S>, record: ArchiveRecord, config: &LibraryConfig) -> Result<Self> {
        let reader = Archive::open_with(&record.path, config.skip_hidden).await?;
        store.mark_opened(record.id, Utc::now()).await?;

        let index = match store.find_tab(record.id).await? {
            Some(tab) => reader
                .images()
                .iter()
                .position(|page| *page == tab.current_page)
                .unwrap_or(0),
            None => 0,
        };

        let session = ReadingSession {
            store,
            record,
            reader,
            index,
        };
        session.remember_position().await?;
        log::info!(
            "Reading {:?} from page {} of {}",
            session.record.path,
            session.index,
            session.page_count()
        );
        Ok(session)
    }

    async fn remember_position(&self) -> Result<()> {
        if let Some(page) = self.current() {
            self.store
                .save_tab(OpenTab {
                    archive_id: self.record.id,
                    current_page: page.to_string(),
                })
                .await?;
        }
        Ok(())
    }

    pub fn record(&self) -> &ArchiveRecord {
        &self.record
    }

    pub fn reader(&self) -> &Archive {
        &self.reader
    }

    pub fn page_count(&self) -> usize {
        self.reader.images().len()
    }

    /// Index of the current page.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Entry key of the current page; `None` for an archive without images.
    pub fn current(&self) -> Option<&str> {
        self.reader.images().get(self.index).map(String::as_str)
    }

    /// Bytes of the current page.
    pub async fn page_bytes(&self, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        match self.current() {
            Some(page) => self.reader.read_bytes(page, cancel).await,
            None => Ok(None),
        }
    }

    /// Moves to the next page. Returns false on the last page.
    pub async fn go_next(&mut self) -> Result<bool> {
        if self.index + 1 >= self.page_count() {
            return Ok(false);
        }
        self.index += 1;
        self.remember_position().await?;
        Ok(true)
    }

    /// Moves to the previous page. Returns false on the first page.
    pub async fn go_previous(&mut self) -> Result<bool> {
        if self.index == 0 {
            return Ok(false);
        }
        self.index -= 1;
        self.remember_position().await?;
        Ok(true)
    }

    pub async fn go_to(&mut self, index: usize) -> Result<()> {
        if index >= self.page_count() {
            return Err(Error::InvalidOperation(format!(
                "Page {} is out of range, the archive has {} pages",
                index,
                self.page_count()
            )));
        }
        self.index = index;
        self.remember_position().await
    }

    /// Ends the session: the archive is marked as read and its open tab removed.
    pub async fn finish(self) -> Result<()> {
        self.store.set_read(self.record.id, true).await?;
        self.store.close_tab(self.record.id).await?;
        self.reader.close();
        Ok(())
    }
}

/// Editing of one archive on disk.
///
/// Saving replaces the archive on disk; the session then continues on the saved content with a
/// freshly built editor.
pub struct EditSession {
    path: PathBuf,
    config: LibraryConfig,
    reader: Option<Archive>,
    editor: PageEditor,
}

impl EditSession {
    pub async fn open(path: &Path, config: LibraryConfig) -> Result<Self> {
        let reader = Archive::open_with(path, config.skip_hidden).await?;
        let editor = PageEditor::from_tree(&reader.read_folder_tree().await?);
        Ok(EditSession {
            path: path.to_path_buf(),
            config,
            reader: Some(reader),
            editor,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn editor(&self) -> &PageEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut PageEditor {
        &mut self.editor
    }

    /// Reader over the archive as it currently is on disk.
    pub fn reader(&self) -> Result<&Archive> {
        self.reader.as_ref().ok_or_else(|| {
            Error::InvalidOperation(format!("'{}' is not open", self.path.display()))
        })
    }

    /// Bytes of a page as it would be saved. Spreads are composed on the fly.
    pub async fn preview(&self, id: PageId, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let reader = self.reader()?;
        let missing = |entry: &str| Error::NotFound(format!("Entry '{}'", entry));

        match self.editor.page(id) {
            Some(Element::Single(page)) => reader
                .read_bytes(&page.path, cancel)
                .await?
                .ok_or_else(|| missing(&page.path)),
            Some(Element::Joined(joined)) => {
                let left = reader
                    .read_bytes(&joined.left.path, cancel)
                    .await?
                    .ok_or_else(|| missing(&joined.left.path))?;
                let right = reader
                    .read_bytes(&joined.right.path, cancel)
                    .await?
                    .ok_or_else(|| missing(&joined.right.path))?;
                let (left_name, right_name, hint) = (
                    joined.left.name.clone(),
                    joined.right.name.clone(),
                    joined.name.clone(),
                );
                tokio::task::spawn_blocking(move || {
                    imaging::join_pages(&left, &left_name, &right, &right_name, &hint)
                })
                .await?
            }
            _ => Err(Error::NotFound(id.to_string())),
        }
    }

    /// Writes the edits back to disk.
    ///
    /// The replacement is staged first; the reader is released only once staging succeeded,
    /// then the original is replaced and reopened.
    ///
    /// # Returns
    ///
    /// * `Err(Error::SaveInProgress)` - Another session is saving the same archive
    /// * `Err(Error::Cancelled)` - Cancelled while staging; nothing changed on disk
    /// * `Err(Error::Incomplete)` - Failed with a temporary artifact left behind
    pub async fn save(&mut self, cancel: &CancellationToken) -> Result<()> {
        let _guard = SaveGuard::acquire(&self.path)?;

        let staged = writer::stage(&self.editor, self.reader()?, &self.config, cancel).await?;
        if let Some(reader) = self.reader.take() {
            reader.close();
        }

        let committed = writer::commit(&self.path, &staged).await;
        let reopened = self.reopen().await;
        committed?;
        reopened
    }

    async fn reopen(&mut self) -> Result<()> {
        let reader = Archive::open_with(&self.path, self.config.skip_hidden).await?;
        self.editor = PageEditor::from_tree(&reader.read_folder_tree().await?);
        self.reader = Some(reader);
        Ok(())
    }

    /// Ends the session, discarding unsaved edits.
    pub fn close(self) {
        if let Some(reader) = self.reader {
            reader.close();
        }
    }
}
