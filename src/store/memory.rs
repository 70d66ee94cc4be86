use crate::error::{Error, Result};
use crate::store::{
    ArchiveRecord, LibraryStore, NewArchive, NewSyncFolder, OpenTab, RecordId, SyncFolder,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    next_id: RecordId,
    folders: BTreeMap<RecordId, SyncFolder>,
    archives: BTreeMap<RecordId, ArchiveRecord>,
    tabs: HashMap<RecordId, OpenTab>,
}

impl State {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }
}

/// An in-process [`LibraryStore`]. Nothing survives the store being dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn find_folder_by_path(&self, path: &Path) -> Result<Option<SyncFolder>> {
        let state = self.state.lock().await;
        Ok(state.folders.values().find(|f| f.path == path).cloned())
    }

    async fn folder(&self, id: RecordId) -> Result<Option<SyncFolder>> {
        Ok(self.state.lock().await.folders.get(&id).cloned())
    }

    async fn insert_folder(&self, folder: NewSyncFolder) -> Result<SyncFolder> {
        let mut state = self.state.lock().await;
        if state.folders.values().any(|f| f.path == folder.path) {
            return Err(Error::InvalidOperation(format!(
                "Folder '{}' is already stored",
                folder.path.display()
            )));
        }
        if let Some(parent) = folder.parent_id {
            if !state.folders.contains_key(&parent) {
                return Err(Error::NotFound(format!("Sync folder {}", parent)));
            }
        }

        let now = Utc::now();
        let record = SyncFolder {
            id: state.allocate_id(),
            parent_id: folder.parent_id,
            name: folder.name,
            path: folder.path,
            created_at: now,
            last_sync_at: now,
        };
        state.folders.insert(record.id, record.clone());
        Ok(record)
    }

    async fn touch_folder(&self, id: RecordId, synced_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().await;
        let folder = state
            .folders
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Sync folder {}", id)))?;
        folder.last_sync_at = synced_at;
        Ok(())
    }

    async fn child_folders(&self, parent: Option<RecordId>) -> Result<Vec<SyncFolder>> {
        let state = self.state.lock().await;
        Ok(state
            .folders
            .values()
            .filter(|f| f.parent_id == parent)
            .cloned()
            .collect())
    }

    async fn delete_folder(&self, id: RecordId) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.folders.contains_key(&id) {
            return Err(Error::NotFound(format!("Sync folder {}", id)));
        }

        let mut doomed = vec![id];
        let mut index = 0;
        while index < doomed.len() {
            let current = doomed[index];
            doomed.extend(
                state
                    .folders
                    .values()
                    .filter(|f| f.parent_id == Some(current))
                    .map(|f| f.id),
            );
            index += 1;
        }

        let archives: Vec<RecordId> = state
            .archives
            .values()
            .filter(|a| doomed.contains(&a.sync_folder_id))
            .map(|a| a.id)
            .collect();
        for archive in archives {
            state.archives.remove(&archive);
            state.tabs.remove(&archive);
        }
        for folder in doomed {
            state.folders.remove(&folder);
        }
        Ok(())
    }

    async fn archive_exists(&self, path: &Path) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.archives.values().any(|a| a.path == path))
    }

    async fn archive(&self, id: RecordId) -> Result<Option<ArchiveRecord>> {
        Ok(self.state.lock().await.archives.get(&id).cloned())
    }

    async fn insert_archive(&self, archive: NewArchive) -> Result<ArchiveRecord> {
        let mut state = self.state.lock().await;
        if !state.folders.contains_key(&archive.sync_folder_id) {
            return Err(Error::NotFound(format!(
                "Sync folder {}",
                archive.sync_folder_id
            )));
        }
        if state.archives.values().any(|a| a.path == archive.path) {
            return Err(Error::InvalidOperation(format!(
                "Archive '{}' is already stored",
                archive.path.display()
            )));
        }

        let record = ArchiveRecord {
            id: state.allocate_id(),
            sync_folder_id: archive.sync_folder_id,
            name: archive.name,
            path: archive.path,
            created_at: Utc::now(),
            last_opened_at: None,
            was_read: false,
        };
        state.archives.insert(record.id, record.clone());
        Ok(record)
    }

    async fn archives_in(&self, folder: RecordId) -> Result<Vec<ArchiveRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .archives
            .values()
            .filter(|a| a.sync_folder_id == folder)
            .cloned()
            .collect())
    }

    async fn set_read(&self, id: RecordId, was_read: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let archive = state
            .archives
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Archive {}", id)))?;
        archive.was_read = was_read;
        Ok(())
    }

    async fn mark_opened(&self, id: RecordId, opened_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().await;
        let archive = state
            .archives
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Archive {}", id)))?;
        archive.last_opened_at = Some(opened_at);
        Ok(())
    }

    async fn save_tab(&self, tab: OpenTab) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.archives.contains_key(&tab.archive_id) {
            return Err(Error::NotFound(format!("Archive {}", tab.archive_id)));
        }
        state.tabs.insert(tab.archive_id, tab);
        Ok(())
    }

    async fn find_tab(&self, archive_id: RecordId) -> Result<Option<OpenTab>> {
        Ok(self.state.lock().await.tabs.get(&archive_id).cloned())
    }

    async fn close_tab(&self, archive_id: RecordId) -> Result<()> {
        self.state.lock().await.tabs.remove(&archive_id);
        Ok(())
    }

    async fn folder_count(&self) -> Result<usize> {
        Ok(self.state.lock().await.folders.len())
    }

    async fn archive_count(&self) -> Result<usize> {
        Ok(self.state.lock().await.archives.len())
    }
}
