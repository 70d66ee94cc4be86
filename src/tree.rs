//! Construction of [`ArchiveFolder`] trees from flat entry listings.
//!
//! Zip containers only store flat entry names, and folder archives are walked one path at a
//! time, so both readers feed entry keys into a [`TreeBuilder`]. Folder nodes live in an arena
//! keyed by their full path: two folders that share a leaf name in different places stay
//! distinct, and entries discovered at different times for the same folder land in one node.

use std::collections::{HashMap, HashSet};

use crate::natural::compare_names;
use crate::path_utils::{entry_segments, is_folder_marker};
use crate::types::{ArchiveEntry, ArchiveFolder};

#[derive(Debug)]
struct FolderNode {
    name: String,
    path: String,
    files: Vec<ArchiveEntry>,
    children: Vec<usize>,
}

/// Accumulates entries into a path-keyed folder arena.
#[derive(Debug)]
pub struct TreeBuilder {
    nodes: Vec<FolderNode>,
    folders_by_path: HashMap<String, usize>,
    known_files: HashSet<String>,
}

impl TreeBuilder {
    /// Creates a builder whose root folder carries `root_name`.
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = FolderNode {
            name: root_name.into(),
            path: String::new(),
            files: Vec::new(),
            children: Vec::new(),
        };
        let mut folders_by_path = HashMap::new();
        folders_by_path.insert(String::new(), 0);
        Self {
            nodes: vec![root],
            folders_by_path,
            known_files: HashSet::new(),
        }
    }

    /// Returns the node for the folder made of `segments`, creating missing ancestors on demand.
    fn ensure_folder(&mut self, segments: &[&str]) -> usize {
        let mut current = 0;
        let mut path = String::new();
        for segment in segments {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);

            current = match self.folders_by_path.get(&path) {
                Some(&index) => index,
                None => {
                    let index = self.nodes.len();
                    self.nodes.push(FolderNode {
                        name: segment.to_string(),
                        path: path.clone(),
                        files: Vec::new(),
                        children: Vec::new(),
                    });
                    self.nodes[current].children.push(index);
                    self.folders_by_path.insert(path.clone(), index);
                    index
                }
            };
        }
        current
    }

    /// Registers a folder (and its ancestors) by its `/` or `\` separated key.
    pub fn add_folder(&mut self, key: &str) {
        let segments = entry_segments(key);
        self.ensure_folder(&segments);
    }

    /// Registers a file whose tree position is derived from `key` and whose bytes are looked
    /// up with `lookup_path`. Duplicate lookup paths are ignored.
    pub fn add_file(&mut self, key: &str, lookup_path: &str) {
        let segments = entry_segments(key);
        let Some((name, parents)) = segments.split_last() else {
            return;
        };
        if !self.known_files.insert(lookup_path.to_string()) {
            return;
        }
        let folder = self.ensure_folder(parents);
        self.nodes[folder]
            .files
            .push(ArchiveEntry::new(*name, lookup_path));
    }

    /// Registers a raw container entry name: folder markers become folders, everything else a
    /// file looked up by the full entry name.
    pub fn add_container_entry(&mut self, entry: &str) {
        if is_folder_marker(entry) {
            self.add_folder(entry);
        } else {
            self.add_file(entry, entry);
        }
    }

    /// Assembles the nested tree. Files are ordered naturally by name, subfolders ordinally.
    pub fn build(mut self) -> ArchiveFolder {
        self.assemble(0)
    }

    fn assemble(&mut self, index: usize) -> ArchiveFolder {
        let children = std::mem::take(&mut self.nodes[index].children);
        let mut folders: Vec<ArchiveFolder> =
            children.into_iter().map(|child| self.assemble(child)).collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));

        let node = &mut self.nodes[index];
        let mut files = std::mem::take(&mut node.files);
        files.sort_by(|a, b| compare_names(&a.name, &b.name).then_with(|| a.path.cmp(&b.path)));

        ArchiveFolder {
            name: std::mem::take(&mut node.name),
            path: std::mem::take(&mut node.path),
            files,
            folders,
        }
    }
}
