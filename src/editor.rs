//! Page editing model for one archive.
//!
//! The editor holds the mutable page list of an editing session. Folders are stored in an arena
//! and addressed by [`FolderId`]; each folder owns an ordered list of [`Element`]s, which are
//! single pages, joined two-page spreads, or nested folders. Parent links are plain ids, so
//! walking to the root never involves shared ownership.
//!
//! Edits only touch this in-memory model. The archive itself is rewritten by
//! [`crate::writer`] when the session is saved.

use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::natural::compare_stems;
use crate::path_utils::validate_entry_name;
use crate::types::{ArchiveEntry, ArchiveFolder, is_image_name};

/// Stable identifier of a page element within one editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page #{}", self.0)
    }
}

/// Index of a folder in the editor's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FolderId(usize);

/// A single archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub id: PageId,
    /// Name the file had in the archive.
    pub original_name: String,
    /// Name the file will be saved under.
    pub name: String,
    /// Entry key used to read the original bytes.
    pub path: String,
    /// Whether the original file is an image.
    pub is_image: bool,
    pub deleted: bool,
}

/// Two pages saved as one horizontally composed spread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedPage {
    pub id: PageId,
    pub name: String,
    pub left: PageEntry,
    pub right: PageEntry,
    pub deleted: bool,
}

/// One position in a folder's page sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Single(PageEntry),
    Joined(JoinedPage),
    Folder(FolderId),
}

impl Element {
    /// Id of a page element; `None` for folders.
    pub fn page_id(&self) -> Option<PageId> {
        match self {
            Element::Single(page) => Some(page.id),
            Element::Joined(joined) => Some(joined.id),
            Element::Folder(_) => None,
        }
    }

    /// Current name of a page element; `None` for folders.
    pub fn name(&self) -> Option<&str> {
        match self {
            Element::Single(page) => Some(&page.name),
            Element::Joined(joined) => Some(&joined.name),
            Element::Folder(_) => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            Element::Single(page) => page.deleted,
            Element::Joined(joined) => joined.deleted,
            Element::Folder(_) => false,
        }
    }

    /// Whether the element currently carries an image name.
    fn has_image_name(&self) -> bool {
        self.name().map(is_image_name).unwrap_or(false)
    }
}

/// A folder of the edited archive.
#[derive(Debug, Clone)]
pub struct FolderGroup {
    pub id: FolderId,
    pub original_name: String,
    pub name: String,
    pub parent: Option<FolderId>,
    pub elements: Vec<Element>,
}

/// Minimal zero-padding width for `count` sequential indices starting at zero.
pub fn padding_width(count: usize) -> usize {
    count
        .saturating_sub(1)
        .checked_ilog10()
        .map_or(1, |digits| digits as usize + 1)
}

fn extension_suffix(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Mutable editing state over an archive's page tree.
#[derive(Debug, Clone)]
pub struct PageEditor {
    folders: Vec<FolderGroup>,
    /// Folder that directly lists each top-level page element.
    owners: HashMap<PageId, FolderId>,
    next_id: u64,
}

impl PageEditor {
    /// Builds an editor from a reader's file tree. Subfolders come before files in every folder.
    pub fn from_tree(tree: &ArchiveFolder) -> Self {
        let mut editor = PageEditor {
            folders: Vec::new(),
            owners: HashMap::new(),
            next_id: 0,
        };
        editor.add_folder(tree, None);
        editor
    }

    fn add_folder(&mut self, folder: &ArchiveFolder, parent: Option<FolderId>) -> FolderId {
        let id = FolderId(self.folders.len());
        self.folders.push(FolderGroup {
            id,
            original_name: folder.name.clone(),
            name: folder.name.clone(),
            parent,
            elements: Vec::new(),
        });

        let mut elements = Vec::with_capacity(folder.folders.len() + folder.files.len());
        for child in &folder.folders {
            elements.push(Element::Folder(self.add_folder(child, Some(id))));
        }
        for file in &folder.files {
            let page = self.new_page(file);
            self.owners.insert(page.id, id);
            elements.push(Element::Single(page));
        }
        self.folders[id.0].elements = elements;
        id
    }

    fn new_page(&mut self, file: &ArchiveEntry) -> PageEntry {
        PageEntry {
            id: self.allocate_id(),
            original_name: file.name.clone(),
            name: file.name.clone(),
            path: file.path.clone(),
            is_image: file.is_image,
            deleted: false,
        }
    }

    fn allocate_id(&mut self) -> PageId {
        let id = PageId(self.next_id);
        self.next_id += 1;
        id
    }

    /// The archive root folder.
    pub fn root(&self) -> FolderId {
        FolderId(0)
    }

    pub fn folder(&self, id: FolderId) -> Option<&FolderGroup> {
        self.folders.get(id.0)
    }

    /// Elements of a folder, in their current order.
    pub fn elements(&self, id: FolderId) -> &[Element] {
        self.folders
            .get(id.0)
            .map(|f| f.elements.as_slice())
            .unwrap_or(&[])
    }

    /// Folder that directly contains the page element `id`.
    pub fn folder_of(&self, id: PageId) -> Option<FolderId> {
        self.owners.get(&id).copied()
    }

    /// Looks up a top-level page element by id.
    pub fn page(&self, id: PageId) -> Option<&Element> {
        let (folder, index) = self.locate(id).ok()?;
        self.folders[folder.0].elements.get(index)
    }

    /// Current `/`-joined path of a folder relative to the archive root (`""` for the root).
    pub fn folder_path(&self, id: FolderId) -> String {
        let mut names = Vec::new();
        let mut current = self.folder(id);
        while let Some(folder) = current {
            match folder.parent {
                Some(parent) => {
                    names.push(folder.name.as_str());
                    current = self.folder(parent);
                }
                None => current = None,
            }
        }
        names.reverse();
        names.join("/")
    }

    fn locate(&self, id: PageId) -> Result<(FolderId, usize)> {
        let folder = self
            .folder_of(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let index = self.folders[folder.0]
            .elements
            .iter()
            .position(|e| e.page_id() == Some(id))
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok((folder, index))
    }

    fn active_single(&self, id: PageId) -> Option<(FolderId, usize)> {
        let (folder, index) = self.locate(id).ok()?;
        match &self.folders[folder.0].elements[index] {
            Element::Single(page) if !page.deleted => Some((folder, index)),
            _ => None,
        }
    }

    /// Whether `left` and `right` may be joined: two distinct active single pages of one folder.
    pub fn can_join(&self, left: PageId, right: PageId) -> bool {
        match (self.active_single(left), self.active_single(right)) {
            (Some((a, _)), Some((b, _))) => left != right && a == b,
            _ => false,
        }
    }

    /// Joins two single pages into one spread.
    ///
    /// The spread takes the left page's name and position; both originals leave the sequence.
    ///
    /// # Returns
    ///
    /// * `Ok(PageId)` - Id of the new joined element
    /// * `Err(Error::InvalidOperation)` - The pages are not two active singles of the same folder
    pub fn join(&mut self, left: PageId, right: PageId) -> Result<PageId> {
        if !self.can_join(left, right) {
            return Err(Error::InvalidOperation(format!(
                "{} and {} are not two active single pages of the same folder",
                left, right
            )));
        }
        let (folder, right_index) = self.locate(right)?;
        let Element::Single(right_page) = self.folders[folder.0].elements.remove(right_index)
        else {
            unreachable!("can_join checked both operands are single pages");
        };
        let (_, left_index) = self.locate(left)?;

        let id = self.allocate_id();
        let elements = &mut self.folders[folder.0].elements;
        let Element::Single(left_page) = elements.remove(left_index) else {
            unreachable!("can_join checked both operands are single pages");
        };
        elements.insert(
            left_index,
            Element::Joined(JoinedPage {
                id,
                name: left_page.name.clone(),
                left: left_page,
                right: right_page,
                deleted: false,
            }),
        );

        self.owners.remove(&left);
        self.owners.remove(&right);
        self.owners.insert(id, folder);
        log::debug!("Joined {} and {} into {}", left, right, id);
        Ok(id)
    }

    /// Nearest active single page after `id` in the same folder.
    pub fn next_joinable(&self, id: PageId) -> Option<PageId> {
        let (folder, index) = self.active_single(id)?;
        self.folders[folder.0].elements[index + 1..]
            .iter()
            .find_map(|e| match e {
                Element::Single(page) if !page.deleted => Some(page.id),
                _ => None,
            })
    }

    /// Nearest active single page before `id` in the same folder.
    pub fn previous_joinable(&self, id: PageId) -> Option<PageId> {
        let (folder, index) = self.active_single(id)?;
        self.folders[folder.0].elements[..index]
            .iter()
            .rev()
            .find_map(|e| match e {
                Element::Single(page) if !page.deleted => Some(page.id),
                _ => None,
            })
    }

    /// Joins `id` (left half) with the next active single page.
    pub fn join_with_next(&mut self, id: PageId) -> Result<PageId> {
        let next = self.next_joinable(id).ok_or_else(|| {
            Error::InvalidOperation(format!("{} has no following page to join with", id))
        })?;
        self.join(id, next)
    }

    /// Joins `id` (left half) with the previous active single page.
    pub fn join_with_previous(&mut self, id: PageId) -> Result<PageId> {
        let previous = self.previous_joinable(id).ok_or_else(|| {
            Error::InvalidOperation(format!("{} has no preceding page to join with", id))
        })?;
        self.join(id, previous)
    }

    /// Splits a spread back into its halves, left first, at the spread's position.
    ///
    /// Both halves take the spread's deletion state.
    pub fn split(&mut self, id: PageId) -> Result<(PageId, PageId)> {
        let (folder, index) = self.locate(id)?;
        let elements = &mut self.folders[folder.0].elements;
        if !matches!(elements[index], Element::Joined(_)) {
            return Err(Error::InvalidOperation(format!("{} is not a joined page", id)));
        }
        let Element::Joined(joined) = elements.remove(index) else {
            unreachable!("checked above");
        };

        let JoinedPage {
            mut left,
            mut right,
            deleted,
            ..
        } = joined;
        left.deleted = deleted;
        right.deleted = deleted;
        let ids = (left.id, right.id);

        elements.insert(index, Element::Single(right));
        elements.insert(index, Element::Single(left));

        self.owners.remove(&id);
        self.owners.insert(ids.0, folder);
        self.owners.insert(ids.1, folder);
        log::debug!("Split {} into {} and {}", id, ids.0, ids.1);
        Ok(ids)
    }

    /// Flips the deletion mark of a page; on a spread the mark applies to both halves.
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - The new deletion state
    pub fn toggle_delete(&mut self, id: PageId) -> Result<bool> {
        let (folder, index) = self.locate(id)?;
        match &mut self.folders[folder.0].elements[index] {
            Element::Single(page) => {
                page.deleted = !page.deleted;
                Ok(page.deleted)
            }
            Element::Joined(joined) => {
                joined.deleted = !joined.deleted;
                joined.left.deleted = joined.deleted;
                joined.right.deleted = joined.deleted;
                Ok(joined.deleted)
            }
            Element::Folder(_) => Err(Error::InvalidOperation(format!(
                "{} is a folder and cannot be deleted",
                id
            ))),
        }
    }

    /// Exchanges the halves of a spread.
    pub fn swap_sides(&mut self, id: PageId) -> Result<()> {
        let (folder, index) = self.locate(id)?;
        match &mut self.folders[folder.0].elements[index] {
            Element::Joined(joined) => {
                std::mem::swap(&mut joined.left, &mut joined.right);
                Ok(())
            }
            _ => Err(Error::InvalidOperation(format!("{} is not a joined page", id))),
        }
    }

    fn label<'a>(&'a self, element: &'a Element) -> &'a str {
        match element {
            Element::Folder(child) => &self.folders[child.0].name,
            _ => element.name().unwrap_or(""),
        }
    }

    /// Fails when an active sibling other than `index` in `folder` is already called `name`.
    fn ensure_name_free(&self, folder: FolderId, index: Option<usize>, name: &str) -> Result<()> {
        let taken = self.folders[folder.0]
            .elements
            .iter()
            .enumerate()
            .any(|(i, e)| Some(i) != index && !e.is_deleted() && self.label(e) == name);
        if taken {
            return Err(Error::InvalidOperation(format!(
                "'{}' already exists in folder '{}'",
                name, self.folders[folder.0].name
            )));
        }
        Ok(())
    }

    /// Renames a page or spread.
    ///
    /// # Returns
    ///
    /// * `Err(Error::InvalidOperation)` - An active sibling already uses `name`
    pub fn rename(&mut self, id: PageId, name: &str) -> Result<()> {
        validate_entry_name(name)?;
        let (folder, index) = self.locate(id)?;
        self.ensure_name_free(folder, Some(index), name)?;
        match &mut self.folders[folder.0].elements[index] {
            Element::Single(page) => page.name = name.to_string(),
            Element::Joined(joined) => joined.name = name.to_string(),
            Element::Folder(_) => unreachable!("page ids never address folders"),
        }
        Ok(())
    }

    /// Renames a folder. The root folder has no name in the saved archive.
    pub fn rename_folder(&mut self, id: FolderId, name: &str) -> Result<()> {
        validate_entry_name(name)?;
        let parent = self
            .folder(id)
            .ok_or_else(|| Error::NotFound(format!("folder #{}", id.0)))?
            .parent
            .ok_or_else(|| {
                Error::InvalidOperation("The archive root cannot be renamed".to_string())
            })?;
        let index = self.folders[parent.0]
            .elements
            .iter()
            .position(|e| matches!(e, Element::Folder(child) if *child == id));
        self.ensure_name_free(parent, index, name)?;
        self.folders[id.0].name = name.to_string();
        Ok(())
    }

    fn compare_elements(folders: &[FolderGroup], a: &Element, b: &Element) -> Ordering {
        match (a, b) {
            (Element::Folder(x), Element::Folder(y)) => {
                folders[x.0].name.cmp(&folders[y.0].name)
            }
            (Element::Folder(_), _) => Ordering::Less,
            (_, Element::Folder(_)) => Ordering::Greater,
            _ => compare_stems(a.name().unwrap_or(""), b.name().unwrap_or("")),
        }
    }

    /// Orders a folder's elements and renames its images to sequential, zero-padded numbers.
    ///
    /// Folders come first (ordinal by name), pages follow in natural order of their stems.
    /// Image elements are renamed `0`, `1`, ... padded to the width needed by the image count,
    /// keeping their extension; other files and subfolders keep their names.
    pub fn rename_and_renumber(&mut self, id: FolderId) -> Result<()> {
        if self.folder(id).is_none() {
            return Err(Error::NotFound(format!("folder #{}", id.0)));
        }

        let mut elements = std::mem::take(&mut self.folders[id.0].elements);
        {
            let folders = &self.folders;
            elements.par_sort_by(|a, b| Self::compare_elements(folders, a, b));
        }

        let width = padding_width(elements.iter().filter(|e| e.has_image_name()).count());
        let mut index = 0usize;
        for element in elements.iter_mut() {
            if !element.has_image_name() {
                continue;
            }
            match element {
                Element::Single(page) => {
                    page.name = format!(
                        "{:0width$}{}",
                        index,
                        extension_suffix(&page.original_name),
                        width = width
                    );
                }
                Element::Joined(joined) => {
                    joined.name = format!(
                        "{:0width$}{}",
                        index,
                        extension_suffix(&joined.name),
                        width = width
                    );
                }
                Element::Folder(_) => continue,
            }
            index += 1;
        }

        self.folders[id.0].elements = elements;
        log::debug!("Renumbered {} images in folder #{}", index, id.0);
        Ok(())
    }

    /// Image-bearing pages in depth-first order: image singles and every spread.
    pub fn images(&self) -> Vec<&Element> {
        let mut images = Vec::new();
        self.collect_images(self.root(), &mut images);
        images
    }

    fn collect_images<'a>(&'a self, id: FolderId, out: &mut Vec<&'a Element>) {
        for element in self.elements(id) {
            match element {
                Element::Folder(child) => self.collect_images(*child, out),
                Element::Single(page) if !page.is_image => {}
                _ => out.push(element),
            }
        }
    }
}
