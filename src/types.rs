//! Core data types shared by the readers, the editor and the writers.
//!
//! This module defines:
//! - Path classification (`ArchiveKind`, `is_archive_path`, `is_image_name`)
//! - The file tree produced by readers (`ArchiveEntry`, `ArchiveFolder`)
//! - Image format information for recognized page types (`ImageFormatInfo`)

use std::path::Path;

use crate::error::{Error, Result};

/// Container extensions treated as zip archives (compared case-insensitively).
pub const ARCHIVE_EXTENSIONS: [&str; 2] = ["zip", "cbz"];

/// Image extensions recognized as pages (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

fn lowercase_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Returns true if the path carries a zip-family container extension.
pub fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ARCHIVE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Returns true if the file name carries a recognized image extension.
pub fn is_image_name(name: &str) -> bool {
    lowercase_extension(name)
        .map(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

/// Physical representation of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArchiveKind {
    /// A `.zip` / `.cbz` container
    Zip,
    /// A plain directory of images
    Folder,
}

impl ArchiveKind {
    /// Classifies a path purely by its extension.
    pub fn classify(path: &Path) -> Self {
        if is_archive_path(path) {
            ArchiveKind::Zip
        } else {
            ArchiveKind::Folder
        }
    }
}

/// A file leaf of an archive tree.
///
/// `path` is the lookup key accepted by [`crate::reader::ArchiveReader::read_bytes`];
/// `name` is the display and sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveEntry {
    pub name: String,
    pub path: String,
    pub is_image: bool,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        let name = name.into();
        let is_image = is_image_name(&name);
        Self {
            name,
            path: path.into(),
            is_image,
        }
    }
}

/// A folder node of an archive tree. Identity is the full `path`, never the leaf name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveFolder {
    pub name: String,
    /// Path of this folder relative to the archive root, `""` for the root itself.
    pub path: String,
    pub files: Vec<ArchiveEntry>,
    pub folders: Vec<ArchiveFolder>,
}

impl ArchiveFolder {
    /// Finds a direct subfolder by name.
    pub fn folder(&self, name: &str) -> Option<&ArchiveFolder> {
        self.folders.iter().find(|f| f.name == name)
    }

    /// Total number of file leaves in this subtree.
    pub fn file_count(&self) -> usize {
        self.files.len() + self.folders.iter().map(|f| f.file_count()).sum::<usize>()
    }
}

/// Extension and MIME type of a recognized page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFormatInfo {
    pub extension: &'static str,
    pub mime: &'static str,
}

impl ImageFormatInfo {
    /// Determines the image type from a file name.
    ///
    /// # Supported formats
    ///
    /// - JPEG/JPG: image/jpeg
    /// - PNG: image/png
    /// - WebP: image/webp
    pub fn from_name(name: &str) -> Result<Self> {
        match lowercase_extension(name).as_deref() {
            Some("jpg") | Some("jpeg") => Ok(Self {
                extension: "jpg",
                mime: "image/jpeg",
            }),
            Some("png") => Ok(Self {
                extension: "png",
                mime: "image/png",
            }),
            Some("webp") => Ok(Self {
                extension: "webp",
                mime: "image/webp",
            }),
            other => Err(Error::UnsupportedFormat(format!(
                "image extension {:?} of '{}'",
                other, name
            ))),
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self.extension {
            "png" => image::ImageFormat::Png,
            "webp" => image::ImageFormat::WebP,
            _ => image::ImageFormat::Jpeg,
        }
    }
}
