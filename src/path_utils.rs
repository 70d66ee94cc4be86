//! Path utilities for archive entry keys and on-disk artifacts.
//!
//! Entry keys are the strings readers hand out and accept back: in-container paths for zip
//! archives and `/`-joined relative paths for folder archives. This module converts between
//! those keys and filesystem paths without ever letting a key escape the archive root, and
//! derives the sibling paths used for temporary save artifacts.

use crate::error::{Error, Result};

use std::path::{Component, Path, PathBuf};

/// Separators accepted inside container entry names.
pub const ENTRY_SEPARATORS: [char; 2] = ['/', '\\'];

/// Gets the file name from a path with fallback to lossy conversion.
///
/// # Arguments
///
/// * `path` - The path to extract the file name from
///
/// # Returns
///
/// * `String` - The file name, using lossy conversion if necessary
pub fn get_file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Gets the file name without its extension, with fallback to lossy conversion.
pub fn get_file_stem_lossy(path: &Path) -> String {
    path.file_stem()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| get_file_name_lossy(path))
}

/// Checks if a filename starts with a dot (hidden file).
pub fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Splits a container entry name into its non-empty segments.
///
/// A trailing separator (a folder marker such as `img/`) produces no extra segment.
pub fn entry_segments(entry: &str) -> Vec<&str> {
    entry
        .split(|c| ENTRY_SEPARATORS.contains(&c))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Returns true if the container entry name denotes a folder marker.
pub fn is_folder_marker(entry: &str) -> bool {
    entry.ends_with(ENTRY_SEPARATORS)
}

/// Builds the `/`-joined entry key of a path relative to an archive root.
///
/// # Returns
///
/// * `Option<String>` - The key, or `None` if `path` is not below `root`
pub fn entry_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Resolves an entry key to a filesystem path below `root`.
///
/// Keys with parent, root or prefix components are rejected so that a key can never address
/// a file outside the archive.
pub fn resolve_entry(root: &Path, key: &str) -> Result<PathBuf> {
    let mut resolved = root.to_path_buf();
    for segment in entry_segments(key) {
        match Path::new(segment).components().next() {
            Some(Component::Normal(part)) => resolved.push(part),
            _ => {
                return Err(Error::InvalidPath(
                    PathBuf::from(key),
                    "Entry key escapes the archive root".to_string(),
                ));
            }
        }
    }
    Ok(resolved)
}

/// Derives the sibling path used as a temporary artifact while replacing `path`.
///
/// `vol.cbz` becomes `vol{suffix}.cbz`; a directory `vol` becomes `vol{suffix}`.
pub fn temp_sibling(path: &Path, suffix: &str, keep_extension: bool) -> Result<PathBuf> {
    let parent = path.parent().ok_or_else(|| {
        Error::InvalidPath(path.to_path_buf(), "Path has no parent directory".to_string())
    })?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf(), "Path has no name".to_string()))?;

    let file_name = match path.extension() {
        Some(ext) if keep_extension => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        _ => format!("{}{}", get_file_name_lossy(path), suffix),
    };
    Ok(parent.join(file_name))
}

/// Checks that a user-supplied entry name is usable as a single path segment.
pub fn validate_entry_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidOperation("Name must not be empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidOperation(format!(
            "'{}' is not a valid name",
            name
        )));
    }
    if name
        .chars()
        .any(|c| ENTRY_SEPARATORS.contains(&c) || c.is_control())
    {
        return Err(Error::InvalidOperation(format!(
            "Name '{}' contains a separator or control character",
            name
        )));
    }
    Ok(())
}
