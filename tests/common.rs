//! Common test utilities and constants for the Mangaman crate.
//!
//! Provides functions for setting up scratch directories, creating dummy images,
//! building zip containers and inspecting saved archives.

use image::{Rgb, RgbImage};
use mangaman::error::Result;
use rand::{Rng, distributions::Alphanumeric};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use zip::write::SimpleFileOptions;

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A unique scratch directory for one test.
#[allow(dead_code)]
pub struct TestDirs {
    pub base_dir: PathBuf,
    pub library_dir: PathBuf,
}

/// Creates a clean, uniquely named test directory with a `library` subdirectory.
#[allow(dead_code)]
pub async fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let unique_sub_path = format!("{}-{}", sub_path, rand_string);
    let base_dir = PathBuf::from(TEST_TMP_DIR).join(unique_sub_path);
    if base_dir.exists() {
        fs::remove_dir_all(&base_dir).await.unwrap();
    }
    let library_dir = base_dir.join("library");
    fs::create_dir_all(&library_dir).await.unwrap();

    TestDirs {
        base_dir,
        library_dir,
    }
}

/// Encodes a solid-color image of the given size in the format implied by `name`.
#[allow(dead_code)]
pub fn image_bytes(name: &str, width: u32, height: u32, color: Rgb<u8>) -> Vec<u8> {
    let format = image::ImageFormat::from_path(name).unwrap_or(image::ImageFormat::Jpeg);
    let img = RgbImage::from_pixel(width, height, color);
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

/// Creates a minimal dummy image at the given path, creating parent directories.
#[allow(dead_code)]
pub async fn create_dummy_image(path: &Path, color: Rgb<u8>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let name = path.to_string_lossy().to_string();
    let bytes = tokio::task::spawn_blocking(move || image_bytes(&name, 40, 60, color)).await?;
    fs::write(path, bytes).await?;
    Ok(())
}

/// Creates a red dummy image.
#[allow(dead_code)]
pub async fn create_dummy_color_image(path: &Path) -> Result<()> {
    create_dummy_image(path, Rgb([255, 0, 0])).await
}

/// Creates a file with arbitrary text content.
#[allow(dead_code)]
pub async fn create_text_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await?;
    Ok(())
}

/// Writes a zip container holding `entries` in the given order.
///
/// An entry whose name ends with `/` is written as a directory entry.
#[allow(dead_code)]
pub fn create_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, bytes) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
    }
    zip.finish().unwrap();
}

/// Lists the entry names of a zip container in stored order.
#[allow(dead_code)]
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    archive.file_names().map(|n| n.to_string()).collect::<Vec<_>>()
}

/// Reads one entry of a zip container.
#[allow(dead_code)]
pub fn zip_entry_bytes(path: &Path, name: &str) -> Vec<u8> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}

/// Lists the file names directly inside a directory, sorted.
#[allow(dead_code)]
pub fn dir_file_names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().unwrap().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
