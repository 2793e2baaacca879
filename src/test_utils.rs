//! Test utilities and fixtures for lyrics-keeper tests.
//!
//! Builds throwaway archives in temporary directories so tests can exercise
//! the scanner, reconciler and consolidator against a real filesystem.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{temp_archive, write_song};
//!
//! #[test]
//! fn test_something() {
//!     let (_dir, base) = temp_archive();
//!     write_song(&base, "My Song", "my-song_lyrics.txt", "My Song\n\nla la\n");
//!     // ... test logic
//! }
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::model::SongRecord;
use crate::slug::SongKey;
use crate::store::MetadataStore;

/// Creates an empty archive root.
///
/// Keep the returned `TempDir` alive for the duration of the test; the
/// directory is deleted when it is dropped.
pub fn temp_archive() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let base = dir.path().join("songs");
    std::fs::create_dir(&base).expect("Failed to create archive root");
    (dir, base)
}

/// Writes a lyrics file into `base/folder`, creating the folder if needed.
///
/// Returns the path of the written file.
pub fn write_song(base: &Path, folder: &str, file: &str, contents: &str) -> PathBuf {
    let folder_path = base.join(folder);
    std::fs::create_dir_all(&folder_path).expect("Failed to create song folder");
    let path = folder_path.join(file);
    std::fs::write(&path, contents).expect("Failed to write lyrics file");
    path
}

/// Writes a song whose folder and file are already named after `key`.
pub fn write_normalized_song(base: &Path, key: &str, title: &str) -> PathBuf {
    write_song(
        base,
        key,
        &format!("{key}_lyrics.txt"),
        &format!("{title}\n\nFirst verse\nSecond verse\n"),
    )
}

/// Sorted names of the directories directly under `base`.
pub fn folder_names(base: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(base)
        .expect("Failed to list archive")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Creates a mock SongRecord with sensible defaults.
///
/// Customize using struct update syntax:
///
/// ```ignore
/// let record = SongRecord {
///     actual_title: "Custom".to_string(),
///     ..mock_record()
/// };
/// ```
pub fn mock_record() -> SongRecord {
    SongRecord::new("Test Song")
        .with_tags(["test"])
        .with_notes(["written in a test"])
}

/// Builds a store from `(key, title)` pairs with default records.
pub fn store_with(entries: &[(&str, &str)]) -> MetadataStore {
    entries
        .iter()
        .map(|(key, title)| (SongKey::from_raw(*key), SongRecord::new(*title)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_archive_is_empty_dir() {
        let (_dir, base) = temp_archive();
        assert!(base.is_dir());
        assert!(folder_names(&base).is_empty());
    }

    #[test]
    fn test_write_song_creates_folder() {
        let (_dir, base) = temp_archive();
        let path = write_normalized_song(&base, "faro-y-reflejo", "Faro y Reflejo");
        assert!(path.ends_with("faro-y-reflejo/faro-y-reflejo_lyrics.txt"));
        assert_eq!(folder_names(&base), vec!["faro-y-reflejo"]);
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("Faro y Reflejo\n"));
    }

    #[test]
    fn test_mock_record_defaults() {
        let record = mock_record();
        assert_eq!(record.actual_title, "Test Song");
        assert!(record.tags.contains("test"));
    }

    #[test]
    fn test_store_with() {
        let store = store_with(&[("a", "A"), ("b", "B")]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("b").unwrap().actual_title, "B");
    }
}
