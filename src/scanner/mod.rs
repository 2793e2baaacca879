//! Song folder scanning.
//!
//! Walks the immediate child directories of the archive root and reads the
//! lyrics files inside each one. The first non-empty line of a lyrics file is
//! the display title; everything after it is the body.
//!
//! File naming:
//! - `<slug>_lyrics.txt` - primary lyrics
//! - `<slug>_<lang>_lyrics.txt` - language variant (`lang` is 2-3 letters)
//!
//! [`scan`] returns a lazy iterator of [`ScanEvent`]s. It holds no state
//! beyond the directory walk, so calling it again re-reads the tree.

pub mod watcher;

pub use watcher::{FileWatcher, WatchError, WatchEvent, WatchFilter};

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result, ResultExt};
use crate::slug::{SongKey, slugify};

/// Suffix every lyrics file name ends with (matched case-insensitively).
pub const LYRICS_SUFFIX: &str = "_lyrics.txt";

/// Child directories that hold helper files, not songs.
const IGNORED_DIRS: &[&str] = &["tools"];

/// Lyrics-looking files that are build artifacts, not songs.
const IGNORED_FILES: &[&str] = &["consolidated_songs_lyrics.txt"];

/// Parsed lyrics file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsFileName {
    /// Name part before the language suffix
    pub stem: String,
    /// Lowercase language code, if this is a variant
    pub lang: Option<String>,
}

/// Parse `<stem>_lyrics.txt` / `<stem>_<lang>_lyrics.txt`.
///
/// A trailing `_xx` / `_xxx` is read as a language code here; whether it
/// really is one depends on the folder (see [`lyrics_files`]).
pub fn parse_lyrics_file_name(name: &str) -> Option<LyricsFileName> {
    let stem = full_stem(name)?;

    if let Some((head, tail)) = stem.rsplit_once('_') {
        let is_lang = (2..=3).contains(&tail.len()) && tail.chars().all(|c| c.is_ascii_alphabetic());
        if is_lang && !head.is_empty() {
            return Some(LyricsFileName {
                stem: head.to_string(),
                lang: Some(tail.to_ascii_lowercase()),
            });
        }
    }

    Some(LyricsFileName {
        stem: stem.to_string(),
        lang: None,
    })
}

/// Everything before `_lyrics.txt`, if `name` is a lyrics file.
fn full_stem(name: &str) -> Option<&str> {
    if IGNORED_FILES.iter().any(|f| f.eq_ignore_ascii_case(name)) {
        return None;
    }
    let cut = name.len().checked_sub(LYRICS_SUFFIX.len())?;
    if !name.is_char_boundary(cut) || !name[cut..].eq_ignore_ascii_case(LYRICS_SUFFIX) {
        return None;
    }
    Some(&name[..cut]).filter(|stem| !stem.is_empty())
}

/// Lyrics files in `folder`, sorted by path.
///
/// A language suffix only counts when the rest of the name matches a
/// primary file in the same folder or the folder itself, so
/// `big_red_lyrics.txt` is a primary file, not a `red` variant of `big`.
pub fn lyrics_files(folder: &Path) -> Result<Vec<(PathBuf, LyricsFileName)>> {
    let mut files: Vec<(PathBuf, LyricsFileName)> = Vec::new();
    for entry in fs::read_dir(folder).with_context(format!("Failed to list {}", folder.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if let Some(parsed) = name.to_str().and_then(parse_lyrics_file_name) {
            files.push((entry.path(), parsed));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let folder_key = folder
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| slugify(n).ok());
    let primary_stems: Vec<String> = files
        .iter()
        .filter(|(_, parsed)| parsed.lang.is_none())
        .map(|(_, parsed)| parsed.stem.clone())
        .collect();

    for (path, parsed) in &mut files {
        if parsed.lang.is_none() || primary_stems.contains(&parsed.stem) {
            continue;
        }
        let names_folder = folder_key.is_some() && slugify(&parsed.stem).ok() == folder_key;
        if names_folder {
            continue;
        }
        if let Some(stem) = path.file_name().and_then(|n| n.to_str()).and_then(full_stem) {
            *parsed = LyricsFileName {
                stem: stem.to_string(),
                lang: None,
            };
        }
    }
    Ok(files)
}

/// Index of the primary lyrics file: the first one without a language
/// suffix, else the first variant.
pub fn primary_index(files: &[(PathBuf, LyricsFileName)]) -> Option<usize> {
    if files.is_empty() {
        return None;
    }
    Some(
        files
            .iter()
            .position(|(_, parsed)| parsed.lang.is_none())
            .unwrap_or(0),
    )
}

/// Whether `path` names a lyrics file.
pub fn is_lyrics_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| parse_lyrics_file_name(n).is_some())
}

/// Title line and body of one lyrics file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsText {
    pub title: String,
    pub body: String,
}

/// Split lyrics text into title and body.
///
/// Returns `None` when the text has no non-empty line.
pub fn split_lyrics(text: &str) -> Option<LyricsText> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines();
    let title = lines.by_ref().map(str::trim).find(|l| !l.is_empty())?;

    let rest: Vec<&str> = lines.skip_while(|l| l.trim().is_empty()).collect();
    let body = rest.join("\n").trim_end().to_string();

    Some(LyricsText {
        title: title.to_string(),
        body,
    })
}

/// Read and split a lyrics file.
pub fn read_lyrics(path: &Path) -> Result<LyricsText> {
    let text =
        fs::read_to_string(path).with_context(format!("Failed to read {}", path.display()))?;
    split_lyrics(&text).ok_or_else(|| {
        Error::InvalidTitle(String::new()).context(format!("{} has no title line", path.display()))
    })
}

/// A language variant found next to the primary lyrics file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedVariant {
    pub lang: String,
    pub file: PathBuf,
    pub title: String,
    pub body: String,
}

/// One song folder as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedSong {
    /// Directory name as it is on disk
    pub folder_name: String,
    pub folder: PathBuf,
    /// Key derived from the title line
    pub key: SongKey,
    /// First non-empty line of the primary lyrics file, verbatim
    pub title: String,
    pub body: String,
    pub lyrics_file: PathBuf,
    pub variants: Vec<ScannedVariant>,
}

impl ScannedSong {
    /// Whether the folder is already named after its key.
    pub fn is_normalized(&self) -> bool {
        self.folder_name == self.key.as_str()
    }
}

/// Result of scanning one folder.
#[derive(Debug)]
pub enum ScanEvent {
    Song(ScannedSong),
    /// Folder has no lyrics file
    Skipped { folder: PathBuf, reason: String },
    /// Folder could not be read or its title is unusable
    Error { folder: PathBuf, error: Error },
}

/// Everything a scan produced, grouped.
#[derive(Debug, Default)]
pub struct ScanSummary {
    pub songs: Vec<ScannedSong>,
    pub skipped: Vec<(PathBuf, String)>,
    pub errors: Vec<(PathBuf, Error)>,
}

/// Lazy iterator over the song folders of an archive.
pub struct Scan {
    base: PathBuf,
    entries: walkdir::IntoIter,
}

/// Start scanning `base_dir`.
///
/// Fails only if `base_dir` itself is not a readable directory.
pub fn scan(base_dir: &Path) -> Result<Scan> {
    let meta = fs::metadata(base_dir)
        .with_context(format!("Cannot read base directory {}", base_dir.display()))?;
    if !meta.is_dir() {
        return Err(Error::not_found(base_dir));
    }

    Ok(Scan {
        base: base_dir.to_path_buf(),
        entries: WalkDir::new(base_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter(),
    })
}

impl Scan {
    /// Drain the scan into a [`ScanSummary`].
    pub fn summarize(self) -> ScanSummary {
        let mut summary = ScanSummary::default();
        for event in self {
            match event {
                ScanEvent::Song(song) => summary.songs.push(song),
                ScanEvent::Skipped { folder, reason } => summary.skipped.push((folder, reason)),
                ScanEvent::Error { folder, error } => summary.errors.push((folder, error)),
            }
        }
        summary
    }
}

impl Iterator for Scan {
    type Item = ScanEvent;

    fn next(&mut self) -> Option<ScanEvent> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let folder = e.path().map_or_else(|| self.base.clone(), Path::to_path_buf);
                    return Some(ScanEvent::Error {
                        folder,
                        error: Error::Io(e.into()),
                    });
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') || is_reserved_dir(&name, entry.path()) {
                continue;
            }

            return Some(scan_folder(entry.path()));
        }
    }
}

/// A helper directory such as `tools`, unless a song has been put there.
fn is_reserved_dir(name: &str, path: &Path) -> bool {
    IGNORED_DIRS.iter().any(|d| d.eq_ignore_ascii_case(name))
        && lyrics_files(path).map_or(true, |files| files.is_empty())
}

/// Read one song folder.
pub fn scan_folder(folder: &Path) -> ScanEvent {
    match read_folder(folder) {
        Ok(Some(song)) => {
            tracing::debug!(target: "scanner", folder = %folder.display(), key = %song.key, "Scanned song");
            ScanEvent::Song(song)
        }
        Ok(None) => {
            tracing::info!(target: "scanner", folder = %folder.display(), "No lyrics file, skipping");
            ScanEvent::Skipped {
                folder: folder.to_path_buf(),
                reason: format!("no *{LYRICS_SUFFIX} file"),
            }
        }
        Err(error) => {
            tracing::warn!(target: "scanner", folder = %folder.display(), error = %error, "Cannot scan folder");
            ScanEvent::Error {
                folder: folder.to_path_buf(),
                error,
            }
        }
    }
}

fn read_folder(folder: &Path) -> Result<Option<ScannedSong>> {
    let folder_name = folder
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::not_found(folder).context("Folder name is not valid UTF-8"))?
        .to_string();

    let mut files = lyrics_files(folder)?;
    let Some(primary_idx) = primary_index(&files) else {
        return Ok(None);
    };
    let (lyrics_file, _) = files.remove(primary_idx);
    let text = read_lyrics(&lyrics_file)?;
    let key = slugify(&text.title)
        .with_context(format!("Title line of {}", lyrics_file.display()))?;

    let mut variants = Vec::new();
    for (file, parsed) in files {
        let Some(lang) = parsed.lang else {
            tracing::warn!(target: "scanner", file = %file.display(), "Second primary lyrics file ignored");
            continue;
        };
        let variant = read_lyrics(&file)?;
        variants.push(ScannedVariant {
            lang,
            file,
            title: variant.title,
            body: variant.body,
        });
    }

    Ok(Some(ScannedSong {
        folder_name,
        folder: folder.to_path_buf(),
        key,
        title: text.title,
        body: text.body,
        lyrics_file,
        variants,
    }))
}
