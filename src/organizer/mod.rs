//! Song folder operations.
//!
//! Renames, creates and deletes song folders on disk. Renames never
//! overwrite: a target that exists and holds something else is a
//! [`Error::FilesystemConflict`] and the source is left where it was.
//!
//! # Features
//! - Conflict check usable on its own for dry runs ([`check_rename`])
//! - Case-only renames (`Foo` -> `foo`) on case-insensitive filesystems
//! - Empty placeholder directories at the target are replaced
//! - Lyrics file renames and title-line rewrites for explicit song renames,
//!   planned up front so a conflict stops the rename before anything moves

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::atomic;
use crate::error::{Error, Result, ResultExt};
use crate::scanner::{LYRICS_SUFFIX, lyrics_files, primary_index};
use crate::slug::SongKey;

/// How a folder rename will be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameKind {
    /// Source and target are the same path
    Noop,
    /// Target does not exist
    Direct,
    /// Target resolves to the source itself (case or normalization alias)
    Alias,
    /// Target is an empty directory that will be removed first
    ReplaceEmpty,
}

/// Decide how `from` can be renamed to `to`, without touching disk.
pub fn check_rename(from: &Path, to: &Path) -> Result<RenameKind> {
    if from == to {
        return Ok(RenameKind::Noop);
    }
    if !from.exists() {
        return Err(Error::not_found(from));
    }
    if !to.exists() {
        return Ok(RenameKind::Direct);
    }
    if is_alias(from, to)? {
        return Ok(RenameKind::Alias);
    }
    if to.is_dir() && fs::read_dir(to)?.next().is_none() {
        return Ok(RenameKind::ReplaceEmpty);
    }
    Err(Error::conflict(from, to))
}

/// Rename a folder, refusing to clobber a different non-empty target.
pub fn rename_folder(from: &Path, to: &Path) -> Result<RenameKind> {
    let kind = check_rename(from, to)?;
    match kind {
        RenameKind::Noop => {}
        RenameKind::Direct => {
            fs::rename(from, to).with_context(format!(
                "Failed to rename {} to {}",
                from.display(),
                to.display()
            ))?;
        }
        RenameKind::Alias => {
            // Case-insensitive filesystems treat Foo -> foo as a no-op; go via a third name
            let staging = staging_path(to);
            fs::rename(from, &staging)
                .with_context(format!("Failed to stage rename of {}", from.display()))?;
            fs::rename(&staging, to)
                .with_context(format!("Failed to finish rename to {}", to.display()))?;
        }
        RenameKind::ReplaceEmpty => {
            fs::remove_dir(to)
                .with_context(format!("Failed to remove empty {}", to.display()))?;
            fs::rename(from, to).with_context(format!(
                "Failed to rename {} to {}",
                from.display(),
                to.display()
            ))?;
        }
    }
    if kind != RenameKind::Noop {
        tracing::info!(target: "organizer", from = %from.display(), to = %to.display(), ?kind, "Renamed folder");
    }
    Ok(kind)
}

/// Whether `to` is another spelling of the `from` directory entry.
fn is_alias(from: &Path, to: &Path) -> Result<bool> {
    if fs::canonicalize(from)? == fs::canonicalize(to)? {
        return Ok(true);
    }
    // `to` exists but no entry carries its exact name: the filesystem matched it loosely
    let (Some(parent), Some(name)) = (to.parent(), to.file_name()) else {
        return Ok(false);
    };
    let exact = fs::read_dir(parent)?
        .filter_map(|e| e.ok())
        .any(|e| e.file_name() == name);
    Ok(!exact)
}

fn staging_path(to: &Path) -> PathBuf {
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    to.with_file_name(format!(".{name}.renaming"))
}

/// Create `base/<key>/` with a lyrics file whose first line is `title`.
pub fn create_song_folder(base: &Path, key: &SongKey, title: &str) -> Result<PathBuf> {
    let folder = base.join(key.as_str());
    if folder.exists() {
        return Err(Error::collision(
            key.as_str(),
            folder.display().to_string(),
            title,
        ));
    }
    fs::create_dir_all(&folder)
        .with_context(format!("Failed to create {}", folder.display()))?;

    let lyrics = folder.join(key.lyrics_file_name());
    atomic::write_atomic(&lyrics, &format!("{title}\n\n"), false)?;

    tracing::info!(target: "organizer", folder = %folder.display(), "Created song folder");
    Ok(folder)
}

/// Delete a song folder and everything in it. Returns whether it existed.
pub fn delete_song_folder(folder: &Path) -> Result<bool> {
    if !folder.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(folder).with_context(format!("Failed to delete {}", folder.display()))?;
    tracing::info!(target: "organizer", folder = %folder.display(), "Deleted song folder");
    Ok(true)
}

/// Lyrics file renames that put a song's files under a new key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LyricsRename {
    /// `(from, to)` file names inside the song folder
    moves: Vec<(String, String)>,
    /// Name of the primary lyrics file once the moves are done
    primary: Option<String>,
}

/// Plan renaming the lyrics files in `folder` to `new`'s names.
///
/// The primary file (chosen as the scanner chooses it) becomes
/// `<new>_lyrics.txt` whatever it is called now, and every language variant
/// becomes `<new>_<lang>_lyrics.txt`. Any occupied target fails the whole
/// plan; nothing on disk is touched.
pub fn plan_lyrics_rename(folder: &Path, new: &SongKey) -> Result<LyricsRename> {
    let files = lyrics_files(folder)?;
    let Some(primary_idx) = primary_index(&files) else {
        return Ok(LyricsRename::default());
    };

    let mut plan = LyricsRename::default();
    let mut targets = BTreeSet::new();
    for (i, (path, parsed)) in files.iter().enumerate() {
        let target = match &parsed.lang {
            Some(lang) => format!("{new}_{lang}{LYRICS_SUFFIX}"),
            None if i == primary_idx => new.lyrics_file_name(),
            // A second primary file is left alone, as the scanner ignores it
            None => continue,
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let target_path = folder.join(&target);

        if !targets.insert(target.clone()) {
            return Err(Error::conflict(path, target_path));
        }
        if name != target {
            if target_path.exists() && !is_alias(path, &target_path)? {
                return Err(Error::conflict(path, target_path));
            }
            plan.moves.push((name.to_string(), target.clone()));
        }
        if i == primary_idx {
            plan.primary = Some(target);
        }
    }
    Ok(plan)
}

impl LyricsRename {
    /// Number of files that change name.
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Rename the files inside `folder` and write `title` as the primary
    /// file's title line.
    ///
    /// `folder` is where the song lives now, which may differ from the folder
    /// the plan was made in. Renames already done are undone if a later step
    /// fails.
    pub fn apply(&self, folder: &Path, title: &str) -> Result<usize> {
        let mut done = Vec::new();
        let result = self.apply_steps(folder, title, &mut done);
        if result.is_err() {
            for (from, to) in done.iter().rev() {
                if let Err(e) = fs::rename(to, from) {
                    tracing::warn!(target: "organizer", file = %to.display(), error = %e, "Could not undo lyrics rename");
                }
            }
        }
        result
    }

    fn apply_steps(&self, folder: &Path, title: &str, done: &mut Vec<(PathBuf, PathBuf)>) -> Result<usize> {
        for (from, to) in &self.moves {
            let (from, to) = (folder.join(from), folder.join(to));
            fs::rename(&from, &to).with_context(format!("Failed to rename {}", from.display()))?;
            done.push((from, to));
        }
        if let Some(primary) = &self.primary {
            rewrite_title_line(&folder.join(primary), title)?;
        }
        if !self.moves.is_empty() {
            tracing::info!(target: "organizer", folder = %folder.display(), files = self.moves.len(), "Renamed lyrics files");
        }
        Ok(self.moves.len())
    }
}

/// Replace the first non-empty line of a lyrics file.
pub fn rewrite_title_line(lyrics_file: &Path, title: &str) -> Result<()> {
    let text = fs::read_to_string(lyrics_file)
        .with_context(format!("Failed to read {}", lyrics_file.display()))?;

    let mut replaced = false;
    let lines: Vec<&str> = text
        .lines()
        .map(|line| {
            if !replaced && !line.trim().is_empty() {
                replaced = true;
                title
            } else {
                line
            }
        })
        .collect();

    let mut out = lines.join("\n");
    if !replaced {
        out = format!("{title}\n\n{out}");
    }
    if text.ends_with('\n') && !out.ends_with('\n') {
        out.push('\n');
    }
    atomic::write_atomic(lyrics_file, &out, false)
}
