//! Folder name and metadata key reconciliation.
//!
//! Brings the archive back into agreement: every song folder is named after
//! the key derived from its title line, every folder has a metadata record,
//! and every record carries the title exactly as the lyrics file spells it.
//!
//! # Rules
//!
//! - Hand-edited store keys are normalized before anything else
//! - Two folders deriving one key are a collision; both are left alone
//! - A rename never clobbers an occupied target (filesystem conflict)
//! - Records without a folder are orphans: reported, never deleted
//! - The store is only written when something changed
//!
//! Running it twice in a row without touching the archive is a no-op the
//! second time.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::SongRecord;
use crate::organizer::{self, RenameKind};
use crate::scanner::{self, ScannedSong};
use crate::slug::SongKey;
use crate::store::{MetadataStore, StoreFile};

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Compute the report without renaming folders or writing the store
    pub dry_run: bool,
}

/// A folder moved (or, in a dry run, to be moved) to its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderRename {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// A record whose `actual_title` was replaced by the title line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Retitle {
    pub key: SongKey,
    pub from: String,
    pub to: String,
}

/// Something reconciliation could not resolve on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    /// Several folders derive the same key
    KeyCollision { key: SongKey, folders: Vec<PathBuf> },
    /// A store key could not be normalized because the target key is taken
    StoreKeyCollision { from: SongKey, to: SongKey },
    /// Rename target exists and holds something else
    FilesystemConflict { from: PathBuf, to: PathBuf },
    /// A store key has no usable canonical form
    InvalidStoreKey { key: SongKey, message: String },
    /// A folder could not be read or renamed
    Unreadable { folder: PathBuf, message: String },
}

impl Issue {
    /// The equivalent hard error for collisions and conflicts.
    fn to_error(&self) -> Option<Error> {
        match self {
            Issue::KeyCollision { key, folders } => {
                let name = |i: usize| {
                    folders
                        .get(i)
                        .map(|f| f.display().to_string())
                        .unwrap_or_default()
                };
                Some(Error::collision(key.as_str(), name(0), name(1)))
            }
            Issue::StoreKeyCollision { from, to } => {
                Some(Error::collision(to.as_str(), to.as_str(), from.as_str()))
            }
            Issue::FilesystemConflict { from, to } => Some(Error::conflict(from, to)),
            Issue::InvalidStoreKey { .. } | Issue::Unreadable { .. } => None,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::KeyCollision { key, folders } => {
                let names: Vec<String> = folders.iter().map(|p| p.display().to_string()).collect();
                write!(f, "key collision on '{key}': {}", names.join(", "))
            }
            Issue::StoreKeyCollision { from, to } => {
                write!(f, "store key '{from}' cannot become '{to}': already taken")
            }
            Issue::FilesystemConflict { from, to } => {
                write!(f, "cannot rename {} to {}: target exists", from.display(), to.display())
            }
            Issue::InvalidStoreKey { key, message } => write!(f, "store key '{key}': {message}"),
            Issue::Unreadable { folder, message } => write!(f, "{}: {message}", folder.display()),
        }
    }
}

/// What a reconciliation run did (or would do, in a dry run).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub renamed: Vec<FolderRename>,
    /// Keys that got a fresh record
    pub created: Vec<SongKey>,
    pub retitled: Vec<Retitle>,
    /// Store keys moved to their canonical form, `(old, new)`
    pub rekeyed: Vec<(SongKey, SongKey)>,
    /// Store keys with no folder
    pub orphans: Vec<SongKey>,
    /// Folders with no lyrics file
    pub skipped: Vec<PathBuf>,
    pub issues: Vec<Issue>,
    /// Whether the in-memory store differs from what was passed in
    pub store_changed: bool,
    /// Whether the store document was written
    pub store_written: bool,
}

impl ReconcileReport {
    /// Nothing renamed, created, retitled or rekeyed.
    pub fn is_noop(&self) -> bool {
        self.renamed.is_empty() && !self.store_changed
    }

    /// Fail on the first collision or conflict.
    pub fn into_result(self) -> Result<Self> {
        match self.issues.iter().find_map(Issue::to_error) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Reconcile `base_dir` against an in-memory store.
///
/// Folders are renamed on disk unless `dry_run` is set; the store is only
/// changed in memory. Use [`reconcile_file`] to load and save it as well.
pub fn reconcile(
    base_dir: &Path,
    store: &mut MetadataStore,
    options: &ReconcileOptions,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    let normalization = store.normalize_keys();
    report.rekeyed = normalization.rekeyed;
    for (key, error) in normalization.failed {
        report.issues.push(match error.root() {
            Error::KeyCollision { key: to, .. } => Issue::StoreKeyCollision {
                from: key,
                to: SongKey::from_raw(to.as_str()),
            },
            other => Issue::InvalidStoreKey {
                key,
                message: other.to_string(),
            },
        });
    }
    let mut changed = !report.rekeyed.is_empty();

    let summary = scanner::scan(base_dir)?.summarize();
    report.skipped = summary.skipped.into_iter().map(|(folder, _)| folder).collect();
    for (folder, error) in summary.errors {
        report.issues.push(Issue::Unreadable {
            folder,
            message: error.to_string(),
        });
    }

    let mut groups: BTreeMap<SongKey, Vec<ScannedSong>> = BTreeMap::new();
    for song in summary.songs {
        groups.entry(song.key.clone()).or_default().push(song);
    }
    let on_disk: BTreeSet<SongKey> = groups.keys().cloned().collect();

    for (key, mut songs) in groups {
        if songs.len() > 1 {
            let folders: Vec<PathBuf> = songs.iter().map(|s| s.folder.clone()).collect();
            tracing::warn!(target: "reconciler", key = %key, folders = ?folders, "Key collision, leaving folders untouched");
            report.issues.push(Issue::KeyCollision { key, folders });
            continue;
        }
        let Some(song) = songs.pop() else {
            continue;
        };

        if !song.is_normalized() {
            let target = base_dir.join(key.as_str());
            let outcome = if options.dry_run {
                organizer::check_rename(&song.folder, &target)
            } else {
                organizer::rename_folder(&song.folder, &target)
            };
            match outcome {
                Ok(RenameKind::Noop) => {}
                Ok(_) => report.renamed.push(FolderRename {
                    from: song.folder.clone(),
                    to: target,
                }),
                Err(e) if e.is_conflict() => {
                    tracing::warn!(target: "reconciler", from = %song.folder.display(), to = %target.display(), "Rename target occupied");
                    report.issues.push(Issue::FilesystemConflict {
                        from: song.folder,
                        to: target,
                    });
                    continue;
                }
                Err(e) => {
                    tracing::warn!(target: "reconciler", folder = %song.folder.display(), error = %e, "Rename failed");
                    report.issues.push(Issue::Unreadable {
                        folder: song.folder,
                        message: e.to_string(),
                    });
                    continue;
                }
            }
        }

        match store.get_mut(key.as_str()) {
            None => {
                tracing::info!(target: "reconciler", key = %key, title = %song.title, "New song");
                store.upsert(key.clone(), SongRecord::new(song.title));
                report.created.push(key);
                changed = true;
            }
            Some(record) if record.actual_title != song.title => {
                tracing::info!(target: "reconciler", key = %key, from = %record.actual_title, to = %song.title, "Title changed");
                report.retitled.push(Retitle {
                    key,
                    from: std::mem::replace(&mut record.actual_title, song.title.clone()),
                    to: song.title,
                });
                changed = true;
            }
            Some(_) => {}
        }
    }

    report.orphans = store
        .keys()
        .filter(|k| !on_disk.contains(*k))
        .cloned()
        .collect();
    for orphan in &report.orphans {
        tracing::info!(target: "reconciler", key = %orphan, "Orphan record, no folder on disk");
    }

    report.store_changed = changed;
    Ok(report)
}

/// Load the store from `file`, reconcile, and save it if anything changed.
pub fn reconcile_file(
    base_dir: &Path,
    file: &StoreFile,
    options: &ReconcileOptions,
) -> Result<ReconcileReport> {
    let mut store = file.load()?;
    let mut report = reconcile(base_dir, &mut store, options)?;

    if report.store_changed && !options.dry_run {
        file.save(&store)?;
        report.store_written = true;
    }

    tracing::info!(
        target: "reconciler",
        renamed = report.renamed.len(),
        created = report.created.len(),
        retitled = report.retitled.len(),
        orphans = report.orphans.len(),
        issues = report.issues.len(),
        written = report.store_written,
        "Reconciliation finished"
    );
    Ok(report)
}
