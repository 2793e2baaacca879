//! Metadata store: song key -> [`SongRecord`], persisted as YAML.
//!
//! [`StoreFile`] handles the document on disk (load, atomic save) and
//! [`MetadataStore`] is the in-memory mapping with the merge and rename
//! rules. Records are never removed except through [`MetadataStore::remove`].
//!
//! # Document shape
//!
//! ```yaml
//! songs:
//!   habra-un-mañana:
//!     actual_title: ¿Habrá un Mañana?
//!     tags: [ballad]
//!     status: deferred
//!     notes: []
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::atomic;
use crate::error::{Error, Result, ResultExt};
use crate::model::{SongRecord, de};
use crate::slug::{SongKey, slugify};

/// What to do when a rename target already holds a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenameMode {
    /// Fail with [`Error::KeyCollision`]
    #[default]
    Reject,
    /// Fold the moved record into the existing one
    Merge,
}

/// On-disk layout of the metadata document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataDocument {
    #[serde(default, deserialize_with = "de::null_as_default")]
    songs: BTreeMap<SongKey, SongRecord>,
    /// Other top-level sections (e.g. `albums`) are carried through untouched
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// In-memory metadata store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    songs: BTreeMap<SongKey, SongRecord>,
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// Outcome of [`MetadataStore::normalize_keys`].
#[derive(Debug, Default)]
pub struct KeyNormalization {
    /// `(old, new)` pairs that were moved
    pub rekeyed: Vec<(SongKey, SongKey)>,
    /// Keys that could not be moved, with the reason
    pub failed: Vec<(SongKey, Error)>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.songs.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&SongRecord> {
        self.songs.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut SongRecord> {
        self.songs.get_mut(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SongKey> {
        self.songs.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SongKey, &SongRecord)> {
        self.songs.iter()
    }

    /// Insert a record, or merge it into the one already at `key`.
    ///
    /// Returns whether the store changed. See [`SongRecord::merge`].
    pub fn upsert(&mut self, key: SongKey, record: SongRecord) -> bool {
        match self.songs.get_mut(&key) {
            Some(existing) => existing.merge(record),
            None => {
                self.songs.insert(key, record);
                true
            }
        }
    }

    /// Move the record at `old` to `new`, keeping every field.
    pub fn rename(&mut self, old: &str, new: SongKey, mode: RenameMode) -> Result<()> {
        if new.as_str() == old {
            return Ok(());
        }
        if !self.songs.contains_key(old) {
            return Err(Error::UnknownKey(old.to_string()));
        }
        if self.songs.contains_key(&new) && mode == RenameMode::Reject {
            return Err(Error::collision(new.as_str(), new.as_str(), old));
        }

        let Some(record) = self.songs.remove(old) else {
            return Err(Error::UnknownKey(old.to_string()));
        };
        match self.songs.get_mut(&new) {
            Some(existing) => {
                tracing::info!(target: "store", from = old, to = %new, "Merged record into existing key");
                existing.absorb(record);
            }
            None => {
                tracing::info!(target: "store", from = old, to = %new, "Renamed key");
                self.songs.insert(new, record);
            }
        }
        Ok(())
    }

    /// Explicitly delete a record.
    pub fn remove(&mut self, key: &str) -> Option<SongRecord> {
        let removed = self.songs.remove(key);
        if removed.is_some() {
            tracing::info!(target: "store", key, "Removed record");
        }
        removed
    }

    /// Re-key hand-edited, non-canonical keys to their canonical form.
    ///
    /// The new key is derived from `actual_title`, falling back to the old
    /// key. A target that already exists is reported, never overwritten.
    pub fn normalize_keys(&mut self) -> KeyNormalization {
        let mut outcome = KeyNormalization::default();
        let pending: Vec<SongKey> = self
            .songs
            .keys()
            .filter(|k| !k.is_canonical())
            .cloned()
            .collect();

        for old in pending {
            let target = self
                .songs
                .get(&old)
                .and_then(|r| slugify(&r.actual_title).ok())
                .map_or_else(|| slugify(old.as_str()), Ok);

            let new = match target {
                Ok(new) => new,
                Err(e) => {
                    tracing::warn!(target: "store", key = %old, error = %e, "Cannot derive canonical key");
                    outcome.failed.push((old, e));
                    continue;
                }
            };

            match self.rename(old.as_str(), new.clone(), RenameMode::Reject) {
                Ok(()) => outcome.rekeyed.push((old, new)),
                Err(e) => {
                    tracing::warn!(target: "store", key = %old, error = %e, "Key normalization blocked");
                    outcome.failed.push((old, e));
                }
            }
        }

        outcome
    }
}

impl FromIterator<(SongKey, SongRecord)> for MetadataStore {
    fn from_iter<I: IntoIterator<Item = (SongKey, SongRecord)>>(iter: I) -> Self {
        Self {
            songs: iter.into_iter().collect(),
            extra: BTreeMap::new(),
        }
    }
}

/// The metadata document on disk.
#[derive(Debug, Clone)]
pub struct StoreFile {
    path: PathBuf,
    keep_backup: bool,
}

impl StoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_backup: false,
        }
    }

    /// Keep a `.bak` copy of the previous version on every save.
    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store. A missing or empty document is an empty store.
    pub fn load(&self) -> Result<MetadataStore> {
        if !self.path.exists() {
            tracing::info!(target: "store", path = %self.path.display(), "No metadata file, starting empty");
            return Ok(MetadataStore::new());
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(format!("Failed to read {}", self.path.display()))?;
        let store = parse(&contents).map_err(|message| Error::corrupt_store(&self.path, message))?;

        tracing::debug!(target: "store", path = %self.path.display(), songs = store.len(), "Loaded metadata");
        Ok(store)
    }

    /// Write the store atomically.
    pub fn save(&self, store: &MetadataStore) -> Result<()> {
        let contents = render(store)?;
        atomic::write_atomic(&self.path, &contents, self.keep_backup)?;
        tracing::info!(target: "store", path = %self.path.display(), songs = store.len(), "Saved metadata");
        Ok(())
    }
}

fn parse(contents: &str) -> std::result::Result<MetadataStore, String> {
    let mut value: serde_yaml::Value = serde_yaml::from_str(contents).map_err(|e| e.to_string())?;
    if value.is_null() {
        return Ok(MetadataStore::new());
    }
    stringify_song_keys(&mut value);
    let doc: MetadataDocument = serde_yaml::from_value(value).map_err(|e| e.to_string())?;
    Ok(MetadataStore {
        songs: doc.songs,
        extra: doc.extra,
    })
}

/// Hand-written keys like `1999:` parse as numbers; read them as text.
fn stringify_song_keys(doc: &mut serde_yaml::Value) {
    let Some(songs) = doc.get_mut("songs").and_then(serde_yaml::Value::as_mapping_mut) else {
        return;
    };
    *songs = std::mem::take(songs)
        .into_iter()
        .map(|(key, record)| {
            let key = match key {
                serde_yaml::Value::Number(n) => serde_yaml::Value::String(n.to_string()),
                serde_yaml::Value::Bool(b) => serde_yaml::Value::String(b.to_string()),
                other => other,
            };
            (key, record)
        })
        .collect();
}

fn render(store: &MetadataStore) -> Result<String> {
    let doc = MetadataDocument {
        songs: store.songs.clone(),
        extra: store.extra.clone(),
    };
    Ok(serde_yaml::to_string(&doc)?)
}
