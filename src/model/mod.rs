//! Core data models for the lyrics archive.
//!
//! Defines the primary entities: [`SongRecord`] (one entry of the metadata
//! document) and [`ConsolidatedSong`] (one entry of the consolidated lyrics
//! database).
//!
//! # Documents
//!
//! Both documents are YAML mappings under a top-level `songs:` key:
//! - `song_metadata.yml` - key -> `actual_title`, `tags`, `status`, `notes`
//! - `consolidated_songs.yml` - key -> `title`, `lyrics`, `variants`

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Workflow status of a song.
///
/// The set is open: anything not recognized round-trips as [`Status::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Released,
    #[default]
    Deferred,
    InProgress,
    Draft,
    Review,
    Final,
    Other(String),
}

impl Status {
    /// Statuses offered by the interactive menu.
    pub const CHOICES: [Status; 6] = [
        Status::Released,
        Status::Deferred,
        Status::InProgress,
        Status::Draft,
        Status::Review,
        Status::Final,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Status::Released => "released",
            Status::Deferred => "deferred",
            Status::InProgress => "in_progress",
            Status::Draft => "draft",
            Status::Review => "review",
            Status::Final => "final",
            Status::Other(s) => s,
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "released" => Status::Released,
            "deferred" => Status::Deferred,
            "in_progress" | "in-progress" => Status::InProgress,
            "draft" => Status::Draft,
            "review" => Status::Review,
            "final" => Status::Final,
            _ => Status::Other(s),
        }
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        Status::from(s.to_string())
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata kept for one song.
///
/// Title text comes from the lyrics file; tags, status and notes are only
/// ever changed by the user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SongRecord {
    /// Title exactly as written on the first line of the lyrics file
    #[serde(default)]
    pub actual_title: String,
    /// Unordered tag set
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub status: Status,
    /// Free-form notes in the order they were added
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub notes: Vec<String>,
    /// Fields this tool does not interpret (`ai_generated`, `album`, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl SongRecord {
    /// A fresh record with default status and no tags or notes.
    pub fn new(actual_title: impl Into<String>) -> Self {
        Self {
            actual_title: actual_title.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_notes<I, S>(mut self, notes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for note in notes {
            self.add_note(note);
        }
        self
    }

    /// Append a note unless an identical one is already present.
    ///
    /// Returns whether the note was added.
    pub fn add_note(&mut self, note: impl Into<String>) -> bool {
        let note = note.into();
        if self.notes.contains(&note) {
            return false;
        }
        self.notes.push(note);
        true
    }

    /// Merge `other` into `self`.
    ///
    /// Title and status are taken from `other` when it has them (a default
    /// status counts as unset), tags are unioned, notes appended in order
    /// skipping duplicates, unknown fields overlaid. Returns whether anything
    /// changed.
    pub fn merge(&mut self, other: SongRecord) -> bool {
        let before = self.clone();

        if !other.actual_title.is_empty() {
            self.actual_title = other.actual_title;
        }
        if other.status != Status::default() {
            self.status = other.status;
        }
        self.tags.extend(other.tags);
        for note in other.notes {
            self.add_note(note);
        }
        self.extra.extend(other.extra);

        *self != before
    }

    /// Fold `other` into `self` without touching title or status.
    ///
    /// Used when two records are explicitly merged under one key: the record
    /// already at the key keeps its identity and gains the other's tags,
    /// notes and any unknown fields it lacks.
    pub fn absorb(&mut self, other: SongRecord) {
        self.tags.extend(other.tags);
        for note in other.notes {
            self.add_note(note);
        }
        for (field, value) in other.extra {
            self.extra.entry(field).or_insert(value);
        }
    }
}

/// One language variant of a song's lyrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsVariant {
    pub title: String,
    pub lyrics: String,
}

/// One entry of the consolidated lyrics database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedSong {
    pub title: String,
    pub lyrics: String,
    /// Language code -> variant, for `<slug>_<lang>_lyrics.txt` files
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variants: BTreeMap<String, LyricsVariant>,
}

pub(crate) mod de {
    use serde::{Deserialize, Deserializer};

    /// Treat an explicit `null` (`tags:` with nothing after it) as empty.
    pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }
}
