//! Song-level operations behind the interactive menu.
//!
//! Each function combines folder operations with store edits so a song's
//! folder, lyrics file and metadata record move together. Callers own the
//! [`MetadataStore`] and decide when to save it.

use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{SongRecord, Status};
use crate::organizer::{self, RenameKind};
use crate::slug::{SongKey, slugify};
use crate::store::{MetadataStore, RenameMode};

/// Changes to apply to one record. Empty fields leave it alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongUpdate {
    pub title: Option<String>,
    pub status: Option<Status>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    pub add_notes: Vec<String>,
}

impl SongUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Which records [`list_songs`] returns.
#[derive(Debug, Clone, Default)]
pub struct SongFilter {
    pub status: Option<Status>,
    pub tag: Option<String>,
}

impl SongFilter {
    fn matches(&self, record: &SongRecord) -> bool {
        self.status.as_ref().is_none_or(|s| *s == record.status)
            && self.tag.as_ref().is_none_or(|t| record.tags.contains(t))
    }
}

/// Create a folder and lyrics file for a new song and give it a record.
pub fn add_song(base: &Path, store: &mut MetadataStore, title: &str) -> Result<SongKey> {
    let title = title.trim();
    let key = slugify(title)?;
    if let Some(existing) = store.get(key.as_str()) {
        return Err(Error::collision(key.as_str(), &existing.actual_title, title));
    }

    organizer::create_song_folder(base, &key, title)?;
    store.upsert(key.clone(), SongRecord::new(title));
    tracing::info!(target: "library", key = %key, title, "Added song");
    Ok(key)
}

/// Apply `update` to the record at `key`. Returns whether it changed.
///
/// A new title must keep the same key; use [`rename_song`] otherwise.
pub fn update_song(store: &mut MetadataStore, key: &str, update: SongUpdate) -> Result<bool> {
    let record = store
        .get_mut(key)
        .ok_or_else(|| Error::UnknownKey(key.to_string()))?;
    let before = record.clone();

    if let Some(title) = update.title {
        let title = title.trim().to_string();
        let derived = slugify(&title)?;
        if derived != key {
            return Err(Error::InvalidTitle(title).context(format!(
                "title maps to '{derived}', not '{key}'; rename the song instead"
            )));
        }
        record.actual_title = title;
    }
    if let Some(status) = update.status {
        record.status = status;
    }
    for tag in &update.remove_tags {
        record.tags.remove(tag.trim());
    }
    record.tags.extend(
        update
            .add_tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(String::from),
    );
    for note in update.add_notes {
        if !note.trim().is_empty() {
            record.add_note(note);
        }
    }

    let changed = *record != before;
    if changed {
        tracing::info!(target: "library", key, "Updated song");
    }
    Ok(changed)
}

/// Remove a song's record and its folder.
pub fn delete_song(base: &Path, store: &mut MetadataStore, key: &str) -> Result<SongRecord> {
    if !store.contains(key) {
        return Err(Error::UnknownKey(key.to_string()));
    }
    organizer::delete_song_folder(&base.join(key))?;
    store
        .remove(key)
        .ok_or_else(|| Error::UnknownKey(key.to_string()))
}

/// Give a song a new title, moving its key, folder and lyrics files.
///
/// Every target is checked before anything moves, so a collision or
/// conflict leaves the song as it was.
pub fn rename_song(
    base: &Path,
    store: &mut MetadataStore,
    old_key: &str,
    new_title: &str,
) -> Result<SongKey> {
    let new_title = new_title.trim();
    let new_key = slugify(new_title)?;
    if !store.contains(old_key) {
        return Err(Error::UnknownKey(old_key.to_string()));
    }
    if new_key != old_key {
        if let Some(existing) = store.get(new_key.as_str()) {
            return Err(Error::collision(new_key.as_str(), &existing.actual_title, new_title));
        }
    }

    let old_folder = base.join(old_key);
    let new_folder = base.join(new_key.as_str());
    if old_folder.is_dir() {
        let lyrics = organizer::plan_lyrics_rename(&old_folder, &new_key)?;
        let kind = organizer::check_rename(&old_folder, &new_folder)?;
        if kind != RenameKind::Noop {
            organizer::rename_folder(&old_folder, &new_folder)?;
        }
        if let Err(e) = lyrics.apply(&new_folder, new_title) {
            if kind != RenameKind::Noop {
                if let Err(undo) = organizer::rename_folder(&new_folder, &old_folder) {
                    tracing::warn!(target: "library", folder = %new_folder.display(), error = %undo, "Could not move folder back");
                }
            }
            return Err(e);
        }
    } else {
        tracing::warn!(target: "library", key = old_key, "No folder on disk, renaming record only");
    }

    store.rename(old_key, new_key.clone(), RenameMode::Reject)?;
    if let Some(record) = store.get_mut(new_key.as_str()) {
        record.actual_title = new_title.to_string();
    }
    tracing::info!(target: "library", from = old_key, to = %new_key, "Renamed song");
    Ok(new_key)
}

/// Records matching `filter`, in key order.
pub fn list_songs<'a>(
    store: &'a MetadataStore,
    filter: &SongFilter,
) -> Vec<(&'a SongKey, &'a SongRecord)> {
    store.iter().filter(|(_, r)| filter.matches(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{ReconcileOptions, reconcile};
    use crate::test_utils::{folder_names, store_with, temp_archive, write_normalized_song, write_song};
    use std::fs;

    #[test]
    fn test_add_song_creates_folder_and_record() {
        let (_dir, base) = temp_archive();
        let mut store = MetadataStore::new();

        let key = add_song(&base, &mut store, "  ¿Habrá un Mañana?  ").unwrap();

        assert_eq!(key.as_str(), "habra-un-mañana");
        assert_eq!(store.get("habra-un-mañana").unwrap().actual_title, "¿Habrá un Mañana?");
        let text = fs::read_to_string(base.join("habra-un-mañana/habra-un-mañana_lyrics.txt")).unwrap();
        assert!(text.starts_with("¿Habrá un Mañana?\n"));
    }

    #[test]
    fn test_add_song_rejects_colliding_title() {
        let (_dir, base) = temp_archive();
        let mut store = MetadataStore::new();
        add_song(&base, &mut store, "Cafe").unwrap();

        let err = add_song(&base, &mut store, "Café").unwrap_err();

        assert!(err.is_collision());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_song_rejects_existing_folder() {
        let (_dir, base) = temp_archive();
        write_normalized_song(&base, "cafe", "Cafe");
        let mut store = MetadataStore::new();

        assert!(add_song(&base, &mut store, "Cafe").unwrap_err().is_collision());
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_song() {
        let mut store = store_with(&[("faro", "Faro")]);
        store.get_mut("faro").unwrap().tags.insert("old".into());

        let changed = update_song(
            &mut store,
            "faro",
            SongUpdate {
                title: Some("FARO".into()),
                status: Some(Status::Review),
                add_tags: vec!["live".into(), " ".into()],
                remove_tags: vec!["old".into()],
                add_notes: vec!["needs bridge".into()],
            },
        )
        .unwrap();

        assert!(changed);
        let record = store.get("faro").unwrap();
        assert_eq!(record.actual_title, "FARO");
        assert_eq!(record.status, Status::Review);
        assert_eq!(record.tags.iter().collect::<Vec<_>>(), vec!["live"]);
        assert_eq!(record.notes, vec!["needs bridge"]);

        assert!(!update_song(&mut store, "faro", SongUpdate::default()).unwrap());
    }

    #[test]
    fn test_update_song_rejects_key_changing_title() {
        let mut store = store_with(&[("faro", "Faro")]);

        let err = update_song(
            &mut store,
            "faro",
            SongUpdate {
                title: Some("Lighthouse".into()),
                ..Default::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err.root(), Error::InvalidTitle(_)));
        assert_eq!(store.get("faro").unwrap().actual_title, "Faro");
        assert!(matches!(
            update_song(&mut store, "nope", SongUpdate::default()),
            Err(Error::UnknownKey(_))
        ));
    }

    #[test]
    fn test_delete_song() {
        let (_dir, base) = temp_archive();
        write_normalized_song(&base, "gone", "Gone");
        let mut store = store_with(&[("gone", "Gone"), ("kept", "Kept")]);

        let removed = delete_song(&base, &mut store, "gone").unwrap();

        assert_eq!(removed.actual_title, "Gone");
        assert!(folder_names(&base).is_empty());
        assert_eq!(store.len(), 1);
        assert!(matches!(
            delete_song(&base, &mut store, "gone"),
            Err(Error::UnknownKey(_))
        ));
    }

    #[test]
    fn test_rename_song_moves_everything() {
        let (_dir, base) = temp_archive();
        write_normalized_song(&base, "old-title", "Old Title");
        fs::write(base.join("old-title/old-title_fr_lyrics.txt"), "Vieux Titre\n").unwrap();
        let mut store = store_with(&[("old-title", "Old Title")]);
        store.get_mut("old-title").unwrap().add_note("keep");

        let key = rename_song(&base, &mut store, "old-title", "New Title").unwrap();

        assert_eq!(key.as_str(), "new-title");
        assert_eq!(folder_names(&base), vec!["new-title"]);
        let text = fs::read_to_string(base.join("new-title/new-title_lyrics.txt")).unwrap();
        assert!(text.starts_with("New Title\n"));
        assert!(text.contains("First verse"));
        assert!(base.join("new-title/new-title_fr_lyrics.txt").exists());

        let record = store.get("new-title").unwrap();
        assert_eq!(record.actual_title, "New Title");
        assert_eq!(record.notes, vec!["keep"]);
        assert!(!store.contains("old-title"));
    }

    #[test]
    fn test_rename_song_same_key_updates_title_only() {
        let (_dir, base) = temp_archive();
        write_normalized_song(&base, "faro", "Faro");
        let mut store = store_with(&[("faro", "Faro")]);

        rename_song(&base, &mut store, "faro", "FARO!").unwrap();

        assert_eq!(folder_names(&base), vec!["faro"]);
        assert_eq!(store.get("faro").unwrap().actual_title, "FARO!");
        let text = fs::read_to_string(base.join("faro/faro_lyrics.txt")).unwrap();
        assert!(text.starts_with("FARO!\n"));
    }

    #[test]
    fn test_rename_song_collision_changes_nothing() {
        let (_dir, base) = temp_archive();
        write_normalized_song(&base, "a", "A");
        write_normalized_song(&base, "b", "B");
        let mut store = store_with(&[("a", "A"), ("b", "B")]);

        let err = rename_song(&base, &mut store, "a", "B").unwrap_err();

        assert!(err.is_collision());
        assert_eq!(folder_names(&base), vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap().actual_title, "A");
    }

    #[test]
    fn test_rename_song_folder_conflict_changes_nothing() {
        let (_dir, base) = temp_archive();
        write_normalized_song(&base, "a", "A");
        fs::create_dir(base.join("b")).unwrap();
        fs::write(base.join("b/notes.txt"), "unrelated").unwrap();
        let mut store = store_with(&[("a", "A")]);

        let err = rename_song(&base, &mut store, "a", "B").unwrap_err();

        assert!(err.is_conflict());
        assert!(store.contains("a"));
        assert!(base.join("a/a_lyrics.txt").exists());
    }

    #[test]
    fn test_rename_song_survives_next_reconcile() {
        let (_dir, base) = temp_archive();
        write_song(&base, "My Song", "My Song_lyrics.txt", "My Song\n\nverse\n");
        let mut store = MetadataStore::new();
        let options = ReconcileOptions::default();
        reconcile(&base, &mut store, &options).unwrap();
        update_song(
            &mut store,
            "my-song",
            SongUpdate {
                status: Some(Status::Released),
                add_tags: vec!["live".into()],
                ..Default::default()
            },
        )
        .unwrap();

        rename_song(&base, &mut store, "my-song", "Better Song").unwrap();
        let report = reconcile(&base, &mut store, &options).unwrap();

        assert!(report.is_noop(), "{report:?}");
        assert!(report.orphans.is_empty());
        assert_eq!(folder_names(&base), vec!["better-song"]);
        let text = fs::read_to_string(base.join("better-song/better-song_lyrics.txt")).unwrap();
        assert!(text.starts_with("Better Song\n"));
        let record = store.get("better-song").unwrap();
        assert_eq!(record.status, Status::Released);
        assert!(record.tags.contains("live"));
    }

    #[test]
    fn test_rename_song_lyrics_conflict_changes_nothing() {
        let (_dir, base) = temp_archive();
        write_song(&base, "a", "x_lyrics.txt", "A\n");
        write_song(&base, "a", "x_fr_lyrics.txt", "A fr\n");
        write_song(&base, "a", "a_fr_lyrics.txt", "Autre fr\n");
        let mut store = store_with(&[("a", "A")]);

        let err = rename_song(&base, &mut store, "a", "B").unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(folder_names(&base), vec!["a"]);
        assert!(base.join("a/x_lyrics.txt").exists());
        assert_eq!(store.get("a").unwrap().actual_title, "A");
        assert!(!store.contains("b"));
    }

    #[test]
    fn test_list_songs_filters() {
        let mut store = store_with(&[("a", "A"), ("b", "B"), ("c", "C")]);
        store.get_mut("b").unwrap().status = Status::Released;
        store.get_mut("c").unwrap().tags.insert("live".into());

        let all = list_songs(&store, &SongFilter::default());
        assert_eq!(all.len(), 3);

        let released = list_songs(
            &store,
            &SongFilter {
                status: Some(Status::Released),
                ..Default::default()
            },
        );
        assert_eq!(released[0].0.as_str(), "b");

        let live = list_songs(
            &store,
            &SongFilter {
                tag: Some("live".into()),
                ..Default::default()
            },
        );
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].1.actual_title, "C");
    }
}
