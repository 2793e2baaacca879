//! Consolidated lyrics database.
//!
//! Rebuilds `consolidated_songs.yml` from a fresh scan of the archive. The
//! document is derived data: it is regenerated wholesale on every run and
//! only written when its bytes would change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::atomic;
use crate::error::{Result, ResultExt};
use crate::model::{ConsolidatedSong, LyricsVariant};
use crate::scanner::{self, ScanEvent, ScannedSong};
use crate::slug::SongKey;

/// Consolidation settings.
#[derive(Debug, Clone, Default)]
pub struct ConsolidateOptions {
    /// Build the document and report, but write nothing
    pub dry_run: bool,
    /// Copy the previous document to `<output>.bak` before replacing it
    pub keep_backup: bool,
}

/// Two folders whose titles derive the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Duplicate {
    pub key: SongKey,
    /// Folder whose lyrics were kept
    pub kept: PathBuf,
    /// Folder that was left out
    pub skipped: PathBuf,
}

/// What a consolidation run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidateReport {
    /// Number of songs in the document
    pub songs: usize,
    /// Number of language variants across all songs
    pub variants: usize,
    pub duplicates: Vec<Duplicate>,
    /// Folders with no lyrics file
    pub skipped: Vec<PathBuf>,
    /// Folders that could not be read, with the reason
    pub errors: Vec<(PathBuf, String)>,
    /// Whether the output document was (re)written
    pub written: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConsolidatedDocument {
    songs: BTreeMap<SongKey, ConsolidatedSong>,
}

/// Scan `base_dir` and write the consolidated document to `output`.
pub fn consolidate(
    base_dir: &Path,
    output: &Path,
    options: &ConsolidateOptions,
) -> Result<ConsolidateReport> {
    let mut report = ConsolidateReport::default();
    let mut songs: BTreeMap<SongKey, ConsolidatedSong> = BTreeMap::new();
    let mut sources: BTreeMap<SongKey, PathBuf> = BTreeMap::new();

    for event in scanner::scan(base_dir)? {
        match event {
            ScanEvent::Song(song) => {
                if let Some(kept) = sources.get(&song.key) {
                    tracing::warn!(
                        target: "consolidator",
                        key = %song.key,
                        kept = %kept.display(),
                        skipped = %song.folder.display(),
                        "Duplicate key, keeping first folder"
                    );
                    report.duplicates.push(Duplicate {
                        key: song.key.clone(),
                        kept: kept.clone(),
                        skipped: song.folder,
                    });
                    continue;
                }
                sources.insert(song.key.clone(), song.folder.clone());
                let (key, entry) = to_entry(song);
                report.variants += entry.variants.len();
                songs.insert(key, entry);
            }
            ScanEvent::Skipped { folder, .. } => report.skipped.push(folder),
            ScanEvent::Error { folder, error } => report.errors.push((folder, error.to_string())),
        }
    }
    report.songs = songs.len();

    let rendered = render(songs)?;
    if options.dry_run {
        tracing::info!(target: "consolidator", songs = report.songs, "Dry run, not writing");
        return Ok(report);
    }

    let unchanged = match std::fs::read(output) {
        Ok(existing) => existing == rendered.as_bytes(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(e).with_context(format!("Failed to read {}", output.display())),
    };
    if unchanged {
        tracing::debug!(target: "consolidator", path = %output.display(), "Output unchanged");
        return Ok(report);
    }

    atomic::write_atomic(output, &rendered, options.keep_backup)?;
    report.written = true;
    tracing::info!(
        target: "consolidator",
        path = %output.display(),
        songs = report.songs,
        variants = report.variants,
        "Wrote consolidated lyrics"
    );
    Ok(report)
}

fn to_entry(song: ScannedSong) -> (SongKey, ConsolidatedSong) {
    let variants = song
        .variants
        .into_iter()
        .map(|v| {
            (
                v.lang,
                LyricsVariant {
                    title: v.title,
                    lyrics: v.body,
                },
            )
        })
        .collect();

    (
        song.key,
        ConsolidatedSong {
            title: song.title,
            lyrics: song.body,
            variants,
        },
    )
}

/// Serialize the document. Multi-line lyrics come out as block scalars.
fn render(songs: BTreeMap<SongKey, ConsolidatedSong>) -> Result<String> {
    Ok(serde_yaml::to_string(&ConsolidatedDocument { songs })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::backup_path;
    use crate::test_utils::{temp_archive, write_normalized_song, write_song};
    use std::fs;

    fn load(path: &Path) -> BTreeMap<SongKey, ConsolidatedSong> {
        let text = fs::read_to_string(path).unwrap();
        serde_yaml::from_str::<ConsolidatedDocument>(&text).unwrap().songs
    }

    #[test]
    fn test_consolidate_builds_document() {
        let (dir, base) = temp_archive();
        let output = dir.path().join("consolidated_songs.yml");
        write_song(&base, "habra-un-mañana", "habra-un-mañana_lyrics.txt", "¿Habrá un Mañana?\n\nPrimera línea\nSegunda línea\n");
        write_song(&base, "habra-un-mañana", "habra-un-mañana_fr_lyrics.txt", "Y Aura-t-il Demain?\n\nPremière ligne\n");
        write_normalized_song(&base, "faro-y-reflejo", "Faro y Reflejo");

        let report = consolidate(&base, &output, &ConsolidateOptions::default()).unwrap();

        assert_eq!(report.songs, 2);
        assert_eq!(report.variants, 1);
        assert!(report.written);

        let songs = load(&output);
        let keys: Vec<&str> = songs.keys().map(SongKey::as_str).collect();
        assert_eq!(keys, vec!["faro-y-reflejo", "habra-un-mañana"]);

        let song = &songs["habra-un-mañana"];
        assert_eq!(song.title, "¿Habrá un Mañana?");
        assert_eq!(song.lyrics, "Primera línea\nSegunda línea");
        assert_eq!(song.variants["fr"].title, "Y Aura-t-il Demain?");

        let raw = fs::read_to_string(&output).unwrap();
        assert!(raw.starts_with("songs:"));
        assert!(raw.contains("¿Habrá un Mañana?"));
        assert!(raw.contains("|-"), "multi-line lyrics should be a block scalar:\n{raw}");
    }

    #[test]
    fn test_second_run_does_not_rewrite() {
        let (dir, base) = temp_archive();
        let output = dir.path().join("out.yml");
        write_normalized_song(&base, "a", "A");

        assert!(consolidate(&base, &output, &ConsolidateOptions::default()).unwrap().written);
        let again = consolidate(&base, &output, &ConsolidateOptions::default()).unwrap();

        assert!(!again.written);
        assert_eq!(again.songs, 1);
    }

    #[test]
    fn test_duplicate_key_keeps_first_folder() {
        let (dir, base) = temp_archive();
        let output = dir.path().join("out.yml");
        write_song(&base, "Cafe", "cafe_lyrics.txt", "Cafe\n\nfirst\n");
        write_song(&base, "Café", "cafe_lyrics.txt", "Café\n\nsecond\n");

        let report = consolidate(&base, &output, &ConsolidateOptions::default()).unwrap();

        assert_eq!(report.songs, 1);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].key.as_str(), "cafe");
        assert!(report.duplicates[0].kept.ends_with("Cafe"));
        assert_eq!(load(&output)["cafe"].lyrics, "first");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (dir, base) = temp_archive();
        let output = dir.path().join("out.yml");
        write_normalized_song(&base, "a", "A");

        let report = consolidate(
            &base,
            &output,
            &ConsolidateOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(report.songs, 1);
        assert!(!report.written);
        assert!(!output.exists());
    }

    #[test]
    fn test_backup_on_change() {
        let (dir, base) = temp_archive();
        let output = dir.path().join("out.yml");
        let options = ConsolidateOptions {
            keep_backup: true,
            ..Default::default()
        };
        write_normalized_song(&base, "a", "A");
        consolidate(&base, &output, &options).unwrap();
        let first = fs::read_to_string(&output).unwrap();

        write_normalized_song(&base, "b", "B");
        consolidate(&base, &output, &options).unwrap();

        assert_eq!(fs::read_to_string(backup_path(&output)).unwrap(), first);
        assert_eq!(load(&output).len(), 2);
    }

    #[test]
    fn test_bad_folders_are_reported_not_fatal() {
        let (dir, base) = temp_archive();
        let output = dir.path().join("out.yml");
        write_normalized_song(&base, "good", "Good");
        write_song(&base, "bad", "bad_lyrics.txt", "?!\n");
        fs::create_dir(base.join("empty")).unwrap();

        let report = consolidate(&base, &output, &ConsolidateOptions::default()).unwrap();

        assert_eq!(report.songs, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_empty_archive_writes_empty_mapping() {
        let (dir, base) = temp_archive();
        let output = dir.path().join("out.yml");

        consolidate(&base, &output, &ConsolidateOptions::default()).unwrap();

        assert!(load(&output).is_empty());
    }
}
