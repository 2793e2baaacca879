//! Song listing and slug preview commands.

use crate::config::Settings;
use crate::library::{self, SongFilter};
use crate::model::Status;
use crate::slug::slugify;
use crate::store::StoreFile;

/// List songs in the metadata document
pub fn cmd_list(settings: &Settings, status: Option<&str>, tag: Option<&str>) -> anyhow::Result<()> {
    let store = StoreFile::new(&settings.metadata).load()?;
    let filter = SongFilter {
        status: status.map(Status::from),
        tag: tag.map(str::to_string),
    };

    let songs = library::list_songs(&store, &filter);
    for (key, record) in &songs {
        let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
        println!(
            "{:<32} {:<12} {}{}",
            key.as_str(),
            record.status.as_str(),
            record.actual_title,
            if tags.is_empty() {
                String::new()
            } else {
                format!("  [{}]", tags.join(", "))
            }
        );
    }
    println!("\n{} of {} songs", songs.len(), store.len());
    Ok(())
}

/// Print the key a title maps to
pub fn cmd_slug(title: &str) -> anyhow::Result<()> {
    println!("{}", slugify(title)?);
    Ok(())
}
