//! Interactive song editor.
//!
//! A line-oriented loop over any `BufRead`/`Write` pair. Commands, song keys
//! and statuses can be abbreviated to any unique prefix (`ta hab +live`).
//! Every change is saved to the metadata document straight away.

use anyhow::bail;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::config::Settings;
use crate::library::{self, SongFilter, SongUpdate};
use crate::model::Status;
use crate::slug::SongKey;
use crate::store::{MetadataStore, StoreFile};

/// Command name and help line.
const COMMANDS: &[(&str, &str)] = &[
    ("list", "list [prefix]            list songs, optionally by key prefix"),
    ("show", "show <key>               show one song"),
    ("add", "add <title>              create a song folder and record"),
    ("tag", "tag <key> +tag -tag ...  add or remove tags"),
    ("note", "note <key> <text>        append a note"),
    ("status", "status <key> <status>    set the status"),
    ("rename", "rename <key> <title>     give a song a new title and key"),
    ("delete", "delete <key>             delete a song and its folder"),
    ("help", "help                     show this list"),
    ("quit", "quit                     leave the menu"),
];

/// Run the interactive menu on stdin/stdout
pub fn cmd_menu(settings: &Settings) -> anyhow::Result<()> {
    let file = StoreFile::new(&settings.metadata).with_backup(settings.keep_backups);
    let stdin = std::io::stdin();
    let mut menu = Menu::new(&settings.base_dir, file, stdin.lock(), std::io::stdout())?;
    menu.run()
}

enum Flow {
    Continue,
    Quit,
}

/// Outcome of matching user input against a set of names.
#[derive(Debug, PartialEq, Eq)]
enum PrefixMatch<'a> {
    One(&'a str),
    None,
    Many(Vec<&'a str>),
}

/// Exact match, else the only name starting with `input`.
fn match_prefix<'a>(input: &str, names: impl IntoIterator<Item = &'a str>) -> PrefixMatch<'a> {
    let candidates: Vec<&str> = names.into_iter().filter(|n| n.starts_with(input)).collect();
    if let Some(exact) = candidates.iter().find(|n| **n == input) {
        return PrefixMatch::One(*exact);
    }
    match candidates.as_slice() {
        [] => PrefixMatch::None,
        [one] => PrefixMatch::One(*one),
        _ => PrefixMatch::Many(candidates),
    }
}

/// First whitespace-separated word and the trimmed rest.
fn split_word(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    }
}

pub struct Menu<'a, R, W> {
    base: &'a Path,
    file: StoreFile,
    store: MetadataStore,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Menu<'a, R, W> {
    pub fn new(base: &'a Path, file: StoreFile, input: R, output: W) -> anyhow::Result<Self> {
        let store = file.load()?;
        Ok(Self {
            base,
            file,
            store,
            input,
            output,
        })
    }

    /// Read commands until `quit` or end of input.
    pub fn run(&mut self) -> anyhow::Result<()> {
        writeln!(
            self.output,
            "{} songs in {}. Type 'help' for commands.",
            self.store.len(),
            self.file.path().display()
        )?;

        loop {
            write!(self.output, "> ")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                break;
            };
            if line.is_empty() {
                continue;
            }
            match self.execute(&line) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => writeln!(self.output, "error: {e:#}")?,
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn execute(&mut self, line: &str) -> anyhow::Result<Flow> {
        let (word, rest) = split_word(line);
        let command = match match_prefix(word, COMMANDS.iter().map(|(name, _)| *name)) {
            PrefixMatch::One(name) => name,
            PrefixMatch::None => bail!("unknown command '{word}', try 'help'"),
            PrefixMatch::Many(names) => bail!("'{word}' could be {}", names.join(", ")),
        };

        match command {
            "list" => self.list(rest)?,
            "show" => self.show(rest)?,
            "add" => self.add(rest)?,
            "tag" => self.tag(rest)?,
            "note" => self.note(rest)?,
            "status" => self.status(rest)?,
            "rename" => self.rename(rest)?,
            "delete" => self.delete(rest)?,
            "help" => {
                for (_, help) in COMMANDS {
                    writeln!(self.output, "  {help}")?;
                }
            }
            _ => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn resolve_key(&self, input: &str) -> anyhow::Result<SongKey> {
        if input.is_empty() {
            bail!("missing song key");
        }
        match match_prefix(input, self.store.keys().map(SongKey::as_str)) {
            PrefixMatch::One(key) => Ok(SongKey::from_raw(key)),
            PrefixMatch::None => bail!("no song matches '{input}'"),
            PrefixMatch::Many(keys) => bail!("'{input}' could be {}", keys.join(", ")),
        }
    }

    fn save(&mut self) -> anyhow::Result<()> {
        self.file.save(&self.store)?;
        Ok(())
    }

    fn update(&mut self, key: &SongKey, update: SongUpdate) -> anyhow::Result<()> {
        if library::update_song(&mut self.store, key.as_str(), update)? {
            self.save()?;
            writeln!(self.output, "updated {key}")?;
        } else {
            writeln!(self.output, "no change")?;
        }
        Ok(())
    }

    fn list(&mut self, prefix: &str) -> anyhow::Result<()> {
        let songs = library::list_songs(&self.store, &SongFilter::default());
        for (key, record) in songs.iter().filter(|(k, _)| k.as_str().starts_with(prefix)) {
            writeln!(
                self.output,
                "  {:<32} {:<12} {}",
                key.as_str(),
                record.status.as_str(),
                record.actual_title
            )?;
        }
        Ok(())
    }

    fn show(&mut self, rest: &str) -> anyhow::Result<()> {
        let key = self.resolve_key(rest)?;
        let Some(record) = self.store.get(key.as_str()) else {
            bail!("no song '{key}'");
        };
        writeln!(self.output, "  key:    {key}")?;
        writeln!(self.output, "  title:  {}", record.actual_title)?;
        writeln!(self.output, "  status: {}", record.status)?;
        let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
        writeln!(self.output, "  tags:   {}", tags.join(", "))?;
        for note in &record.notes {
            writeln!(self.output, "  note:   {note}")?;
        }
        for field in record.extra.keys() {
            writeln!(self.output, "  ({field} kept as is)")?;
        }
        Ok(())
    }

    fn add(&mut self, title: &str) -> anyhow::Result<()> {
        if title.is_empty() {
            bail!("usage: add <title>");
        }
        let key = library::add_song(self.base, &mut self.store, title)?;
        self.save()?;
        writeln!(self.output, "added {key}")?;
        Ok(())
    }

    fn tag(&mut self, rest: &str) -> anyhow::Result<()> {
        let (key, tags) = split_word(rest);
        let key = self.resolve_key(key)?;
        if tags.is_empty() {
            bail!("usage: tag <key> +tag -tag ...");
        }

        let mut update = SongUpdate::default();
        for tag in tags.split_whitespace() {
            match tag.strip_prefix('-') {
                Some(removed) => update.remove_tags.push(removed.to_string()),
                None => update
                    .add_tags
                    .push(tag.strip_prefix('+').unwrap_or(tag).to_string()),
            }
        }
        self.update(&key, update)
    }

    fn note(&mut self, rest: &str) -> anyhow::Result<()> {
        let (key, text) = split_word(rest);
        let key = self.resolve_key(key)?;
        if text.is_empty() {
            bail!("usage: note <key> <text>");
        }
        self.update(
            &key,
            SongUpdate {
                add_notes: vec![text.to_string()],
                ..Default::default()
            },
        )
    }

    fn status(&mut self, rest: &str) -> anyhow::Result<()> {
        let (key, value) = split_word(rest);
        let key = self.resolve_key(key)?;
        let choices = Status::CHOICES;
        if value.is_empty() {
            let names: Vec<&str> = choices.iter().map(Status::as_str).collect();
            bail!("usage: status <key> <{}>", names.join("|"));
        }

        let status = match match_prefix(value, choices.iter().map(Status::as_str)) {
            PrefixMatch::One(name) => Status::from(name),
            // Anything else is a custom status
            PrefixMatch::None => Status::from(value),
            PrefixMatch::Many(names) => bail!("'{value}' could be {}", names.join(", ")),
        };
        self.update(
            &key,
            SongUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    fn rename(&mut self, rest: &str) -> anyhow::Result<()> {
        let (key, title) = split_word(rest);
        let key = self.resolve_key(key)?;
        if title.is_empty() {
            bail!("usage: rename <key> <new title>");
        }
        let new_key = library::rename_song(self.base, &mut self.store, key.as_str(), title)?;
        self.save()?;
        writeln!(self.output, "renamed {key} -> {new_key}")?;
        Ok(())
    }

    fn delete(&mut self, rest: &str) -> anyhow::Result<()> {
        let key = self.resolve_key(rest)?;
        let title = self
            .store
            .get(key.as_str())
            .map(|r| r.actual_title.clone())
            .unwrap_or_default();

        write!(self.output, "Delete '{title}' and its folder? [y/N] ")?;
        self.output.flush()?;
        let answer = self.read_line()?.unwrap_or_default();
        if !answer.eq_ignore_ascii_case("y") && !answer.eq_ignore_ascii_case("yes") {
            writeln!(self.output, "kept {key}")?;
            return Ok(());
        }

        library::delete_song(self.base, &mut self.store, key.as_str())?;
        self.save()?;
        writeln!(self.output, "deleted {key}")?;
        Ok(())
    }
}
