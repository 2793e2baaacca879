//! Title to song-key normalization.
//!
//! A [`SongKey`] is the identifier shared by a song folder, its metadata
//! record and its consolidated entry. Keys are produced by [`slugify`]:
//!
//! - lowercase, words joined by single hyphens
//! - accent marks on vowels fold to the plain vowel (`á` -> `a`, `ü` -> `u`)
//! - letters that are letters in their own right are kept (`ñ`, `ç`, `ß`,
//!   non-Latin scripts)
//! - any other punctuation or symbol is dropped (`¿`, `?`, `!`, `'`, `.`)
//!
//! ```ignore
//! assert_eq!(slugify("¿Habrá un Mañana?")?.as_str(), "habra-un-mañana");
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::error::{Error, Result};

/// Canonical identifier of a song.
///
/// Keys loaded from a hand-edited document may not be canonical; use
/// [`SongKey::is_canonical`] to check.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongKey(String);

impl SongKey {
    /// Wrap a key exactly as found (e.g. in a metadata document).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether slugifying this key returns it unchanged.
    pub fn is_canonical(&self) -> bool {
        slugify(&self.0).is_ok_and(|k| k == *self)
    }

    /// File name of the primary lyrics file for this key.
    pub fn lyrics_file_name(&self) -> String {
        format!("{}_lyrics.txt", self.0)
    }
}

impl fmt::Display for SongKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SongKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SongKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SongKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SongKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl FromStr for SongKey {
    type Err = Error;

    /// Parses a title or key into its canonical key.
    fn from_str(s: &str) -> Result<Self> {
        slugify(s)
    }
}

/// Map a human-readable title to its canonical key.
///
/// Fails with [`Error::InvalidTitle`] when nothing usable is left.
pub fn slugify(title: &str) -> Result<SongKey> {
    let lowered = title.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;
    // Marks after a kept consonant (n + tilde) belong to it; after a vowel they fold away
    let mut keep_marks = false;

    for c in lowered.nfd() {
        if is_combining_mark(c) {
            if keep_marks {
                out.push(c);
            }
            continue;
        }
        keep_marks = false;

        if is_separator(c) {
            pending_hyphen = true;
            continue;
        }
        if !c.is_alphanumeric() {
            continue;
        }

        if pending_hyphen && !out.is_empty() {
            out.push('-');
        }
        pending_hyphen = false;
        out.push(c);
        keep_marks = !is_vowel(c);
    }

    if out.is_empty() {
        return Err(Error::InvalidTitle(title.to_string()));
    }
    Ok(SongKey(out.nfc().collect()))
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '_' | '\u{2013}' | '\u{2014}')
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y' | 'æ' | 'ø' | 'œ')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(title: &str) -> String {
        slugify(title).unwrap().to_string()
    }

    #[test]
    fn test_basic_titles() {
        assert_eq!(key("My New Song"), "my-new-song");
        assert_eq!(key("Madre y Padre a la Vez"), "madre-y-padre-a-la-vez");
        assert_eq!(key("MiXeD CaSe"), "mixed-case");
    }

    #[test]
    fn test_spanish_title_keeps_enye() {
        assert_eq!(key("¿Habrá un Mañana?"), "habra-un-mañana");
        assert_eq!(key("Tatuajes del Corazón"), "tatuajes-del-corazon");
    }

    #[test]
    fn test_decomposed_input_matches_composed() {
        // "Mañana" with n + COMBINING TILDE, "á" as a + COMBINING ACUTE
        let decomposed = "Habra\u{0301} un Man\u{0303}ana";
        assert_eq!(key(decomposed), "habra-un-mañana");
    }

    #[test]
    fn test_vowel_accents_fold() {
        assert_eq!(key("Écoute-moi"), "ecoute-moi");
        assert_eq!(key("Über den Wolken"), "uber-den-wolken");
        assert_eq!(key("Ci Sarà un Domani?"), "ci-sara-un-domani");
    }

    #[test]
    fn test_stacked_vowel_marks_fold() {
        assert_eq!(key("\u{01FA}ngel"), "angel");
        assert_eq!(key("A\u{030A}\u{0301}ngel"), "angel");
        assert_eq!(key("\u{022A}"), "o");
        assert_eq!(key("Việt Nam"), "viet-nam");
    }

    #[test]
    fn test_marks_on_consonants_are_kept() {
        assert_eq!(key("Ça Ira"), "ça-ira");
        assert_eq!(key("c\u{0327}a ira"), "ça-ira");
        assert_eq!(key("Čaj"), "čaj");
        assert_eq!(key("नमस्ते"), "नमस्ते");
    }

    #[test]
    fn test_punctuation_is_removed_not_hyphenated() {
        assert_eq!(key("You'll always be my spark"), "youll-always-be-my-spark");
        assert_eq!(key("Song*With*Special*Chars"), "songwithspecialchars");
        assert_eq!(key("Under The Red Star. V2"), "under-the-red-star-v2");
        assert_eq!(key("Aura-t-il Demain ?"), "aura-t-il-demain");
    }

    #[test]
    fn test_separators_collapse() {
        assert_eq!(key("  Song  With   Multiple    Spaces "), "song-with-multiple-spaces");
        assert_eq!(key("a -- b __ c"), "a-b-c");
        assert_eq!(key("-leading and trailing-"), "leading-and-trailing");
        assert_eq!(key("Uno — Dos"), "uno-dos");
    }

    #[test]
    fn test_cafe_and_cafe_collide() {
        assert_eq!(slugify("Café").unwrap(), slugify("Cafe").unwrap());
    }

    #[test]
    fn test_non_latin_letters_are_kept() {
        assert_eq!(key("Ночь"), "ночь");
        assert_eq!(key("Straße 2"), "straße-2");
    }

    #[test]
    fn test_empty_titles_fail() {
        for title in ["", "   ", "\t\n", "¿?!", "--- ___"] {
            assert!(
                matches!(slugify(title), Err(Error::InvalidTitle(_))),
                "expected InvalidTitle for {title:?}"
            );
        }
    }

    #[test]
    fn test_canonical_detection() {
        assert!(SongKey::from_raw("madre-y-padre").is_canonical());
        assert!(SongKey::from_raw("habra-un-mañana").is_canonical());
        assert!(!SongKey::from_raw("Madre Y Padre").is_canonical());
        assert!(!SongKey::from_raw("trailing-").is_canonical());
        assert!(!SongKey::from_raw("").is_canonical());
    }

    #[test]
    fn test_lyrics_file_name() {
        let k = slugify("Faro y Reflejo").unwrap();
        assert_eq!(k.lyrics_file_name(), "faro-y-reflejo_lyrics.txt");
    }
}
