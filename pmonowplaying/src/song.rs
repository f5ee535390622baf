//! Current song model and "Artist - Title" splitting
//!
//! Streaming servers usually report the playing track as one display string.
//! [`CurrentSong`] keeps that string and derives artist and title from it by
//! splitting on the **last** delimiter: artist names carry internal hyphens
//! far more often than titles do.

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Delimiter used by every supported server
pub const DEFAULT_DELIMITER: &str = "-";

/// Separator used when rebuilding the display text from its parts
const JOIN_SEPARATOR: &str = " - ";

/// Track currently on air
///
/// All fields are entity-decoded and trimmed of surrounding whitespace and
/// hyphens. An empty `text` means nothing is known about the track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentSong {
    /// Display string as reported (or rebuilt from artist and title)
    pub text: String,
    pub title: String,
    pub artist: String,
}

impl CurrentSong {
    /// Build a song from whatever the server reported
    ///
    /// - `text` empty but `title`/`artist` known: `text` becomes
    ///   `"artist - title"`, omitting an empty side.
    /// - `text` known but `title` or `artist` missing: both are derived by
    ///   splitting `text` on the last `delimiter`.
    pub fn new(text: &str, title: &str, artist: &str, delimiter: &str) -> Self {
        let mut text = clean_up(text);
        let mut title = clean_up(title);
        let mut artist = clean_up(artist);

        if text.is_empty() {
            if !title.is_empty() || !artist.is_empty() {
                text = join_parts(&artist, &title);
            }
        } else if title.is_empty() || artist.is_empty() {
            (artist, title) = split_text(&text, delimiter);
        }

        Self {
            text,
            title,
            artist,
        }
    }

    /// Build a song from a single display string using [`DEFAULT_DELIMITER`]
    pub fn from_text(text: &str) -> Self {
        Self::new(text, "", "", DEFAULT_DELIMITER)
    }

    /// Build a song from separately reported title and artist
    pub fn from_parts(title: &str, artist: &str) -> Self {
        Self::new("", title, artist, DEFAULT_DELIMITER)
    }

    /// True when nothing is known about the track
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Split a display string into `(artist, title)`
///
/// Splits on the last occurrence of `delimiter`. Without a delimiter the
/// whole string is the title and the artist is empty.
pub fn split_text(text: &str, delimiter: &str) -> (String, String) {
    if delimiter.is_empty() {
        return (String::new(), text.to_string());
    }

    match text.rsplit_once(delimiter) {
        Some((artist, title)) => (clean_up(artist), clean_up(title)),
        None => (String::new(), text.to_string()),
    }
}

/// Repair the SHOUTcast 2 habit of sending `" - "` as three spaces
pub fn repair_delimiter(raw: &str) -> String {
    raw.replace("   ", JOIN_SEPARATOR)
}

/// Decode entities and trim whitespace and hyphens from both ends
pub fn clean_up(value: &str) -> String {
    decode_entities(value)
        .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '\0')
        .to_string()
}

/// Decode HTML named and numeric character references
///
/// References are decoded one by one. A bare `&` or an unknown entity is
/// kept as written.
pub fn decode_entities(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }

    let mut decoded = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('&') {
        decoded.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match decode_reference(candidate) {
            Some((text, len)) => {
                decoded.push_str(&text);
                rest = &candidate[len..];
            }
            None => {
                decoded.push('&');
                rest = &candidate[1..];
            }
        }
    }
    decoded.push_str(rest);

    Cow::Owned(decoded)
}

/// Decode the reference at the start of `candidate` (`&name;`, `&#233;`,
/// `&#xE9;`), returning the text and the length consumed
pub(crate) fn decode_reference(candidate: &str) -> Option<(Cow<'_, str>, usize)> {
    let end = candidate.find(';')?;
    let name = candidate.get(1..end)?;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '#') {
        return None;
    }

    unescape_with(&candidate[..=end], resolve_html5_entity)
        .ok()
        .map(|text| (text, end + 1))
}

fn join_parts(artist: &str, title: &str) -> String {
    [artist, title]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(JOIN_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_artist_and_title() {
        let song = CurrentSong::from_text("Band Name - Song Title");
        assert_eq!(song.artist, "Band Name");
        assert_eq!(song.title, "Song Title");
        assert_eq!(song.text, "Band Name - Song Title");
    }

    #[test]
    fn test_no_delimiter_is_title_only() {
        let song = CurrentSong::from_text("Station Jingle");
        assert_eq!(song.title, "Station Jingle");
        assert_eq!(song.artist, "");
        assert_eq!(song.text, "Station Jingle");
    }

    #[test]
    fn test_splits_on_last_delimiter() {
        let song = CurrentSong::from_text("A-ha - Take On Me");
        assert_eq!(song.artist, "A-ha");
        assert_eq!(song.title, "Take On Me");

        let song = CurrentSong::from_text("Jay-Z - Kanye West - Otis");
        assert_eq!(song.artist, "Jay-Z - Kanye West");
        assert_eq!(song.title, "Otis");
    }

    #[test]
    fn test_spaced_delimiter() {
        let song = CurrentSong::new("Jean-Michel Jarre - Oxygene", "", "", " - ");
        assert_eq!(song.artist, "Jean-Michel Jarre");
        assert_eq!(song.title, "Oxygene");
    }

    #[test]
    fn test_triple_space_repair_matches_regular_delimiter() {
        let repaired = CurrentSong::from_text(&repair_delimiter("Artist   Title"));
        let regular = CurrentSong::from_text("Artist - Title");
        assert_eq!(repaired, regular);
    }

    #[test]
    fn test_text_from_parts() {
        let song = CurrentSong::from_parts("Song Title", "Band Name");
        assert_eq!(song.text, "Band Name - Song Title");

        let song = CurrentSong::from_parts("Song Title", "");
        assert_eq!(song.text, "Song Title");
        assert_eq!(song.title, "Song Title");

        let song = CurrentSong::from_parts("", "Band Name");
        assert_eq!(song.text, "Band Name");
        assert_eq!(song.artist, "Band Name");
    }

    #[test]
    fn test_known_parts_are_kept() {
        let song = CurrentSong::new("Whatever - Text", "Real Title", "Real Artist", "-");
        assert_eq!(song.title, "Real Title");
        assert_eq!(song.artist, "Real Artist");
        assert_eq!(song.text, "Whatever - Text");
    }

    #[test]
    fn test_cleans_entities_and_hyphens() {
        let song = CurrentSong::from_text("  - Simon &amp; Garfunkel - The Boxer -  ");
        assert_eq!(song.text, "Simon & Garfunkel - The Boxer");
        assert_eq!(song.artist, "Simon & Garfunkel");
        assert_eq!(song.title, "The Boxer");
    }

    #[test]
    fn test_bare_ampersand_survives() {
        let song = CurrentSong::from_text("Simon & Garfunkel - The Boxer");
        assert_eq!(song.artist, "Simon & Garfunkel");
    }

    #[test]
    fn test_mixed_bare_and_encoded_ampersands() {
        let song = CurrentSong::from_text("Tom & Jerry &amp; Co - Theme");
        assert_eq!(song.artist, "Tom & Jerry & Co");
        assert_eq!(song.title, "Theme");
    }

    #[test]
    fn test_html_named_entities() {
        let song = CurrentSong::from_text("Beyonc&eacute; - Halo");
        assert_eq!(song.artist, "Beyoncé");
        assert_eq!(song.text, "Beyoncé - Halo");

        let song = CurrentSong::from_parts("Caf&eacute;&nbsp;Society", "Sigur R&oacute;s");
        assert_eq!(song.title, "Café\u{a0}Society");
        assert_eq!(song.artist, "Sigur Rós");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("no entities"), "no entities");
        assert_eq!(decode_entities("&#233;&#xE9;"), "éé");
        assert_eq!(decode_entities("R&B; &notanentity; &#;"), "R&B; &notanentity; &#;");
        assert_eq!(decode_entities("&amp;eacute;"), "&eacute;");
        assert_eq!(decode_entities("trailing &"), "trailing &");
    }

    #[test]
    fn test_empty() {
        let song = CurrentSong::new("", "", "", DEFAULT_DELIMITER);
        assert!(song.is_empty());
        assert_eq!(song, CurrentSong::default());

        // A lone delimiter cleans up to nothing
        assert!(CurrentSong::from_text(" - ").is_empty());
    }
}
