//! Normalization of raw playlist entries into song descriptors.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{RawMember, SongDescriptor};

/// Titles upstream uses for entries that can no longer be played
const UNAVAILABLE_TITLES: &[&str] = &["private video", "deleted video"];

/// Separators between artist and title, tried in order of position
const SEPARATORS: &[&str] = &[" - ", " – ", " — ", " -- ", " ~ ", " | "];

/// Fallback artist when the entry carries no channel name
const UNKNOWN_ARTIST: &str = "Unknown Artist";

fn noise_pattern() -> &'static Regex {
    static NOISE: OnceLock<Regex> = OnceLock::new();
    NOISE.get_or_init(|| {
        Regex::new(
            r"(?i)\s*[\(\[][^\)\]]*\b(official|lyrics?|audio|video|visuali[sz]er|hd|hq|4k|m/?v)\b[^\)\]]*[\)\]]",
        )
        .expect("noise pattern is valid")
    })
}

/// Deduplicate, filter and split raw playlist entries.
///
/// First occurrence of an id wins. Private and deleted entries are dropped.
/// Titles that cannot be split into artist and title keep the full title and
/// use the channel name as artist.
pub fn normalize_members(raw_members: &[RawMember]) -> Vec<SongDescriptor> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut songs = Vec::with_capacity(raw_members.len());

    for member in raw_members {
        if is_unavailable(&member.title) {
            continue;
        }
        if !seen.insert(member.id.as_str()) {
            continue;
        }

        let (artist, title) = split_artist_title(&member.title).unwrap_or_else(|| {
            let channel = member.channel.as_deref().unwrap_or(UNKNOWN_ARTIST);
            (channel.to_string(), member.title.clone())
        });

        songs.push(SongDescriptor {
            upstream_id: member.id.clone(),
            title: title.replace('/', "-"),
            artist: artist.replace(" - Topic", ""),
        });
    }

    songs
}

/// Best-effort split of "Artist - Title (Official Video)" style titles.
///
/// Returns `None` when no separator with text on both sides is found.
pub fn split_artist_title(full_title: &str) -> Option<(String, String)> {
    let cleaned = noise_pattern().replace_all(full_title, "");
    let cleaned = cleaned.trim();

    let (position, separator) = SEPARATORS
        .iter()
        .filter_map(|sep| cleaned.find(sep).map(|pos| (pos, *sep)))
        .min_by_key(|(pos, _)| *pos)?;

    let artist = cleaned[..position].trim();
    let title = cleaned[position + separator.len()..]
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();

    if artist.is_empty() || title.is_empty() {
        return None;
    }

    Some((artist.to_string(), title.to_string()))
}

fn is_unavailable(title: &str) -> bool {
    let normalized = title
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_lowercase();
    UNAVAILABLE_TITLES.contains(&normalized.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple() {
        assert_eq!(
            split_artist_title("Daft Punk - One More Time"),
            Some(("Daft Punk".to_string(), "One More Time".to_string()))
        );
    }

    #[test]
    fn test_split_strips_noise() {
        assert_eq!(
            split_artist_title("Rick Astley - Never Gonna Give You Up (Official Music Video)"),
            Some(("Rick Astley".to_string(), "Never Gonna Give You Up".to_string()))
        );
        assert_eq!(
            split_artist_title("Artist – Song [Lyrics]"),
            Some(("Artist".to_string(), "Song".to_string()))
        );
    }

    #[test]
    fn test_split_keeps_meaningful_brackets() {
        assert_eq!(
            split_artist_title("Artist - Song (Live at Wembley)"),
            Some(("Artist".to_string(), "Song (Live at Wembley)".to_string()))
        );
    }

    #[test]
    fn test_split_uses_earliest_separator() {
        assert_eq!(
            split_artist_title("A | B - C"),
            Some(("A".to_string(), "B - C".to_string()))
        );
    }

    #[test]
    fn test_split_fails_without_separator() {
        assert_eq!(split_artist_title("Just A Title"), None);
        assert_eq!(split_artist_title(" - Title"), None);
    }

    #[test]
    fn test_normalize_dedups_first_wins() {
        let raw = vec![
            RawMember::new("a", "X - First"),
            RawMember::new("b", "Y - Second"),
            RawMember::new("a", "Z - Duplicate"),
        ];

        let songs = normalize_members(&raw);
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].upstream_id, "a");
        assert_eq!(songs[0].title, "First");
        assert_eq!(songs[1].upstream_id, "b");
    }

    #[test]
    fn test_normalize_drops_unavailable() {
        let raw = vec![
            RawMember::new("a", "Private video"),
            RawMember::new("b", "[Deleted video]"),
            RawMember::new("c", "Artist - Song"),
        ];

        let songs = normalize_members(&raw);
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].upstream_id, "c");
    }

    #[test]
    fn test_normalize_falls_back_to_channel() {
        let raw = vec![RawMember::new("a", "Untitled Jam").with_channel("Some Band - Topic")];

        let songs = normalize_members(&raw);
        assert_eq!(songs[0].artist, "Some Band");
        assert_eq!(songs[0].title, "Untitled Jam");
    }

    #[test]
    fn test_normalize_without_channel() {
        let songs = normalize_members(&[RawMember::new("a", "Untitled Jam")]);
        assert_eq!(songs[0].artist, UNKNOWN_ARTIST);
    }

    #[test]
    fn test_normalize_replaces_slashes_in_title() {
        let songs = normalize_members(&[RawMember::new("a", "Artist - This/That")]);
        assert_eq!(songs[0].title, "This-That");
    }
}
