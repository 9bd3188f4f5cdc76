//! Playlist id lists for batch synchronization.

/// Parse a newline-delimited list of playlist ids.
///
/// Blank lines are ignored and anything after a `#` is a comment.
pub fn parse_playlist_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
