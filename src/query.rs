use once_cell::sync::Lazy;
use regex::Regex;

static SPOTIFY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://open\.spotify\.com/(?P<type>track|playlist|album)/(?P<id>[a-zA-Z0-9]+)")
        .unwrap()
});
static YOUTUBE_PLAYLIST_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/playlist\?list=(?P<id>[a-zA-Z0-9_-]+)")
        .unwrap()
});

const SEARCH_PREFIXES: [&str; 4] = ["ytsearch:", "ytmsearch:", "scsearch:", "spsearch:"];

/// Turns user input into a backend identifier: links pass through, Spotify
/// track links go through the Spotify search source, bare words search YouTube.
pub fn search_identifier(query: &str) -> String {
    let query = query.trim();

    if let Some(caps) = SPOTIFY_REGEX.captures(query) {
        return if &caps["type"] == "track" {
            format!("spsearch:{}", query)
        } else {
            query.to_string()
        };
    }

    if YOUTUBE_PLAYLIST_REGEX.is_match(query)
        || query.starts_with("http://")
        || query.starts_with("https://")
        || SEARCH_PREFIXES.iter().any(|p| query.starts_with(p))
    {
        return query.to_string();
    }

    format!("ytsearch:{}", query)
}
