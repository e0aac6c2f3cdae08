use std::fmt::Write;

const BAR: char = '▬';
const KNOB: char = '🔘';

/// A playable item as handed out by the search backend. Never mutated locally.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub title: String,
    pub author: String,
    pub length_ms: u64,
    pub artwork_url: Option<String>,
    pub source: String,
    /// Backend wire form, handed back verbatim when the track is played.
    pub wire: serde_json::Value,
}

impl Track {
    pub fn new(title: impl Into<String>, author: impl Into<String>, length_ms: u64) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            length_ms,
            artwork_url: None,
            source: String::from("unknown"),
            wire: serde_json::Value::Null,
        }
    }

    pub fn source_icon(&self) -> &'static str {
        if self.source.contains("youtube") {
            "🔴"
        } else if self.source.contains("spotify") {
            "💚"
        } else {
            "🎵"
        }
    }

    /// Whether `other` is the same backend item. Falls back to the metadata
    /// when either side carries no encoded form.
    pub fn same_item(&self, other: &Track) -> bool {
        match (encoded(&self.wire), encoded(&other.wire)) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.title == other.title
                    && self.author == other.author
                    && self.length_ms == other.length_ms
            }
        }
    }

    pub fn headline(&self) -> String {
        format!("**{}**\nby `{}`", self.title, self.author)
    }
}

fn encoded(wire: &serde_json::Value) -> Option<&str> {
    wire.get("encoded").and_then(serde_json::Value::as_str)
}

pub fn format_duration(milliseconds: u64) -> String {
    let total_seconds = milliseconds / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

pub fn progress_bar(current: u64, total: u64, length: usize) -> String {
    if total == 0 || length == 0 {
        return BAR.to_string().repeat(length);
    }

    let position = ((length as u64 * current / total) as usize).min(length - 1);
    let mut bar = String::with_capacity(length * 3 + 4);
    for i in 0..length {
        bar.push(if i == position { KNOB } else { BAR });
    }
    bar
}

/// `0:42 ▬▬🔘▬▬ 3:30`
pub fn timeline(position_ms: u64, length_ms: u64) -> String {
    let mut out = format_duration(position_ms);
    let _ = write!(
        out,
        " {} {}",
        progress_bar(position_ms, length_ms, 15),
        format_duration(length_ms)
    );
    out
}

pub fn total_length<'a>(tracks: impl IntoIterator<Item = &'a Track>) -> u64 {
    tracks.into_iter().map(|t| t.length_ms).sum()
}
