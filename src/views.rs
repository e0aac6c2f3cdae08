//! Embeds shown to users.

use crate::engine::Boost;
use crate::response::{Embed, COLOR_BLUE, COLOR_BLURPLE, COLOR_GREEN, COLOR_PURPLE, COLOR_RED};
use crate::session::{LoopMode, PlayerSession};
use crate::track::{format_duration, progress_bar, timeline, total_length, Track};

const QUEUE_PAGE: usize = 10;

fn loop_label(mode: LoopMode) -> Option<&'static str> {
    match mode {
        LoopMode::Track => Some("🔂 Track loop enabled"),
        LoopMode::Queue => Some("🔁 Queue loop enabled"),
        LoopMode::Off => None,
    }
}

pub fn now_playing(session: &PlayerSession, track: &Track, position_ms: u64) -> Embed {
    let mut embed = Embed::new("Now Playing 🎶", COLOR_BLURPLE)
        .description(track.headline())
        .image(track.artwork_url.as_deref())
        .field("Duration", format_duration(track.length_ms), true)
        .field("Progress", timeline(position_ms, track.length_ms), false)
        .field(
            "Source",
            format!("{} {}", track.source_icon(), track.source),
            true,
        );
    if let Some(label) = loop_label(session.loop_mode()) {
        embed = embed.field("Loop", label, true);
    }
    embed
}

pub fn now_playing_detail(session: &PlayerSession, track: &Track, position_ms: u64) -> Embed {
    now_playing(session, track, position_ms).field("Volume", format!("🔊 {}%", session.volume), true)
}

pub fn added_to_queue(track: &Track, position: Option<usize>) -> Embed {
    let position = match position {
        Some(n) => format!("#{}", n),
        None => "Next".to_owned(),
    };
    Embed::new("Added to Queue 🎵", COLOR_GREEN)
        .description(track.headline())
        .thumbnail(track.artwork_url.as_deref())
        .field("Duration", format_duration(track.length_ms), true)
        .field("Position", position, true)
}

pub fn playlist_added(name: &str, artwork_url: Option<&str>, added: usize, total_ms: u64) -> Embed {
    Embed::new("Added Playlist to Queue 📑", COLOR_GREEN)
        .description(format!("**{}**", name))
        .thumbnail(artwork_url)
        .field("Tracks Added", format!("{} songs", added), true)
        .field("Total Duration", format_duration(total_ms), true)
}

pub fn search_results(tracks: &[Track]) -> Embed {
    let mut embed = Embed::new("Search Results 🔍", COLOR_BLUE)
        .description(
            "Please select a track to play by using the `/select` command with the track number.",
        )
        .footer("Use '/select <number>' to choose a track • Results will expire in 60 seconds");
    for (i, track) in tracks.iter().enumerate() {
        embed = embed.field(
            format!("{}. {}", i + 1, track.title),
            format!(
                "by `{}` • Duration: `{}`",
                track.author,
                format_duration(track.length_ms)
            ),
            false,
        );
    }
    embed
}

pub fn skipped(track: &Track, next: Option<&Track>) -> Embed {
    let embed = Embed::new("⏭️ Skipped Track", COLOR_BLUE).description(track.headline());
    match next {
        Some(next) => embed.field("Up Next", next.headline(), true),
        None => embed.field("Queue Status", "No more tracks in queue", true),
    }
}

pub fn queue(session: &PlayerSession, position_ms: u64) -> Embed {
    let mut embed = Embed::new("🎶 Music Queue", COLOR_BLUE);

    if let Some(label) = loop_label(session.loop_mode()) {
        embed = embed.field("Queue Status", label, false);
    }

    if let Some(current) = session.current() {
        embed = embed
            .field(
                "Currently Playing",
                format!(
                    "{}\n{}",
                    current.headline(),
                    timeline(position_ms, current.length_ms)
                ),
                false,
            )
            .thumbnail(current.artwork_url.as_deref());
    }

    let pending = session.queue();
    if pending.is_empty() {
        return embed.field("Up Next", "No more tracks in queue", false);
    }

    let mut listing = String::new();
    for (i, track) in pending.iter().take(QUEUE_PAGE).enumerate() {
        listing.push_str(&format!(
            "`{}.` **{}** - `{}` • `{}`\n",
            i + 1,
            track.title,
            track.author,
            format_duration(track.length_ms)
        ));
    }
    if pending.len() > QUEUE_PAGE {
        listing.push_str(&format!(
            "\n... and {} more tracks",
            pending.len() - QUEUE_PAGE
        ));
    }

    embed.field("Up Next", listing, false).field(
        "Queue Summary",
        format!(
            "**{}** tracks • Total duration: **{}**",
            pending.len(),
            format_duration(total_length(pending))
        ),
        false,
    )
}

pub fn volume_changed(volume: u8) -> Embed {
    Embed::new("Volume Changed 🔊", COLOR_BLUE).description(format!(
        "Set volume to **{}%**\n{}",
        volume,
        progress_bar(volume as u64, 100, 10)
    ))
}

pub fn removed(track: &Track) -> Embed {
    Embed::new("Track Removed ❌", COLOR_RED).description(format!(
        "Removed **{}**\nby `{}` from the queue.",
        track.title, track.author
    ))
}

pub fn cleared(count: usize) -> Embed {
    Embed::new("Queue Cleared 🧹", COLOR_RED)
        .description(format!("Cleared {} tracks from the queue.", count))
}

pub fn shuffled(count: usize) -> Embed {
    Embed::new("Queue Shuffled 🔀", COLOR_GREEN)
        .description(format!("Shuffled {} tracks in the queue.", count))
}

pub fn seeked(position_ms: u64) -> Embed {
    Embed::new("Position Changed ⏩", COLOR_BLUE).description(format!(
        "Seeking to position `{}` in the current track.",
        format_duration(position_ms)
    ))
}

pub fn disconnected() -> Embed {
    Embed::new("Disconnected 👋", COLOR_RED)
        .description("Successfully disconnected from the voice channel.")
}

pub fn filter_applied(boost: Boost) -> Embed {
    Embed::new("Filter Applied 🎛️", COLOR_PURPLE).description(format!(
        "Applied the **{}** filter to the player.",
        boost.label()
    ))
}

pub fn help() -> Embed {
    Embed::new("🎵 Stellara Music Bot Commands", COLOR_BLURPLE)
        .description("Here are all the available commands for the music bot:")
        .field(
            "🎶 Playback Commands",
            "`/play <query>` - Play a song with the given query (supports YouTube/Spotify links)\n\
             `/pause` - Pause the currently playing song\n\
             `/resume` - Resume the paused song\n\
             `/stop` - Stop the music and clear the queue\n\
             `/skip` - Skip the current song\n\
             `/seek <position>` - Jump to a specific position in the current track",
            false,
        )
        .field(
            "📋 Queue Commands",
            "`/queue` - Show the current music queue\n\
             `/nowplaying` - Show details about the currently playing track\n\
             `/clear` - Clear the entire queue\n\
             `/remove <position>` - Remove a specific track from the queue\n\
             `/shuffle` - Shuffle the tracks in the queue\n\
             `/loop <mode>` - Set loop mode (track, queue, or off)",
            false,
        )
        .field(
            "🔍 Search Commands",
            "`/select <number>` - Select a track from search results",
            false,
        )
        .field(
            "🔊 Audio Controls",
            "`/volume <value>` - Change the volume of the player (0-100)\n\
             `/boost <filter>` - Apply audio filters (bassboost, nightcore, 8d, clear)",
            false,
        )
        .field(
            "🛠️ Other Commands",
            "`/disconnect` - Disconnect the bot from the voice channel\n\
             `/dj <action>` - Manage DJ mode and permissions",
            false,
        )
        .footer("Bot automatically disconnects after 5 minutes of inactivity")
}

pub fn inactivity_notice() -> &'static str {
    "🔌 Disconnected due to inactivity."
}
