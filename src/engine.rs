//! Seams to the voice/playback backend and the chat platform.

use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};

use crate::error::BoxError;
use crate::response::Response;
use crate::track::Track;

#[derive(Clone, Debug, PartialEq)]
pub enum SearchResult {
    Empty,
    Playlist {
        name: String,
        artwork_url: Option<String>,
        tracks: Vec<Track>,
    },
    Tracks(Vec<Track>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackEndReason {
    Finished,
    Stopped,
    Replaced,
    Error,
}

#[derive(Clone, Debug)]
pub enum PlaybackEvent {
    TrackStarted {
        guild: GuildId,
        track: Track,
    },
    TrackEnded {
        guild: GuildId,
        track: Track,
        reason: TrackEndReason,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EqBand {
    pub band: u8,
    pub gain: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timescale {
    pub speed: f64,
    pub pitch: f64,
    pub rate: f64,
}

/// Audio filters applied on top of the current track.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSpec {
    pub equalizer: Vec<EqBand>,
    pub timescale: Option<Timescale>,
    pub rotation_hz: Option<f64>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.equalizer.is_empty() && self.timescale.is_none() && self.rotation_hz.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boost {
    BassBoost,
    Nightcore,
    EightD,
    Clear,
}

impl Boost {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bassboost" => Some(Boost::BassBoost),
            "nightcore" => Some(Boost::Nightcore),
            "8d" => Some(Boost::EightD),
            "clear" => Some(Boost::Clear),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Boost::BassBoost => "Bass Boost",
            Boost::Nightcore => "Nightcore",
            Boost::EightD => "8D Audio",
            Boost::Clear => "Clear Filters",
        }
    }

    /// Layers this boost on top of `filters`. `Clear` resets everything.
    pub fn apply_to(self, mut filters: FilterSpec) -> FilterSpec {
        match self {
            Boost::BassBoost => {
                filters.equalizer = [(0, 0.6), (1, 0.5), (2, 0.3), (3, 0.1)]
                    .into_iter()
                    .map(|(band, gain)| EqBand { band, gain })
                    .collect();
            }
            Boost::Nightcore => {
                filters.timescale = Some(Timescale {
                    speed: 1.15,
                    pitch: 1.2,
                    rate: 1.0,
                });
            }
            Boost::EightD => filters.rotation_hz = Some(0.2),
            Boost::Clear => filters = FilterSpec::default(),
        }
        filters
    }
}

/// The voice/playback backend. Each call may suspend for a network round trip.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<(), BoxError>;
    async fn search(&self, guild: GuildId, query: &str) -> Result<SearchResult, BoxError>;
    async fn play(&self, guild: GuildId, track: &Track, volume: u8) -> Result<(), BoxError>;
    async fn pause(&self, guild: GuildId, paused: bool) -> Result<(), BoxError>;
    async fn stop(&self, guild: GuildId) -> Result<(), BoxError>;
    async fn set_volume(&self, guild: GuildId, volume: u8) -> Result<(), BoxError>;
    async fn set_filters(&self, guild: GuildId, filters: &FilterSpec) -> Result<(), BoxError>;
    async fn seek(&self, guild: GuildId, position_ms: u64) -> Result<(), BoxError>;
    async fn position(&self, guild: GuildId) -> Result<u64, BoxError>;
    async fn disconnect(&self, guild: GuildId) -> Result<(), BoxError>;
}

/// Posts unsolicited messages (now playing, inactivity notices) to a text channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel: ChannelId, message: Response) -> Result<(), BoxError>;
}
