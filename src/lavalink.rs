//! [`PlaybackEngine`] backed by a Lavalink node, with songbird handling the
//! voice gateway handshake.

use std::sync::Arc;
use std::time::Duration;

use lavalink_rs::model::events::{self, Events};
use lavalink_rs::model::player::{ConnectionInfo, Equalizer, Filters, Rotation, Timescale};
use lavalink_rs::model::track::{TrackData, TrackLoadData};
use lavalink_rs::model::{GuildId as LavalinkGuildId, UserId as LavalinkUserId};
use lavalink_rs::node::NodeBuilder;
use lavalink_rs::player_context::PlayerContext;
use lavalink_rs::prelude::{LavalinkClient, NodeDistributionStrategy};
use lavalink_rs::hook;
use once_cell::sync::OnceCell;
use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::Songbird;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::LavalinkNode;
use crate::engine::{FilterSpec, PlaybackEngine, PlaybackEvent, SearchResult, TrackEndReason};
use crate::error::BoxError;
use crate::track::Track;

static EVENTS: OnceCell<mpsc::UnboundedSender<PlaybackEvent>> = OnceCell::new();

/// Hands out the receiving end of the backend event stream. Only the first
/// caller gets one.
pub fn subscribe() -> Option<mpsc::UnboundedReceiver<PlaybackEvent>> {
    let (tx, rx) = mpsc::unbounded_channel();
    EVENTS.set(tx).ok()?;
    Some(rx)
}

fn publish(event: PlaybackEvent) {
    if let Some(tx) = EVENTS.get() {
        let _ = tx.send(event);
    }
}

#[hook]
async fn track_start(_client: LavalinkClient, _session_id: String, event: &events::TrackStart) {
    publish(PlaybackEvent::TrackStarted {
        guild: GuildId::new(event.guild_id.0),
        track: to_track(event.track.clone()),
    });
}

#[hook]
async fn track_end(_client: LavalinkClient, _session_id: String, event: &events::TrackEnd) {
    let reason = match event.reason {
        events::TrackEndReason::Finished => TrackEndReason::Finished,
        events::TrackEndReason::Replaced => TrackEndReason::Replaced,
        events::TrackEndReason::LoadFailed => TrackEndReason::Error,
        events::TrackEndReason::Stopped | events::TrackEndReason::Cleanup => TrackEndReason::Stopped,
    };
    publish(PlaybackEvent::TrackEnded {
        guild: GuildId::new(event.guild_id.0),
        track: to_track(event.track.clone()),
        reason,
    });
}

#[hook]
async fn ready(_client: LavalinkClient, session_id: String, _event: &events::Ready) {
    info!(%session_id, "lavalink node ready");
}

fn lavalink_guild(guild: GuildId) -> LavalinkGuildId {
    LavalinkGuildId(guild.get())
}

fn to_track(data: TrackData) -> Track {
    let wire = serde_json::to_value(&data).unwrap_or(serde_json::Value::Null);
    let info = data.info;
    Track {
        title: info.title,
        author: info.author,
        length_ms: info.length,
        artwork_url: info.artwork_url,
        source: info.source_name,
        wire,
    }
}

fn to_filters(wanted: &FilterSpec) -> Filters {
    Filters {
        equalizer: (!wanted.equalizer.is_empty()).then(|| {
            wanted.equalizer
                .iter()
                .map(|b| Equalizer {
                    band: b.band,
                    gain: b.gain,
                })
                .collect()
        }),
        timescale: wanted.timescale.map(|t| Timescale {
            speed: Some(t.speed),
            pitch: Some(t.pitch),
            rate: Some(t.rate),
        }),
        rotation: wanted.rotation_hz.map(|hz| Rotation {
            rotation_hz: Some(hz),
        }),
        ..Default::default()
    }
}

pub struct LavalinkEngine {
    client: LavalinkClient,
    songbird: Arc<Songbird>,
}

impl LavalinkEngine {
    pub async fn connect_node(node: &LavalinkNode, bot: UserId, songbird: Arc<Songbird>) -> Self {
        let events = Events {
            ready: Some(ready),
            track_start: Some(track_start),
            track_end: Some(track_end),
            ..Default::default()
        };
        let nodes = vec![NodeBuilder {
            hostname: node.hostname.clone(),
            is_ssl: node.is_ssl,
            events: Events::default(),
            password: node.password.clone(),
            user_id: LavalinkUserId(bot.get()),
            session_id: None,
        }];
        let client =
            LavalinkClient::new(events, nodes, NodeDistributionStrategy::round_robin()).await;
        info!(hostname = %node.hostname, "lavalink client started");

        Self { client, songbird }
    }

    fn player(&self, guild: GuildId) -> Result<PlayerContext, BoxError> {
        self.client
            .get_player_context(lavalink_guild(guild))
            .ok_or_else(|| format!("no lavalink player for guild {}", guild).into())
    }
}

#[async_trait]
impl PlaybackEngine for LavalinkEngine {
    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<(), BoxError> {
        let (info, _call) = self.songbird.join_gateway(guild, channel).await?;
        let info = ConnectionInfo {
            endpoint: info.endpoint,
            token: info.token,
            session_id: info.session_id,
        };
        self.client
            .create_player_context(lavalink_guild(guild), info)
            .await?;
        debug!(guild_id = %guild, channel_id = %channel, "player created");
        Ok(())
    }

    async fn search(&self, guild: GuildId, query: &str) -> Result<SearchResult, BoxError> {
        let loaded = self.client.load_tracks(lavalink_guild(guild), query).await?;
        Ok(match loaded.data {
            Some(TrackLoadData::Track(track)) => SearchResult::Tracks(vec![to_track(track)]),
            Some(TrackLoadData::Search(tracks)) if !tracks.is_empty() => {
                SearchResult::Tracks(tracks.into_iter().map(to_track).collect())
            }
            Some(TrackLoadData::Playlist(playlist)) => {
                let artwork_url = playlist
                    .tracks
                    .first()
                    .and_then(|t| t.info.artwork_url.clone());
                SearchResult::Playlist {
                    name: playlist.info.name,
                    artwork_url,
                    tracks: playlist.tracks.into_iter().map(to_track).collect(),
                }
            }
            Some(TrackLoadData::Error(e)) => {
                return Err(format!("track load failed: {}", e.message).into())
            }
            _ => SearchResult::Empty,
        })
    }

    async fn play(&self, guild: GuildId, track: &Track, volume: u8) -> Result<(), BoxError> {
        let data: TrackData = serde_json::from_value(track.wire.clone())?;
        let player = self.player(guild)?;
        player.play_now(&data).await?;
        player.set_volume(volume as u16).await?;
        Ok(())
    }

    async fn pause(&self, guild: GuildId, paused: bool) -> Result<(), BoxError> {
        self.player(guild)?.set_pause(paused).await?;
        Ok(())
    }

    async fn stop(&self, guild: GuildId) -> Result<(), BoxError> {
        self.player(guild)?.stop_now().await?;
        Ok(())
    }

    async fn set_volume(&self, guild: GuildId, volume: u8) -> Result<(), BoxError> {
        self.player(guild)?.set_volume(volume as u16).await?;
        Ok(())
    }

    async fn set_filters(&self, guild: GuildId, filters: &FilterSpec) -> Result<(), BoxError> {
        self.player(guild)?.set_filters(to_filters(filters)).await?;
        Ok(())
    }

    async fn seek(&self, guild: GuildId, position_ms: u64) -> Result<(), BoxError> {
        self.player(guild)?
            .set_position(Duration::from_millis(position_ms))
            .await?;
        Ok(())
    }

    async fn position(&self, guild: GuildId) -> Result<u64, BoxError> {
        let player = self.player(guild)?.get_player().await?;
        Ok(player.state.position)
    }

    async fn disconnect(&self, guild: GuildId) -> Result<(), BoxError> {
        let lavalink = self.client.delete_player(lavalink_guild(guild)).await;
        let voice = self.songbird.remove(guild).await;
        lavalink?;
        voice?;
        Ok(())
    }
}
