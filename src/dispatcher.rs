//! Turns parsed commands and backend events into session operations.

use std::sync::Arc;

use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dj::{require_admin, require_dj, Caller};
use crate::engine::{Boost, Notifier, PlaybackEngine, PlaybackEvent, SearchResult};
use crate::error::{Error, Result};
use crate::query::search_identifier;
use crate::registry::{SessionHandle, SessionRegistry};
use crate::response::Response;
use crate::selection::SearchSelectionCache;
use crate::session::{LoopMode, PlayerSession};
use crate::track::{total_length, Track};
use crate::views;
use crate::volume::VolumePreferenceStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DjAction {
    Enable,
    Disable,
    Add,
    Remove,
}

impl DjAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "enable" => Some(DjAction::Enable),
            "disable" => Some(DjAction::Disable),
            "add" => Some(DjAction::Add),
            "remove" => Some(DjAction::Remove),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Play { query: String },
    Select { index: i64 },
    Pause,
    Resume,
    Stop,
    Skip,
    Queue,
    NowPlaying,
    Disconnect,
    Volume { value: i64 },
    Loop { mode: LoopMode },
    Shuffle,
    Remove { position: i64 },
    Clear,
    Seek { seconds: i64 },
    Dj { action: DjAction, user: Option<UserId> },
    Boost { filter: Boost },
    Help,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play { .. } => "play",
            Command::Select { .. } => "select",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Stop => "stop",
            Command::Skip => "skip",
            Command::Queue => "queue",
            Command::NowPlaying => "nowplaying",
            Command::Disconnect => "disconnect",
            Command::Volume { .. } => "volume",
            Command::Loop { .. } => "loop",
            Command::Shuffle => "shuffle",
            Command::Remove { .. } => "remove",
            Command::Clear => "clear",
            Command::Seek { .. } => "seek",
            Command::Dj { .. } => "dj",
            Command::Boost { .. } => "boost",
            Command::Help => "help",
        }
    }
}

/// Where a command came from and who sent it.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    /// The caller's current voice channel, if any.
    pub voice_channel: Option<ChannelId>,
    pub caller: Caller,
}

pub struct CommandDispatcher {
    registry: Arc<SessionRegistry>,
    selections: Arc<SearchSelectionCache>,
    volumes: Arc<VolumePreferenceStore>,
    engine: Arc<dyn PlaybackEngine>,
    notifier: Arc<dyn Notifier>,
}

impl CommandDispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        selections: Arc<SearchSelectionCache>,
        volumes: Arc<VolumePreferenceStore>,
        engine: Arc<dyn PlaybackEngine>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            selections,
            volumes,
            engine,
            notifier,
        }
    }

    /// Runs `command`. Failures come back as ephemeral responses.
    pub async fn dispatch(&self, invocation: &Invocation, command: Command) -> Response {
        let name = command.name();
        match self.execute(invocation, command).await {
            Ok(response) => response,
            Err(e) => {
                debug!(command = name, user = %invocation.caller.user_id, error = %e, "command rejected");
                e.into_response()
            }
        }
    }

    pub async fn execute(&self, inv: &Invocation, command: Command) -> Result<Response> {
        if command == Command::Help {
            return Ok(Response::embed(views::help()));
        }
        let guild = inv.guild_id.ok_or(Error::NotInGuild)?;
        let now = Instant::now();

        match command {
            Command::Play { query } => self.play(guild, inv, &query, now).await,
            Command::Select { index } => self.select(guild, inv, index, now).await,
            Command::Pause => self.pause(guild, inv, now).await,
            Command::Resume => self.resume(guild, inv, now).await,
            Command::Stop => self.stop(guild, inv, now).await,
            Command::Skip => self.skip(guild, inv, now).await,
            Command::Queue => self.show_queue(guild, now).await,
            Command::NowPlaying => self.now_playing(guild, now).await,
            Command::Disconnect => self.disconnect(guild, inv).await,
            Command::Volume { value } => self.volume(guild, inv, value, now).await,
            Command::Loop { mode } => self.set_loop(guild, inv, mode, now).await,
            Command::Shuffle => self.shuffle(guild, inv, now).await,
            Command::Remove { position } => self.remove(guild, inv, position, now).await,
            Command::Clear => self.clear(guild, inv, now).await,
            Command::Seek { seconds } => self.seek(guild, inv, seconds, now).await,
            Command::Dj { action, user } => self.dj(guild, inv, action, user, now).await,
            Command::Boost { filter } => self.boost(guild, inv, filter, now).await,
            Command::Help => Ok(Response::embed(views::help())),
        }
    }

    /// Applies a backend event to the guild's session.
    pub async fn handle_event(&self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::TrackStarted { guild, track } => {
                let Some(handle) = self.registry.get(guild) else {
                    return;
                };
                let (home, embed) = {
                    let mut session = handle.lock().await;
                    if session.is_disconnected() || !session.on_track_started(&track, Instant::now()) {
                        debug!(guild_id = %guild, title = %track.title, "ignoring stale track start");
                        return;
                    }
                    (session.home_channel(), views::now_playing(&session, &track, 0))
                };
                info!(guild_id = %guild, title = %track.title, "track started");

                if let Some(home) = home {
                    if let Err(e) = self.notifier.notify(home, Response::embed(embed)).await {
                        warn!(guild_id = %guild, error = %e, "could not post now playing");
                    }
                }
            }
            PlaybackEvent::TrackEnded {
                guild,
                track,
                reason,
            } => {
                let Some(handle) = self.registry.get(guild) else {
                    return;
                };
                let mut session = handle.lock().await;
                if session.is_disconnected() {
                    return;
                }
                debug!(guild_id = %guild, title = %track.title, ?reason, "track ended");

                if let Some(next) = session.on_track_end(reason) {
                    if let Err(e) = self.play_track(&mut session, next).await {
                        error!(guild_id = %guild, error = %e, "could not start next track");
                    }
                }
            }
        }
    }

    async fn play(&self, guild: GuildId, inv: &Invocation, query: &str, now: Instant) -> Result<Response> {
        let voice = inv.voice_channel.ok_or(Error::NotInVoiceChannel)?;
        let (handle, mut session) = self.acquire(guild).await;
        session.touch(now);
        session.bind_home(inv.channel_id)?;

        if !session.connected {
            self.connect(guild, voice, &handle, &mut session).await?;
        }

        let result = self
            .engine
            .search(guild, &search_identifier(query))
            .await
            .map_err(|e| Error::external("search", e))?;

        let response = match result {
            SearchResult::Empty => return Err(Error::NoResults),
            SearchResult::Playlist {
                name,
                artwork_url,
                tracks,
            } => {
                if tracks.is_empty() {
                    return Err(Error::NoResults);
                }
                let total = total_length(&tracks);
                let added = session.enqueue_all(tracks);
                views::playlist_added(&name, artwork_url.as_deref(), added, total)
            }
            SearchResult::Tracks(tracks) if tracks.len() > 1 => {
                let kept = self.selections.store(inv.caller.user_id, tracks.iter().cloned(), now);
                return Ok(Response::embed(views::search_results(&tracks[..kept])));
            }
            SearchResult::Tracks(mut tracks) => {
                let track = tracks.pop().ok_or(Error::NoResults)?;
                self.enqueue_one(&mut session, track)
            }
        };

        self.start_if_idle(&mut session).await?;
        Ok(Response::embed(response))
    }

    async fn select(&self, guild: GuildId, inv: &Invocation, index: i64, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;

        let track = self.selections.resolve(inv.caller.user_id, index, now)?;
        let embed = self.enqueue_one(&mut session, track);
        self.start_if_idle(&mut session).await?;
        Ok(Response::embed(embed))
    }

    async fn pause(&self, guild: GuildId, inv: &Invocation, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;
        session.pause()?;

        if let Err(e) = self.engine.pause(guild, true).await {
            session.resume()?;
            return Err(Error::external("pause", e));
        }
        Ok(Response::text("⏸️ Paused the current song."))
    }

    async fn resume(&self, guild: GuildId, inv: &Invocation, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;
        session.resume()?;

        if let Err(e) = self.engine.pause(guild, false).await {
            session.pause()?;
            return Err(Error::external("resume", e));
        }
        Ok(Response::text("▶️ Resumed the song."))
    }

    async fn stop(&self, guild: GuildId, inv: &Invocation, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;
        require_dj(&session, &inv.caller)?;

        session.stop();
        if session.is_playing() {
            self.engine
                .stop(guild)
                .await
                .map_err(|e| Error::external("stop", e))?;
        }
        Ok(Response::text("⏹️ Stopped the music and cleared the queue."))
    }

    async fn skip(&self, guild: GuildId, inv: &Invocation, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;
        let current = session.current().cloned().ok_or(Error::NothingPlaying)?;
        require_dj(&session, &inv.caller)?;

        self.engine
            .stop(guild)
            .await
            .map_err(|e| Error::external("skip", e))?;
        Ok(Response::embed(views::skipped(
            &current,
            session.queue().front(),
        )))
    }

    async fn show_queue(&self, guild: GuildId, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        if session.queue().is_empty() && !session.is_playing() {
            return Err(Error::QueueEmpty);
        }
        let position = self.position(&session).await;
        Ok(Response::embed(views::queue(&session, position)))
    }

    async fn now_playing(&self, guild: GuildId, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        let track = session.current().cloned().ok_or(Error::NothingPlaying)?;
        let position = self.position(&session).await;
        Ok(Response::embed(views::now_playing_detail(
            &session, &track, position,
        )))
    }

    async fn disconnect(&self, guild: GuildId, inv: &Invocation) -> Result<Response> {
        let handle = self.registry.get(guild).ok_or(Error::NoActiveSession)?;
        {
            let mut session = handle.lock().await;
            if session.is_disconnected() {
                return Err(Error::NoActiveSession);
            }
            session.check_home(inv.channel_id)?;
            require_dj(&session, &inv.caller)?;
            session.mark_disconnected();
            self.registry.remove_if_same(guild, &handle);
        }
        info!(guild_id = %guild, "disconnect requested");

        self.engine
            .disconnect(guild)
            .await
            .map_err(|e| Error::external("disconnect", e))?;
        Ok(Response::embed(views::disconnected()))
    }

    async fn volume(&self, guild: GuildId, inv: &Invocation, value: i64, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;
        let volume = u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .ok_or(Error::InvalidVolume(value))?;

        let volumes = self.volumes.clone();
        tokio::task::spawn_blocking(move || volumes.set(guild, volume))
            .await
            .map_err(|e| Error::external("volume store", e))?
            .map_err(|e| Error::external("volume store", e))?;

        self.engine
            .set_volume(guild, volume)
            .await
            .map_err(|e| Error::external("set volume", e))?;
        session.volume = volume;
        Ok(Response::embed(views::volume_changed(volume)))
    }

    async fn set_loop(&self, guild: GuildId, inv: &Invocation, mode: LoopMode, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;
        require_dj(&session, &inv.caller)?;

        session.set_loop(mode);
        let message = match mode {
            LoopMode::Track => "🔂 Enabled track loop mode! The current song will repeat.",
            LoopMode::Queue => "🔁 Enabled queue loop mode! The entire queue will repeat.",
            LoopMode::Off => "⏹️ Disabled all loop modes.",
        };
        Ok(Response::text(message))
    }

    async fn shuffle(&self, guild: GuildId, inv: &Invocation, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;
        if session.queue().is_empty() {
            return Err(Error::QueueEmpty);
        }
        require_dj(&session, &inv.caller)?;

        let count = session.shuffle(&mut rand::thread_rng());
        Ok(Response::embed(views::shuffled(count)))
    }

    async fn remove(&self, guild: GuildId, inv: &Invocation, position: i64, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;
        if session.queue().is_empty() {
            return Err(Error::QueueEmpty);
        }
        require_dj(&session, &inv.caller)?;

        let removed = session.remove(position)?;
        Ok(Response::embed(views::removed(&removed)))
    }

    async fn clear(&self, guild: GuildId, inv: &Invocation, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;
        if session.queue().is_empty() {
            return Err(Error::QueueEmpty);
        }
        require_dj(&session, &inv.caller)?;

        let count = session.clear();
        Ok(Response::embed(views::cleared(count)))
    }

    async fn seek(&self, guild: GuildId, inv: &Invocation, seconds: i64, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;
        let length = session
            .current()
            .map(|t| t.length_ms)
            .ok_or(Error::NothingPlaying)?;

        let position = u64::try_from(seconds)
            .ok()
            .and_then(|s| s.checked_mul(1000))
            .filter(|ms| *ms <= length)
            .ok_or(Error::InvalidSeekPosition {
                max_secs: length / 1000,
            })?;

        self.engine
            .seek(guild, position)
            .await
            .map_err(|e| Error::external("seek", e))?;
        Ok(Response::embed(views::seeked(position)))
    }

    async fn dj(
        &self,
        guild: GuildId,
        inv: &Invocation,
        action: DjAction,
        user: Option<UserId>,
        now: Instant,
    ) -> Result<Response> {
        require_admin(&inv.caller)?;
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);

        let message = match action {
            DjAction::Enable => {
                session.dj_required = true;
                "🎧 Enabled DJ mode. Only users with the DJ role can use certain commands.".to_owned()
            }
            DjAction::Disable => {
                session.dj_required = false;
                "🎧 Disabled DJ mode. All users can use all commands.".to_owned()
            }
            DjAction::Add => {
                let user = user.ok_or(Error::MissingUser)?;
                session.dj_members.insert(user);
                format!("🎧 Added <@{}> as a DJ.", user.get())
            }
            DjAction::Remove => {
                let user = user.ok_or(Error::MissingUser)?;
                if !session.dj_members.remove(&user) {
                    return Err(Error::NotADj(user));
                }
                format!("🎧 Removed <@{}> from DJs.", user.get())
            }
        };
        Ok(Response::text(message))
    }

    async fn boost(&self, guild: GuildId, inv: &Invocation, filter: Boost, now: Instant) -> Result<Response> {
        let mut session = self.lock_existing(guild).await?;
        session.touch(now);
        session.check_home(inv.channel_id)?;
        if !session.is_playing() {
            return Err(Error::NothingPlaying);
        }

        let filters = filter.apply_to(session.filters.clone());
        self.engine
            .set_filters(guild, &filters)
            .await
            .map_err(|e| Error::external("set filters", e))?;
        session.filters = filters;

        if filter == Boost::Clear {
            Ok(Response::text("🔄 Cleared all audio filters."))
        } else {
            Ok(Response::embed(views::filter_applied(filter)))
        }
    }

    /// Locks the guild's live session, creating one if there is none or the
    /// previous one was torn down while we waited for its lock.
    async fn acquire(&self, guild: GuildId) -> (SessionHandle, OwnedMutexGuard<PlayerSession>) {
        loop {
            let handle = self.registry.get_or_create(guild);
            let session = handle.clone().lock_owned().await;
            if !session.is_disconnected() {
                return (handle, session);
            }
            self.registry.remove_if_same(guild, &handle);
        }
    }

    async fn lock_existing(&self, guild: GuildId) -> Result<OwnedMutexGuard<PlayerSession>> {
        let handle = self.registry.get(guild).ok_or(Error::NoActiveSession)?;
        let session = handle.lock_owned().await;
        if session.is_disconnected() {
            return Err(Error::NoActiveSession);
        }
        Ok(session)
    }

    async fn connect(
        &self,
        guild: GuildId,
        voice: ChannelId,
        handle: &SessionHandle,
        session: &mut PlayerSession,
    ) -> Result<()> {
        if let Err(e) = self.engine.connect(guild, voice).await {
            session.mark_disconnected();
            self.registry.remove_if_same(guild, handle);
            return Err(Error::external("voice connect", e));
        }
        session.connected = true;
        session.volume = self.volumes.get(guild);
        info!(guild_id = %guild, channel_id = %voice, volume = session.volume, "joined voice");
        Ok(())
    }

    fn enqueue_one(&self, session: &mut PlayerSession, track: Track) -> crate::response::Embed {
        let was_playing = session.is_playing();
        session.enqueue(track.clone());
        let position = was_playing.then(|| session.queue().len());
        views::added_to_queue(&track, position)
    }

    async fn start_if_idle(&self, session: &mut PlayerSession) -> Result<()> {
        match session.start_next_if_idle() {
            Some(track) => self.play_track(session, track).await,
            None => Ok(()),
        }
    }

    async fn play_track(&self, session: &mut PlayerSession, track: Track) -> Result<()> {
        let guild = session.guild_id();
        if let Err(e) = self.engine.play(guild, &track, session.volume).await {
            session.clear_current();
            return Err(Error::external("play", e));
        }
        Ok(())
    }

    async fn position(&self, session: &PlayerSession) -> u64 {
        if !session.is_playing() {
            return 0;
        }
        match self.engine.position(session.guild_id()).await {
            Ok(ms) => ms,
            Err(e) => {
                warn!(guild_id = %session.guild_id(), error = %e, "could not read position");
                0
            }
        }
    }
}
