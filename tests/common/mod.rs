#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};

use stellara::dispatcher::{CommandDispatcher, Invocation};
use stellara::dj::Caller;
use stellara::engine::{FilterSpec, Notifier, PlaybackEngine, SearchResult};
use stellara::error::BoxError;
use stellara::registry::SessionRegistry;
use stellara::response::Response;
use stellara::selection::SearchSelectionCache;
use stellara::track::Track;
use stellara::volume::{VolumePreferenceStore, DEFAULT_VOLUME};

pub const GUILD: GuildId = GuildId::new(42);
pub const HOME: ChannelId = ChannelId::new(100);
pub const ELSEWHERE: ChannelId = ChannelId::new(101);
pub const VOICE: ChannelId = ChannelId::new(500);

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Connect(GuildId, ChannelId),
    Search(String),
    Play(GuildId, String, u8),
    Pause(GuildId, bool),
    Stop(GuildId),
    Volume(GuildId, u8),
    Filters(GuildId, FilterSpec),
    Seek(GuildId, u64),
    Disconnect(GuildId),
}

#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    results: Mutex<HashMap<String, SearchResult>>,
    pub fail_connect: AtomicBool,
    stuck_disconnect: Mutex<Option<GuildId>>,
}

impl FakeEngine {
    pub fn with_result(self, identifier: &str, result: SearchResult) -> Self {
        self.results.lock().insert(identifier.to_owned(), result);
        self
    }

    /// Disconnecting `guild` never completes.
    pub fn stuck_disconnect_for(self, guild: GuildId) -> Self {
        *self.stuck_disconnect.lock() = Some(guild);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn played(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Play(_, title, _) => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PlaybackEngine for FakeEngine {
    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<(), BoxError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err("voice gateway timed out".into());
        }
        self.record(Call::Connect(guild, channel));
        Ok(())
    }

    async fn search(&self, _guild: GuildId, query: &str) -> Result<SearchResult, BoxError> {
        self.record(Call::Search(query.to_owned()));
        Ok(self
            .results
            .lock()
            .get(query)
            .cloned()
            .unwrap_or(SearchResult::Empty))
    }

    async fn play(&self, guild: GuildId, track: &Track, volume: u8) -> Result<(), BoxError> {
        self.record(Call::Play(guild, track.title.clone(), volume));
        Ok(())
    }

    async fn pause(&self, guild: GuildId, paused: bool) -> Result<(), BoxError> {
        self.record(Call::Pause(guild, paused));
        Ok(())
    }

    async fn stop(&self, guild: GuildId) -> Result<(), BoxError> {
        self.record(Call::Stop(guild));
        Ok(())
    }

    async fn set_volume(&self, guild: GuildId, volume: u8) -> Result<(), BoxError> {
        self.record(Call::Volume(guild, volume));
        Ok(())
    }

    async fn set_filters(&self, guild: GuildId, filters: &FilterSpec) -> Result<(), BoxError> {
        self.record(Call::Filters(guild, filters.clone()));
        Ok(())
    }

    async fn seek(&self, guild: GuildId, position_ms: u64) -> Result<(), BoxError> {
        self.record(Call::Seek(guild, position_ms));
        Ok(())
    }

    async fn position(&self, _guild: GuildId) -> Result<u64, BoxError> {
        Ok(0)
    }

    async fn disconnect(&self, guild: GuildId) -> Result<(), BoxError> {
        self.record(Call::Disconnect(guild));
        let stuck = *self.stuck_disconnect.lock() == Some(guild);
        if stuck {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(ChannelId, Response)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(ChannelId, Response)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, channel: ChannelId, message: Response) -> Result<(), BoxError> {
        self.sent.lock().push((channel, message));
        Ok(())
    }
}

pub struct Harness {
    pub dispatcher: CommandDispatcher,
    pub registry: Arc<SessionRegistry>,
    pub selections: Arc<SearchSelectionCache>,
    pub engine: Arc<FakeEngine>,
    pub notifier: Arc<RecordingNotifier>,
    pub volume_path: PathBuf,
}

pub fn scratch_path(tag: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    std::env::temp_dir().join(format!(
        "stellara-{}-{}-{}.json",
        tag,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
}

pub fn harness(engine: FakeEngine) -> Harness {
    harness_with_volume_file(engine, scratch_path("volume"))
}

pub fn harness_with_volume_file(engine: FakeEngine, volume_path: PathBuf) -> Harness {
    let registry = Arc::new(SessionRegistry::new(true));
    let selections = Arc::new(SearchSelectionCache::new(Duration::from_secs(60)));
    let volumes = Arc::new(VolumePreferenceStore::load(&volume_path, DEFAULT_VOLUME));
    let engine = Arc::new(engine);
    let notifier = Arc::new(RecordingNotifier::default());

    let dispatcher = CommandDispatcher::new(
        registry.clone(),
        selections.clone(),
        volumes,
        engine.clone(),
        notifier.clone(),
    );

    Harness {
        dispatcher,
        registry,
        selections,
        engine,
        notifier,
        volume_path,
    }
}

pub fn track(title: &str) -> Track {
    Track::new(title, "artist", 200_000)
}

pub fn tracks(titles: &[&str]) -> Vec<Track> {
    titles.iter().map(|t| track(t)).collect()
}

pub fn member(user: u64) -> Invocation {
    Invocation {
        guild_id: Some(GUILD),
        channel_id: HOME,
        voice_channel: Some(VOICE),
        caller: Caller::new(UserId::new(user)),
    }
}

pub fn owner(user: u64) -> Invocation {
    let mut invocation = member(user);
    invocation.caller.is_guild_owner = true;
    invocation.caller.is_administrator = true;
    invocation
}

pub fn content(response: &Response) -> &str {
    response.content.as_deref().unwrap_or_default()
}

pub fn title(response: &Response) -> &str {
    response
        .embed
        .as_ref()
        .map(|e| e.title.as_str())
        .unwrap_or_default()
}
