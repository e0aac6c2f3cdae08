//! Per-guild playback bookkeeping.
//!
//! The session never talks to the playback backend itself. Operations that
//! would start audio return the [`Track`] the caller should hand to the engine.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::time::Instant;

use crate::engine::{FilterSpec, TrackEndReason};
use crate::error::{Error, Result};
use crate::track::Track;
use crate::volume::DEFAULT_VOLUME;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl LoopMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "track" => Some(LoopMode::Track),
            "queue" => Some(LoopMode::Queue),
            "off" => Some(LoopMode::Off),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHome,
    Bound,
    Playing,
    Paused,
    Disconnected,
}

#[derive(Debug)]
pub struct PlayerSession {
    guild_id: GuildId,
    home_channel: Option<ChannelId>,
    queue: VecDeque<Track>,
    current: Option<Track>,
    loop_mode: LoopMode,
    pub dj_required: bool,
    pub dj_members: HashSet<UserId>,
    last_interaction: Instant,
    pub volume: u8,
    paused: bool,
    pub connected: bool,
    pub filters: FilterSpec,
    disconnected: bool,
}

impl PlayerSession {
    pub fn new(guild_id: GuildId, dj_required: bool, now: Instant) -> Self {
        Self {
            guild_id,
            home_channel: None,
            queue: VecDeque::new(),
            current: None,
            loop_mode: LoopMode::Off,
            dj_required,
            dj_members: HashSet::new(),
            last_interaction: now,
            volume: DEFAULT_VOLUME,
            paused: false,
            connected: false,
            filters: FilterSpec::default(),
            disconnected: false,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn home_channel(&self) -> Option<ChannelId> {
        self.home_channel
    }

    pub fn queue(&self) -> &VecDeque<Track> {
        &self.queue
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn loop_track(&self) -> bool {
        self.loop_mode == LoopMode::Track
    }

    pub fn loop_queue(&self) -> bool {
        self.loop_mode == LoopMode::Queue
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn last_interaction(&self) -> Instant {
        self.last_interaction
    }

    pub fn state(&self) -> SessionState {
        if self.disconnected {
            SessionState::Disconnected
        } else if self.home_channel.is_none() {
            SessionState::AwaitingHome
        } else if self.current.is_none() {
            SessionState::Bound
        } else if self.paused {
            SessionState::Paused
        } else {
            SessionState::Playing
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_interaction = now;
    }

    /// Binds the session to `channel` on first use; afterwards only that channel is accepted.
    pub fn bind_home(&mut self, channel: ChannelId) -> Result<()> {
        match self.home_channel {
            None => {
                self.home_channel = Some(channel);
                Ok(())
            }
            Some(home) if home == channel => Ok(()),
            Some(home) => Err(Error::WrongChannel { home }),
        }
    }

    /// Rejects `channel` if the session is bound elsewhere, without binding it.
    pub fn check_home(&self, channel: ChannelId) -> Result<()> {
        match self.home_channel {
            Some(home) if home != channel => Err(Error::WrongChannel { home }),
            _ => Ok(()),
        }
    }

    pub fn enqueue(&mut self, track: Track) -> usize {
        self.queue.push_back(track);
        1
    }

    pub fn enqueue_all(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let before = self.queue.len();
        self.queue.extend(tracks);
        self.queue.len() - before
    }

    /// Pops the next track if nothing is playing. The returned track is now current.
    pub fn start_next_if_idle(&mut self) -> Option<Track> {
        if self.disconnected || self.current.is_some() {
            return None;
        }
        let next = self.queue.pop_front()?;
        self.paused = false;
        self.current = Some(next.clone());
        Some(next)
    }

    /// Forgets the current track, e.g. when the backend refused to play it.
    pub fn clear_current(&mut self) -> Option<Track> {
        self.paused = false;
        self.current.take()
    }

    /// Acknowledges a backend start. A start for anything other than the
    /// current track is stale and ignored.
    pub fn on_track_started(&mut self, track: &Track, now: Instant) -> bool {
        match &self.current {
            Some(current) if current.same_item(track) => {
                self.paused = false;
                self.touch(now);
                true
            }
            _ => false,
        }
    }

    /// Applies loop rules to a finished track and returns what should play next.
    pub fn on_track_end(&mut self, reason: TrackEndReason) -> Option<Track> {
        if reason == TrackEndReason::Replaced {
            return self.start_next_if_idle();
        }

        let ended = self.current.take();
        self.paused = false;

        if reason == TrackEndReason::Finished {
            match (self.loop_mode, ended) {
                (LoopMode::Track, Some(track)) => {
                    self.current = Some(track.clone());
                    return Some(track);
                }
                (LoopMode::Queue, Some(track)) => {
                    self.queue.push_back(track);
                }
                _ => {}
            }
        }

        self.start_next_if_idle()
    }

    pub fn set_loop(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Err(Error::NothingPlaying);
        }
        if self.paused {
            return Err(Error::AlreadyPaused);
        }
        self.paused = true;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if !self.paused {
            return Err(Error::NotPaused);
        }
        self.paused = false;
        Ok(())
    }

    /// Removes the track at 1-based `position`, keeping the others in order.
    pub fn remove(&mut self, position: i64) -> Result<Track> {
        let len = self.queue.len();
        if len == 0 {
            return Err(Error::QueueEmpty);
        }
        let index = usize::try_from(position)
            .ok()
            .filter(|p| (1..=len).contains(p))
            .ok_or(Error::IndexOutOfRange {
                index: position,
                len,
            })?;
        self.queue.remove(index - 1).ok_or(Error::QueueEmpty)
    }

    pub fn clear(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        n
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        self.queue.make_contiguous().shuffle(rng);
        self.queue.len()
    }

    /// Drops pending tracks and loop mode ahead of a backend stop.
    pub fn stop(&mut self) {
        self.queue.clear();
        self.loop_mode = LoopMode::Off;
    }

    pub fn mark_disconnected(&mut self) {
        self.disconnected = true;
        self.connected = false;
        self.current = None;
        self.paused = false;
    }

    /// Idle means no interaction for longer than `timeout` and no audible track.
    /// A paused track does not keep the session alive.
    pub fn is_idle_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        let audible = self.current.is_some() && !self.paused;
        !audible && now.saturating_duration_since(self.last_interaction) > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(300);

    fn session() -> PlayerSession {
        PlayerSession::new(GuildId::new(42), true, Instant::now())
    }

    fn tracks(names: &[&str]) -> Vec<Track> {
        names.iter().map(|n| Track::new(*n, "artist", 180_000)).collect()
    }

    #[test]
    fn bind_home_is_sticky() {
        let mut s = session();
        assert_eq!(s.state(), SessionState::AwaitingHome);
        s.bind_home(ChannelId::new(1)).unwrap();
        s.bind_home(ChannelId::new(1)).unwrap();
        assert!(matches!(
            s.bind_home(ChannelId::new(2)),
            Err(Error::WrongChannel { home }) if home == ChannelId::new(1)
        ));
        assert_eq!(s.home_channel(), Some(ChannelId::new(1)));
        assert_eq!(s.state(), SessionState::Bound);
    }

    #[test]
    fn enqueue_three_plays_first() {
        let mut s = session();
        s.bind_home(ChannelId::new(1)).unwrap();
        assert_eq!(s.enqueue_all(tracks(&["a", "b", "c"])), 3);

        let first = s.start_next_if_idle().unwrap();
        assert_eq!(first.title, "a");
        assert_eq!(s.queue().len(), 2);
        assert_eq!(s.state(), SessionState::Playing);
        assert!(s.start_next_if_idle().is_none());
    }

    #[test]
    fn loop_track_replays_on_finish() {
        let mut s = session();
        s.enqueue_all(tracks(&["a", "b"]));
        s.start_next_if_idle();
        s.set_loop(LoopMode::Track);

        let next = s.on_track_end(TrackEndReason::Finished).unwrap();
        assert_eq!(next.title, "a");
        assert_eq!(s.current().map(|t| t.title.as_str()), Some("a"));
        assert_eq!(s.queue().len(), 1);
    }

    #[test]
    fn loop_track_does_not_replay_when_stopped() {
        let mut s = session();
        s.enqueue_all(tracks(&["a", "b"]));
        s.start_next_if_idle();
        s.set_loop(LoopMode::Track);

        let next = s.on_track_end(TrackEndReason::Stopped).unwrap();
        assert_eq!(next.title, "b");
    }

    #[test]
    fn loop_queue_requeues_finished_track() {
        let mut s = session();
        s.enqueue_all(tracks(&["a", "b"]));
        s.start_next_if_idle();
        s.set_loop(LoopMode::Queue);

        let next = s.on_track_end(TrackEndReason::Finished).unwrap();
        assert_eq!(next.title, "b");
        let titles: Vec<_> = s.queue().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["a"]);
    }

    #[test]
    fn replaced_does_not_advance() {
        let mut s = session();
        s.enqueue_all(tracks(&["a", "b"]));
        s.start_next_if_idle();
        assert!(s.on_track_end(TrackEndReason::Replaced).is_none());
        assert_eq!(s.current().map(|t| t.title.as_str()), Some("a"));
        assert_eq!(s.queue().len(), 1);
    }

    #[test]
    fn late_start_does_not_revive_ended_track() {
        let mut s = session();
        s.enqueue_all(tracks(&["a"]));
        let a = s.start_next_if_idle().unwrap();
        assert!(s.on_track_end(TrackEndReason::Error).is_none());

        assert!(!s.on_track_started(&a, Instant::now()));
        assert!(s.current().is_none());
        s.enqueue_all(tracks(&["b"]));
        assert_eq!(s.start_next_if_idle().unwrap().title, "b");
    }

    #[test]
    fn start_for_current_track_is_accepted() {
        let mut s = session();
        s.enqueue_all(tracks(&["a", "b"]));
        let a = s.start_next_if_idle().unwrap();
        assert!(!s.on_track_started(&Track::new("b", "artist", 180_000), Instant::now()));
        assert!(s.on_track_started(&a, Instant::now()));
        assert_eq!(s.current().map(|t| t.title.as_str()), Some("a"));
    }

    #[test]
    fn track_end_with_empty_queue_goes_idle() {
        let mut s = session();
        s.bind_home(ChannelId::new(1)).unwrap();
        s.enqueue_all(tracks(&["a"]));
        s.start_next_if_idle();
        assert!(s.on_track_end(TrackEndReason::Finished).is_none());
        assert_eq!(s.state(), SessionState::Bound);
    }

    #[test]
    fn loop_modes_are_exclusive() {
        let mut s = session();
        for mode in [LoopMode::Track, LoopMode::Queue, LoopMode::Off, LoopMode::Track] {
            s.set_loop(mode);
            assert!(!(s.loop_track() && s.loop_queue()));
        }
        s.set_loop(LoopMode::Queue);
        assert!(s.loop_queue() && !s.loop_track());
    }

    #[test]
    fn remove_keeps_order() {
        let mut s = session();
        s.enqueue_all(tracks(&["a", "b", "c"]));
        let removed = s.remove(2).unwrap();
        assert_eq!(removed.title, "b");
        let titles: Vec<_> = s.queue().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["a", "c"]);
    }

    #[test]
    fn remove_out_of_range() {
        let mut s = session();
        assert!(matches!(s.remove(1), Err(Error::QueueEmpty)));
        s.enqueue_all(tracks(&["a"]));
        assert!(matches!(
            s.remove(0),
            Err(Error::IndexOutOfRange { index: 0, len: 1 })
        ));
        assert!(matches!(
            s.remove(-3),
            Err(Error::IndexOutOfRange { .. })
        ));
        assert!(matches!(s.remove(2), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn shuffle_keeps_every_track() {
        let mut s = session();
        s.enqueue_all(tracks(&["a", "b", "c", "d", "e"]));
        assert_eq!(s.shuffle(&mut rand::thread_rng()), 5);
        let mut titles: Vec<_> = s.queue().iter().map(|t| t.title.clone()).collect();
        titles.sort();
        assert_eq!(titles, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn pause_and_resume() {
        let mut s = session();
        assert!(matches!(s.pause(), Err(Error::NothingPlaying)));
        s.enqueue_all(tracks(&["a"]));
        s.start_next_if_idle();
        s.pause().unwrap();
        assert_eq!(s.state(), SessionState::Paused);
        assert!(matches!(s.pause(), Err(Error::AlreadyPaused)));
        s.resume().unwrap();
        assert!(matches!(s.resume(), Err(Error::NotPaused)));
    }

    #[test]
    fn idle_timeout() {
        let start = Instant::now();
        let mut s = PlayerSession::new(GuildId::new(1), false, start);
        assert!(!s.is_idle_timed_out(start, TIMEOUT));
        assert!(!s.is_idle_timed_out(start + TIMEOUT, TIMEOUT));
        assert!(s.is_idle_timed_out(start + TIMEOUT + Duration::from_secs(1), TIMEOUT));

        s.touch(start + TIMEOUT);
        assert!(!s.is_idle_timed_out(start + TIMEOUT + Duration::from_secs(1), TIMEOUT));
    }

    #[test]
    fn playing_session_never_times_out() {
        let start = Instant::now();
        let mut s = PlayerSession::new(GuildId::new(1), false, start);
        s.enqueue(Track::new("a", "b", 1));
        s.start_next_if_idle();
        assert!(!s.is_idle_timed_out(start + Duration::from_secs(3600), TIMEOUT));

        s.pause().unwrap();
        assert!(s.is_idle_timed_out(start + Duration::from_secs(3600), TIMEOUT));
    }

    #[test]
    fn disconnected_session_is_terminal() {
        let mut s = session();
        s.enqueue_all(tracks(&["a"]));
        s.mark_disconnected();
        assert_eq!(s.state(), SessionState::Disconnected);
        assert!(s.start_next_if_idle().is_none());
    }
}
