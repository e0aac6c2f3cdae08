//! Pending `/select` choices, one window per user.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use serenity::model::id::UserId;
use smallvec::SmallVec;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::track::Track;

pub const MAX_CANDIDATES: usize = 5;

type Candidates = SmallVec<[Track; MAX_CANDIDATES]>;

struct Window {
    tracks: Candidates,
    deadline: Instant,
    generation: u64,
}

#[derive(Default)]
struct Inner {
    windows: HashMap<UserId, Window>,
    deadlines: BinaryHeap<Reverse<(Instant, u64, UserId)>>,
    next_generation: u64,
}

pub struct SearchSelectionCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl SearchSelectionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
        }
    }

    /// Replaces the user's window with the first five of `tracks`.
    /// Returns the number of candidates kept.
    pub fn store(&self, user: UserId, tracks: impl IntoIterator<Item = Track>, now: Instant) -> usize {
        let tracks: Candidates = tracks.into_iter().take(MAX_CANDIDATES).collect();
        let kept = tracks.len();
        let deadline = now + self.ttl;

        let mut inner = self.inner.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.deadlines.push(Reverse((deadline, generation, user)));
        inner.windows.insert(
            user,
            Window {
                tracks,
                deadline,
                generation,
            },
        );
        kept
    }

    /// Takes candidate `index` (1-based) and closes the window.
    pub fn resolve(&self, user: UserId, index: i64, now: Instant) -> Result<Track> {
        let mut inner = self.inner.lock();
        let (expired, len) = match inner.windows.get(&user) {
            Some(w) => (w.deadline <= now, w.tracks.len()),
            None => return Err(Error::NoActiveSearch),
        };
        if expired {
            inner.windows.remove(&user);
            return Err(Error::NoActiveSearch);
        }

        let slot = usize::try_from(index)
            .ok()
            .filter(|i| (1..=len).contains(i))
            .ok_or(Error::IndexOutOfRange { index, len })?;

        let mut window = inner.windows.remove(&user).ok_or(Error::NoActiveSearch)?;
        Ok(window.tracks.swap_remove(slot - 1))
    }

    pub fn is_active(&self, user: UserId, now: Instant) -> bool {
        self.inner
            .lock()
            .windows
            .get(&user)
            .is_some_and(|w| w.deadline > now)
    }

    /// Drops every window whose deadline has passed. Returns how many were dropped.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        let mut purged = 0;
        while let Some(Reverse((deadline, generation, user))) = inner.deadlines.peek().copied() {
            if deadline > now {
                break;
            }
            inner.deadlines.pop();
            let stale = inner
                .windows
                .get(&user)
                .is_some_and(|w| w.generation == generation);
            if stale {
                inner.windows.remove(&user);
                purged += 1;
            }
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.inner.lock().windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
