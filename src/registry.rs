use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serenity::model::id::GuildId;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::session::PlayerSession;

pub type SessionHandle = Arc<Mutex<PlayerSession>>;

/// Guild id to live session. The map lock is only held for lookups, never
/// while a session is being worked on.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<GuildId, SessionHandle>>,
    dj_required: bool,
}

impl SessionRegistry {
    pub fn new(dj_required: bool) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            dj_required,
        }
    }

    /// Returns the guild's session, creating an unbound one if none exists.
    /// Concurrent callers for the same guild all get the same session.
    pub fn get_or_create(&self, guild: GuildId) -> SessionHandle {
        if let Some(existing) = self.get(guild) {
            return existing;
        }
        let mut sessions = self.sessions.write();
        sessions
            .entry(guild)
            .or_insert_with(|| {
                Arc::new(Mutex::new(PlayerSession::new(
                    guild,
                    self.dj_required,
                    Instant::now(),
                )))
            })
            .clone()
    }

    pub fn get(&self, guild: GuildId) -> Option<SessionHandle> {
        self.sessions.read().get(&guild).cloned()
    }

    pub fn remove(&self, guild: GuildId) -> Option<SessionHandle> {
        self.sessions.write().remove(&guild)
    }

    /// Removes the guild's entry only if it is still `handle`, so a session
    /// created after `handle` was observed survives.
    pub fn remove_if_same(&self, guild: GuildId, handle: &SessionHandle) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(&guild) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                sessions.remove(&guild);
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> Vec<(GuildId, SessionHandle)> {
        self.sessions
            .read()
            .iter()
            .map(|(guild, handle)| (*guild, handle.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
