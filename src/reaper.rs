//! Periodic eviction of idle sessions.

use std::sync::Arc;
use std::time::Duration;

use serenity::model::id::{ChannelId, GuildId};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{Notifier, PlaybackEngine};
use crate::registry::SessionRegistry;
use crate::response::Response;
use crate::selection::SearchSelectionCache;
use crate::views;

pub struct InactivityReaper {
    registry: Arc<SessionRegistry>,
    selections: Arc<SearchSelectionCache>,
    engine: Arc<dyn PlaybackEngine>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
    period: Duration,
}

impl InactivityReaper {
    pub fn new(
        registry: Arc<SessionRegistry>,
        selections: Arc<SearchSelectionCache>,
        engine: Arc<dyn PlaybackEngine>,
        notifier: Arc<dyn Notifier>,
        timeout: Duration,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            selections,
            engine,
            notifier,
            timeout,
            period,
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Sweeps every `period` until the task is aborted.
    pub async fn run(&self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let teardowns = self.sweep(Instant::now());
            if !teardowns.is_empty() {
                debug!(count = teardowns.len(), "evicted idle sessions");
            }
        }
    }

    /// Evicts every session idle for longer than the timeout. Sessions whose
    /// lock is held are in use and skipped. The returned tasks perform the
    /// backend disconnect and post the notice; they never fail.
    pub fn sweep(&self, now: Instant) -> Vec<JoinHandle<()>> {
        let purged = self.selections.purge_expired(now);
        if purged > 0 {
            debug!(purged, "dropped expired search windows");
        }

        let mut teardowns = Vec::new();
        for (guild, handle) in self.registry.snapshot() {
            let home = {
                let Ok(mut session) = handle.try_lock() else {
                    continue;
                };
                if session.is_disconnected() || !session.is_idle_timed_out(now, self.timeout) {
                    continue;
                }
                session.mark_disconnected();
                session.home_channel()
            };
            self.registry.remove_if_same(guild, &handle);
            info!(guild_id = %guild, "disconnecting idle session");

            teardowns.push(tokio::spawn(teardown(
                guild,
                home,
                self.engine.clone(),
                self.notifier.clone(),
            )));
        }
        teardowns
    }
}

async fn teardown(
    guild: GuildId,
    home: Option<ChannelId>,
    engine: Arc<dyn PlaybackEngine>,
    notifier: Arc<dyn Notifier>,
) {
    if let Err(e) = engine.disconnect(guild).await {
        warn!(guild_id = %guild, error = %e, "idle disconnect failed");
    }
    if let Some(home) = home {
        let notice = Response::text(views::inactivity_notice());
        if let Err(e) = notifier.notify(home, notice).await {
            warn!(guild_id = %guild, error = %e, "could not post inactivity notice");
        }
    }
}
