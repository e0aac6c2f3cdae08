use std::sync::Arc;

use serenity::all::{GatewayIntents, Http};
use serenity::Client;
use songbird::{SerenityInit, Songbird};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stellara::config::Config;
use stellara::discord::{Handler, SerenityNotifier};
use stellara::dispatcher::CommandDispatcher;
use stellara::engine::{Notifier, PlaybackEngine};
use stellara::lavalink::{self, LavalinkEngine};
use stellara::reaper::InactivityReaper;
use stellara::registry::SessionRegistry;
use stellara::selection::SearchSelectionCache;
use stellara::volume::VolumePreferenceStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lavalink_rs=warn,serenity=warn")),
        )
        .init();

    let config = Config::from_env()?;
    let http = Arc::new(Http::new(&config.token));

    let bot_id = http.get_current_user().await?.id;
    let mut owners = config.owners.clone();
    match http.get_current_application_info().await {
        Ok(app) => {
            if let Some(owner) = app.owner {
                owners.insert(owner.id);
            }
            if let Some(team) = app.team {
                owners.extend(team.members.into_iter().map(|m| m.user.id));
            }
        }
        Err(e) => warn!(error = ?e, "could not fetch application owners"),
    }
    info!(bot_id = %bot_id, owners = owners.len(), "starting");

    let songbird = Songbird::serenity();
    let Some(mut events) = lavalink::subscribe() else {
        return Err("playback event stream already taken".into());
    };
    let engine: Arc<dyn PlaybackEngine> =
        Arc::new(LavalinkEngine::connect_node(&config.lavalink, bot_id, songbird.clone()).await);
    let notifier: Arc<dyn Notifier> = Arc::new(SerenityNotifier::new(http.clone()));

    let registry = Arc::new(SessionRegistry::new(config.dj_required));
    let selections = Arc::new(SearchSelectionCache::new(config.selection_ttl));
    let volume_file = config.volume_file.clone();
    let default_volume = config.default_volume;
    let volumes = Arc::new(
        tokio::task::spawn_blocking(move || VolumePreferenceStore::load(volume_file, default_volume))
            .await?,
    );

    let dispatcher = Arc::new(CommandDispatcher::new(
        registry.clone(),
        selections.clone(),
        volumes,
        engine.clone(),
        notifier.clone(),
    ));

    let event_dispatcher = dispatcher.clone();
    tokio::spawn(async move {
        // one at a time, so a guild's events apply in arrival order
        while let Some(event) = events.recv().await {
            event_dispatcher.handle_event(event).await;
        }
    });

    let reaper = Arc::new(InactivityReaper::new(
        registry,
        selections,
        engine,
        notifier,
        config.inactivity_timeout,
        config.reaper_interval,
    ))
    .spawn();

    let handler = Handler {
        dispatcher,
        dj_role_name: config.dj_role_name.clone(),
        owners,
    };

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;
    let mut client = Client::builder(&config.token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }
    reaper.abort();
    Ok(())
}
