//! Serenity glue: slash command registration, interaction parsing and
//! delivery of [`Response`]s.

use std::collections::HashSet;
use std::sync::Arc;

use phf::phf_map;
use serenity::all::{
    ChannelId, CommandData, CommandDataOptionValue, CommandInteraction, CommandOptionType,
    CreateCommand, CreateCommandOption, CreateEmbed, CreateEmbedFooter,
    CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, CreateMessage, GuildId, Http, Interaction, Ready, UserId,
};
use serenity::async_trait;
use serenity::model::application::Command as SlashCommand;
use serenity::prelude::*;
use tracing::{error, info, warn};

use crate::dispatcher::{Command, CommandDispatcher, DjAction, Invocation};
use crate::dj::Caller;
use crate::engine::{Boost, Notifier};
use crate::error::BoxError;
use crate::response::{Embed, Response};
use crate::session::LoopMode;

type Parser = fn(&CommandData) -> Option<Command>;

static COMMANDS: phf::Map<&'static str, Parser> = phf_map! {
    "play" => parse_play,
    "select" => parse_select,
    "pause" => parse_pause,
    "resume" => parse_resume,
    "stop" => parse_stop,
    "skip" => parse_skip,
    "queue" => parse_queue,
    "nowplaying" => parse_now_playing,
    "disconnect" => parse_disconnect,
    "volume" => parse_volume,
    "loop" => parse_loop,
    "shuffle" => parse_shuffle,
    "remove" => parse_remove,
    "clear" => parse_clear,
    "seek" => parse_seek,
    "dj" => parse_dj,
    "boost" => parse_boost,
    "help" => parse_help,
};

fn option<'a>(data: &'a CommandData, name: &str) -> Option<&'a CommandDataOptionValue> {
    data.options
        .iter()
        .find(|o| o.name == name)
        .map(|o| &o.value)
}

fn string_option<'a>(data: &'a CommandData, name: &str) -> Option<&'a str> {
    option(data, name)?.as_str()
}

fn int_option(data: &CommandData, name: &str) -> Option<i64> {
    option(data, name)?.as_i64()
}

fn parse_play(data: &CommandData) -> Option<Command> {
    Some(Command::Play {
        query: string_option(data, "query")?.to_owned(),
    })
}

fn parse_select(data: &CommandData) -> Option<Command> {
    Some(Command::Select {
        index: int_option(data, "number")?,
    })
}

fn parse_pause(_: &CommandData) -> Option<Command> {
    Some(Command::Pause)
}

fn parse_resume(_: &CommandData) -> Option<Command> {
    Some(Command::Resume)
}

fn parse_stop(_: &CommandData) -> Option<Command> {
    Some(Command::Stop)
}

fn parse_skip(_: &CommandData) -> Option<Command> {
    Some(Command::Skip)
}

fn parse_queue(_: &CommandData) -> Option<Command> {
    Some(Command::Queue)
}

fn parse_now_playing(_: &CommandData) -> Option<Command> {
    Some(Command::NowPlaying)
}

fn parse_disconnect(_: &CommandData) -> Option<Command> {
    Some(Command::Disconnect)
}

fn parse_volume(data: &CommandData) -> Option<Command> {
    Some(Command::Volume {
        value: int_option(data, "value")?,
    })
}

fn parse_loop(data: &CommandData) -> Option<Command> {
    Some(Command::Loop {
        mode: LoopMode::parse(string_option(data, "mode")?)?,
    })
}

fn parse_shuffle(_: &CommandData) -> Option<Command> {
    Some(Command::Shuffle)
}

fn parse_remove(data: &CommandData) -> Option<Command> {
    Some(Command::Remove {
        position: int_option(data, "position")?,
    })
}

fn parse_clear(_: &CommandData) -> Option<Command> {
    Some(Command::Clear)
}

fn parse_seek(data: &CommandData) -> Option<Command> {
    Some(Command::Seek {
        seconds: int_option(data, "position")?,
    })
}

fn parse_dj(data: &CommandData) -> Option<Command> {
    Some(Command::Dj {
        action: DjAction::parse(string_option(data, "action")?)?,
        user: option(data, "user").and_then(CommandDataOptionValue::as_user_id),
    })
}

fn parse_boost(data: &CommandData) -> Option<Command> {
    Some(Command::Boost {
        filter: Boost::parse(string_option(data, "filter")?)?,
    })
}

fn parse_help(_: &CommandData) -> Option<Command> {
    Some(Command::Help)
}

pub fn parse_command(data: &CommandData) -> Option<Command> {
    COMMANDS.get(data.name.as_str()).and_then(|parse| parse(data))
}

fn choices(option: CreateCommandOption, values: &[&str]) -> CreateCommandOption {
    values
        .iter()
        .fold(option, |option, v| option.add_string_choice(*v, *v))
}

pub fn slash_commands() -> Vec<CreateCommand> {
    let int = |name: &str, description: &str| {
        CreateCommandOption::new(CommandOptionType::Integer, name, description).required(true)
    };

    vec![
        CreateCommand::new("play")
            .description("Play a song with the given query")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "query",
                    "Search words or a YouTube/Spotify link",
                )
                .required(true),
            ),
        CreateCommand::new("select")
            .description("Select a track from search results")
            .add_option(int("number", "The track number to play (1-5)")),
        CreateCommand::new("pause").description("Pause the currently playing song"),
        CreateCommand::new("resume").description("Resume the paused song"),
        CreateCommand::new("stop").description("Stop the music and clear the queue"),
        CreateCommand::new("skip").description("Skip the current song"),
        CreateCommand::new("queue").description("Show the current music queue"),
        CreateCommand::new("nowplaying").description("Show the currently playing track"),
        CreateCommand::new("disconnect").description("Disconnect from the voice channel"),
        CreateCommand::new("volume")
            .description("Change the volume of the player")
            .add_option(int("value", "Volume between 0 and 100")),
        CreateCommand::new("loop").description("Set loop mode").add_option(choices(
            CreateCommandOption::new(CommandOptionType::String, "mode", "Loop mode")
                .required(true),
            &["track", "queue", "off"],
        )),
        CreateCommand::new("shuffle").description("Shuffle the tracks in the queue"),
        CreateCommand::new("remove")
            .description("Remove a track from the queue")
            .add_option(int("position", "Position in the queue")),
        CreateCommand::new("clear").description("Clear the entire queue"),
        CreateCommand::new("seek")
            .description("Jump to a position in the current track")
            .add_option(int("position", "Position in seconds")),
        CreateCommand::new("dj")
            .description("Manage DJ mode and permissions")
            .add_option(choices(
                CreateCommandOption::new(CommandOptionType::String, "action", "What to do")
                    .required(true),
                &["enable", "disable", "add", "remove"],
            ))
            .add_option(CreateCommandOption::new(
                CommandOptionType::User,
                "user",
                "User to add or remove as DJ",
            )),
        CreateCommand::new("boost").description("Apply an audio filter").add_option(choices(
            CreateCommandOption::new(CommandOptionType::String, "filter", "Filter to apply")
                .required(true),
            &["bassboost", "nightcore", "8d", "clear"],
        )),
        CreateCommand::new("help").description("Show all available commands"),
    ]
}

pub fn to_create_embed(embed: &Embed) -> CreateEmbed {
    let mut out = CreateEmbed::new().title(&embed.title).color(embed.color);
    if let Some(description) = &embed.description {
        out = out.description(description);
    }
    for field in &embed.fields {
        out = out.field(&field.name, &field.value, field.inline);
    }
    if let Some(url) = &embed.thumbnail {
        out = out.thumbnail(url);
    }
    if let Some(url) = &embed.image {
        out = out.image(url);
    }
    if let Some(footer) = &embed.footer {
        out = out.footer(CreateEmbedFooter::new(footer));
    }
    out
}

pub struct Handler {
    pub dispatcher: Arc<CommandDispatcher>,
    pub dj_role_name: String,
    pub owners: HashSet<UserId>,
}

impl Handler {
    /// Collects what the dispatcher needs to know about the caller from the
    /// interaction and the guild cache.
    fn invocation(&self, ctx: &Context, command: &CommandInteraction) -> Invocation {
        let user_id = command.user.id;
        let mut caller = Caller::new(user_id);
        caller.is_bot_owner = self.owners.contains(&user_id);
        caller.is_administrator = command
            .member
            .as_ref()
            .and_then(|m| m.permissions)
            .is_some_and(|p| p.administrator());

        let voice_channel = command
            .guild_id
            .and_then(|guild_id| self.resolve_guild(ctx, guild_id, command, &mut caller));

        Invocation {
            guild_id: command.guild_id,
            channel_id: command.channel_id,
            voice_channel,
            caller,
        }
    }

    fn resolve_guild(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        command: &CommandInteraction,
        caller: &mut Caller,
    ) -> Option<ChannelId> {
        let guild = ctx.cache.guild(guild_id)?;
        caller.is_guild_owner = guild.owner_id == caller.user_id;
        if let Some(member) = &command.member {
            caller.has_dj_role = member.roles.iter().any(|role| {
                guild
                    .roles
                    .get(role)
                    .is_some_and(|r| r.name == self.dj_role_name)
            });
        }
        guild
            .voice_states
            .get(&caller.user_id)
            .and_then(|vs| vs.channel_id)
    }

    async fn respond(&self, ctx: &Context, command: &CommandInteraction, response: Response) {
        // the first followup would edit the public placeholder and lose the flag
        if response.ephemeral {
            if let Err(e) = command.delete_response(&ctx.http).await {
                error!(command = %command.data.name, error = ?e, "failed to drop deferred reply");
            }
        }
        if let Err(e) = command.create_followup(&ctx.http, to_followup(response)).await {
            error!(command = %command.data.name, error = ?e, "failed to send followup");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "connected to gateway");
        match SlashCommand::set_global_commands(&ctx.http, slash_commands()).await {
            Ok(registered) => info!(count = registered.len(), "registered slash commands"),
            Err(e) => error!(error = ?e, "failed to register slash commands"),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        let Some(parsed) = parse_command(&command.data) else {
            warn!(command = %command.data.name, "unrecognised or malformed command");
            let reply = CreateInteractionResponseMessage::new()
                .content("Invalid options for this command.")
                .ephemeral(true);
            if let Err(e) = command
                .create_response(&ctx.http, CreateInteractionResponse::Message(reply))
                .await
            {
                error!(command = %command.data.name, error = ?e, "failed to reject command");
            }
            return;
        };

        if let Err(e) = command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await
        {
            error!(error = ?e, "failed to defer interaction");
            return;
        }

        let invocation = self.invocation(&ctx, &command);
        let response = self.dispatcher.dispatch(&invocation, parsed).await;
        self.respond(&ctx, &command, response).await;
    }
}

fn to_followup(response: Response) -> CreateInteractionResponseFollowup {
    let mut followup = CreateInteractionResponseFollowup::new().ephemeral(response.ephemeral);
    if let Some(content) = response.content {
        followup = followup.content(content);
    }
    if let Some(embed) = &response.embed {
        followup = followup.embed(to_create_embed(embed));
    }
    followup
}

/// Posts unsolicited messages through the REST client.
pub struct SerenityNotifier {
    http: Arc<Http>,
}

impl SerenityNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for SerenityNotifier {
    async fn notify(&self, channel: ChannelId, message: Response) -> Result<(), BoxError> {
        let mut builder = CreateMessage::new();
        if let Some(content) = message.content {
            builder = builder.content(content);
        }
        if let Some(embed) = &message.embed {
            builder = builder.embed(to_create_embed(embed));
        }
        channel.send_message(self.http.as_ref(), builder).await?;
        Ok(())
    }
}
