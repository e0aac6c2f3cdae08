use serenity::model::id::{ChannelId, UserId};
use tracing::error;

use crate::response::Response;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("command used outside of a server")]
    NotInGuild,
    #[error("caller is not in a voice channel")]
    NotInVoiceChannel,
    #[error("command issued outside of home channel {home}")]
    WrongChannel { home: ChannelId },
    #[error("no active session for this guild")]
    NoActiveSession,
    #[error("queue is empty")]
    QueueEmpty,
    #[error("nothing is playing")]
    NothingPlaying,
    #[error("player is already paused")]
    AlreadyPaused,
    #[error("player is not paused")]
    NotPaused,
    #[error("caller lacks DJ permissions")]
    Unauthorized,
    #[error("caller is not an administrator")]
    NotAdministrator,
    #[error("no active search for caller")]
    NoActiveSearch,
    #[error("index {index} outside 1..={len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("volume {0} outside 0..=100")]
    InvalidVolume(i64),
    #[error("seek position outside 0..={max_secs}s")]
    InvalidSeekPosition { max_secs: u64 },
    #[error("search returned no tracks")]
    NoResults,
    #[error("a user is required for this action")]
    MissingUser,
    #[error("user {0} is not a DJ")]
    NotADj(UserId),
    #[error("{context} failed: {source}")]
    ExternalService {
        context: &'static str,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub fn external(context: &'static str, source: impl Into<BoxError>) -> Self {
        Error::ExternalService {
            context,
            source: source.into(),
        }
    }

    /// What the invoking user gets to read.
    pub fn user_message(&self) -> String {
        match self {
            Error::NotInGuild => "This command can only be used in a server.".into(),
            Error::NotInVoiceChannel => {
                "You need to be in a voice channel to use this command.".into()
            }
            Error::WrongChannel { home } => format!(
                "You can only use the player in <#{}>, as the player has already started there.",
                home.get()
            ),
            Error::NoActiveSession => "I'm not currently in a voice channel.".into(),
            Error::QueueEmpty => "The queue is empty.".into(),
            Error::NothingPlaying => "No song is currently playing.".into(),
            Error::AlreadyPaused => "The player is already paused.".into(),
            Error::NotPaused => "The player is not currently paused.".into(),
            Error::Unauthorized => "You need DJ permissions to use this command.".into(),
            Error::NotAdministrator => {
                "You need administrator permissions to manage DJ settings.".into()
            }
            Error::NoActiveSearch => {
                "You don't have any active search results. Use `/play` to search for songs first."
                    .into()
            }
            Error::IndexOutOfRange { len, .. } => {
                format!("Please choose a number between 1 and {}.", len)
            }
            Error::InvalidVolume(_) => "Volume must be between 0 and 100.".into(),
            Error::InvalidSeekPosition { max_secs } => {
                format!("Position must be between 0 and {} seconds.", max_secs)
            }
            Error::NoResults => {
                "Could not find any tracks with that query. Please try again.".into()
            }
            Error::MissingUser => "Please specify a user to add or remove as DJ.".into(),
            Error::NotADj(user) => format!("<@{}> is not a DJ.", user.get()),
            Error::ExternalService { .. } => {
                "Something went wrong while talking to the music service. Please try again.".into()
            }
        }
    }

    pub fn into_response(self) -> Response {
        if let Error::ExternalService { context, source } = &self {
            error!(context, error = %source, "external service call failed");
        }
        Response::text(self.user_message()).ephemeral()
    }
}
