pub mod config;
pub mod discord;
pub mod dispatcher;
pub mod dj;
pub mod engine;
pub mod error;
pub mod lavalink;
pub mod query;
pub mod reaper;
pub mod registry;
pub mod response;
pub mod selection;
pub mod session;
pub mod track;
pub mod views;
pub mod volume;

pub use error::{Error, Result};
