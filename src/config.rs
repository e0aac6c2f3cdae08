use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serenity::model::id::UserId;

use crate::volume::DEFAULT_VOLUME;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` is not set")]
    Missing(&'static str),
    #[error("environment variable `{name}` has invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct LavalinkNode {
    /// `host:port`
    pub hostname: String,
    pub is_ssl: bool,
    pub password: String,
}

impl LavalinkNode {
    pub fn parse(uri: &str, password: String) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::Invalid {
            name: "LAVALINK_URI",
            value: uri.to_owned(),
        };
        let (is_ssl, rest) = if let Some(rest) = uri.strip_prefix("wss://") {
            (true, rest)
        } else if let Some(rest) = uri.strip_prefix("ws://") {
            (false, rest)
        } else if let Some(rest) = uri.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = uri.strip_prefix("http://") {
            (false, rest)
        } else {
            (false, uri)
        };
        let hostname = rest.trim_end_matches('/');
        if hostname.is_empty() || hostname.contains('/') {
            return Err(invalid());
        }
        let hostname = if hostname.contains(':') {
            hostname.to_owned()
        } else if is_ssl {
            format!("{}:443", hostname)
        } else {
            format!("{}:2333", hostname)
        };

        Ok(Self {
            hostname,
            is_ssl,
            password,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub token: String,
    pub lavalink: LavalinkNode,
    pub dj_role_name: String,
    pub dj_required: bool,
    pub volume_file: PathBuf,
    pub default_volume: u8,
    pub owners: HashSet<UserId>,
    pub inactivity_timeout: Duration,
    pub reaper_interval: Duration,
    pub selection_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = env::var("BOT_TOKEN").map_err(|_| ConfigError::Missing("BOT_TOKEN"))?;
        let password =
            env::var("LAVALINK_PASSWORD").unwrap_or_else(|_| "youshallnotpass".to_owned());
        let uri = env::var("LAVALINK_URI").unwrap_or_else(|_| "ws://127.0.0.1:2333".to_owned());

        let mut config = Self::with_token(token, LavalinkNode::parse(&uri, password)?);
        if let Ok(name) = env::var("DJ_ROLE_NAME") {
            config.dj_role_name = name;
        }
        if let Ok(raw) = env::var("DJ_REQUIRED") {
            config.dj_required = parse_bool(&raw).ok_or(ConfigError::Invalid {
                name: "DJ_REQUIRED",
                value: raw,
            })?;
        }
        if let Ok(path) = env::var("VOLUME_FILE") {
            config.volume_file = PathBuf::from(path);
        }
        if let Ok(raw) = env::var("BOT_OWNERS") {
            config.owners = parse_owners(&raw).ok_or(ConfigError::Invalid {
                name: "BOT_OWNERS",
                value: raw,
            })?;
        }
        Ok(config)
    }

    pub fn with_token(token: String, lavalink: LavalinkNode) -> Self {
        Self {
            token,
            lavalink,
            dj_role_name: "DJ".to_owned(),
            dj_required: true,
            volume_file: PathBuf::from("volume_settings.json"),
            default_volume: DEFAULT_VOLUME,
            owners: HashSet::new(),
            inactivity_timeout: Duration::from_secs(300),
            reaper_interval: Duration::from_secs(30),
            selection_ttl: Duration::from_secs(60),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_owners(raw: &str) -> Option<HashSet<UserId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u64>().ok().filter(|id| *id != 0).map(UserId::new))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lavalink_uri_forms() {
        let node = LavalinkNode::parse("wss://lava.example.com:443", "pw".into()).unwrap();
        assert!(node.is_ssl);
        assert_eq!(node.hostname, "lava.example.com:443");

        let node = LavalinkNode::parse("ws://127.0.0.1:2333/", "pw".into()).unwrap();
        assert!(!node.is_ssl);
        assert_eq!(node.hostname, "127.0.0.1:2333");

        let node = LavalinkNode::parse("localhost", "pw".into()).unwrap();
        assert_eq!(node.hostname, "localhost:2333");

        assert!(LavalinkNode::parse("ws://host/v4/ws", "pw".into()).is_err());
    }

    #[test]
    fn owners_list() {
        let owners = parse_owners("1, 2,,3").unwrap();
        assert_eq!(owners.len(), 3);
        assert!(owners.contains(&UserId::new(2)));
        assert!(parse_owners("1,abc").is_none());
        assert!(parse_owners("0").is_none());
    }

    #[test]
    fn bools() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn defaults_match_timing_constants() {
        let node = LavalinkNode::parse("localhost", String::new()).unwrap();
        let config = Config::with_token("t".into(), node);
        assert_eq!(config.inactivity_timeout, Duration::from_secs(300));
        assert_eq!(config.reaper_interval, Duration::from_secs(30));
        assert_eq!(config.selection_ttl, Duration::from_secs(60));
        assert_eq!(config.default_volume, 30);
        assert!(config.dj_required);
    }
}
