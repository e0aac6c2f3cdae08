use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;
use serenity::model::id::GuildId;
use tracing::{debug, warn};

pub const DEFAULT_VOLUME: u8 = 30;

/// Last used volume per guild, kept in a small JSON file (`{"<guild id>": volume}`).
pub struct VolumePreferenceStore {
    path: PathBuf,
    volumes: Mutex<HashMap<String, u8>>,
    default: u8,
}

impl VolumePreferenceStore {
    /// Reads `path` if it exists. A missing or unreadable file starts the store empty.
    pub fn load(path: impl Into<PathBuf>, default: u8) -> Self {
        let path = path.into();
        let volumes = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring corrupt volume file");
                HashMap::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read volume file");
                HashMap::new()
            }
        };
        debug!(guilds = volumes.len(), "loaded volume preferences");

        Self {
            path,
            volumes: Mutex::new(volumes),
            default,
        }
    }

    pub fn get(&self, guild: GuildId) -> u8 {
        self.volumes
            .lock()
            .get(&guild.get().to_string())
            .copied()
            .unwrap_or(self.default)
    }

    /// Records `volume` and writes the whole file before returning.
    /// The caller is responsible for the 0..=100 bound.
    pub fn set(&self, guild: GuildId, volume: u8) -> io::Result<()> {
        let mut volumes = self.volumes.lock();
        let previous = volumes.insert(guild.get().to_string(), volume);

        if let Err(e) = self.flush(&volumes) {
            match previous {
                Some(v) => volumes.insert(guild.get().to_string(), v),
                None => volumes.remove(&guild.get().to_string()),
            };
            return Err(e);
        }
        Ok(())
    }

    fn flush(&self, volumes: &HashMap<String, u8>) -> io::Result<()> {
        let raw = serde_json::to_vec(volumes)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scratch_path() -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        std::env::temp_dir().join(format!(
            "stellara-volume-{}-{}.json",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ))
    }

    #[test]
    fn defaults_when_absent() {
        let store = VolumePreferenceStore::load(scratch_path(), DEFAULT_VOLUME);
        assert_eq!(store.get(GuildId::new(42)), 30);
    }

    #[test]
    fn set_survives_reload() {
        let path = scratch_path();
        let store = VolumePreferenceStore::load(&path, DEFAULT_VOLUME);
        store.set(GuildId::new(42), 75).unwrap();
        assert_eq!(store.get(GuildId::new(42)), 75);

        let reloaded = VolumePreferenceStore::load(&path, DEFAULT_VOLUME);
        assert_eq!(reloaded.get(GuildId::new(42)), 75);
        assert_eq!(reloaded.get(GuildId::new(43)), 30);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let path = scratch_path();
        std::fs::write(&path, b"{not json").unwrap();
        let store = VolumePreferenceStore::load(&path, DEFAULT_VOLUME);
        assert_eq!(store.get(GuildId::new(1)), 30);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn write_failure_is_reported_and_rolled_back() {
        let dir = std::env::temp_dir().join(format!("stellara-missing-{}", std::process::id()));
        let store = VolumePreferenceStore::load(dir.join("nested").join("v.json"), DEFAULT_VOLUME);
        assert!(store.set(GuildId::new(42), 80).is_err());
        assert_eq!(store.get(GuildId::new(42)), 30);
    }
}
