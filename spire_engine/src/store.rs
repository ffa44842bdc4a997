//! Key-value persistence collaborator.
//!
//! Generic string-keyed storage with an automatic secure-vs-general routing
//! policy (key-name heuristics), plus the auto-save contract: one atomic
//! `SaveData` unit capturing the whole session, version-aware on read.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use spire_data::Scene;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::SPIRE_VERSION;
use crate::state::GameState;

/// Autosave slot key.
pub const AUTOSAVE_KEY: &str = "spire_autosave";

/// Storage failures. Callers treat these as recoverable: log and fall back to
/// in-memory-only state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io failure for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt stored value for key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal key-value contract shared by all backends.
pub trait KvStore {
    fn store(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn retrieve(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Volatile in-memory backend; also the stand-in for a hardware-backed secure
/// store in environments without one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl KvStore for MemoryStore {
    fn store(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' { ch } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl KvStore for FileStore {
    fn store(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })?;
        fs::write(self.path_for(key), value).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })
    }

    fn retrieve(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// Key-name heuristic for values that belong in hardware-backed storage.
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    ["token", "credential", "password", "secret"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Routes each operation to the secure or general backend based on
/// [`is_sensitive_key`].
pub struct RoutedStore {
    secure: Box<dyn KvStore>,
    general: Box<dyn KvStore>,
}

impl RoutedStore {
    pub fn new(secure: Box<dyn KvStore>, general: Box<dyn KvStore>) -> Self {
        Self { secure, general }
    }

    fn backend(&self, key: &str) -> &dyn KvStore {
        if is_sensitive_key(key) {
            self.secure.as_ref()
        } else {
            self.general.as_ref()
        }
    }

    fn backend_mut(&mut self, key: &str) -> &mut dyn KvStore {
        if is_sensitive_key(key) {
            self.secure.as_mut()
        } else {
            self.general.as_mut()
        }
    }
}

impl KvStore for RoutedStore {
    fn store(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.backend_mut(key).store(key, value)
    }

    fn retrieve(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.backend(key).retrieve(key)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.backend_mut(key).remove(key)
    }
}

/// One atomic auto-save unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveData {
    pub game_state: GameState,
    pub current_scene: Option<Scene>,
    pub current_chapter_id: Option<String>,
    pub saved_at: String,
    pub game_version: String,
}

impl SaveData {
    pub fn capture(game_state: GameState, current_scene: Option<Scene>, current_chapter_id: Option<String>) -> Self {
        let saved_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("unknown"));
        Self {
            game_state,
            current_scene,
            current_chapter_id,
            saved_at,
            game_version: SPIRE_VERSION.to_string(),
        }
    }
}

/// Persist the auto-save unit.
pub fn write_autosave(store: &mut dyn KvStore, data: &SaveData) -> Result<(), StoreError> {
    let json = serde_json::to_string(data).map_err(|source| StoreError::Corrupt {
        key: AUTOSAVE_KEY.to_string(),
        source,
    })?;
    store.store(AUTOSAVE_KEY, &json)?;
    info!("autosave written ({} bytes)", json.len());
    Ok(())
}

/// Load the auto-save unit, warning (not failing) on a version mismatch.
pub fn read_autosave(store: &dyn KvStore) -> Result<Option<SaveData>, StoreError> {
    let Some(json) = store.retrieve(AUTOSAVE_KEY)? else {
        return Ok(None);
    };
    let data: SaveData = serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
        key: AUTOSAVE_KEY.to_string(),
        source,
    })?;
    if data.game_version != SPIRE_VERSION {
        warn!(
            "autosave written by version {} (current {}); loading anyway",
            data.game_version, SPIRE_VERSION
        );
    }
    Ok(Some(data))
}

/// Round-trip a synthetic save through the store and verify it comes back
/// intact. Used at startup to confirm the backend is usable.
pub fn self_test(store: &mut dyn KvStore) -> bool {
    const TEST_KEY: &str = "spire_store_self_test";
    let mut state = GameState::default();
    state.flags.insert("self_test".to_string());
    let sample = SaveData::capture(state, None, Some("chapter_self_test".to_string()));

    let Ok(json) = serde_json::to_string(&sample) else {
        return false;
    };
    if store.store(TEST_KEY, &json).is_err() {
        warn!("store self-test: write failed");
        return false;
    }
    let ok = match store.retrieve(TEST_KEY) {
        Ok(Some(back)) => serde_json::from_str::<SaveData>(&back).is_ok_and(|data| data == sample),
        _ => false,
    };
    let _ = store.remove(TEST_KEY);
    if !ok {
        warn!("store self-test: round trip mismatch");
    }
    ok
}
