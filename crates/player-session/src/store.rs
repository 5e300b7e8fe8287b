//! Durable per-session records.
//!
//! A [`SessionStore`] is the host's key-value persistence. [`FileSessionStore`] keeps one
//! JSON document per session id so records survive process death.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use player_session_types::{PlayerState, TrackInfo};
use serde::{Deserialize, Serialize};

/// Everything persisted for one session.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedSession {
    /// Transport state captured at the last teardown.
    pub player_state: Option<PlayerState>,
    /// Manual track selections not yet applied to (or captured from) an engine.
    #[serde(default)]
    pub manual_tracks: Vec<TrackInfo>,
}

impl SavedSession {
    pub fn is_empty(&self) -> bool {
        self.player_state.is_none() && self.manual_tracks.is_empty()
    }
}

pub trait SessionStore: Send + Sync {
    fn load(&self, session_id: &str) -> Result<Option<SavedSession>>;
    fn save(&self, session_id: &str, session: &SavedSession) -> Result<()>;
    fn clear(&self, session_id: &str) -> Result<()>;
}

/// Process-local store, for tests and hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<String, SavedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: &str) -> Result<Option<SavedSession>> {
        let records = self.records.lock().unwrap_or_else(|err| err.into_inner());
        Ok(records.get(session_id).cloned())
    }

    fn save(&self, session_id: &str, session: &SavedSession) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|err| err.into_inner());
        records.insert(session_id.to_string(), session.clone());
        Ok(())
    }

    fn clear(&self, session_id: &str) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|err| err.into_inner());
        records.remove(session_id);
        Ok(())
    }
}

/// One `<encoded id>.json` file per session under a state directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Open (and create if needed) the state directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create session state dir {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ids of every saved record, sorted.
    pub fn session_ids(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("list session state dir {:?}", self.dir))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("list session state dir {:?}", self.dir))?;
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|name| name.strip_suffix(".json")) else {
                continue;
            };
            match urlencoding::decode(stem) {
                Ok(id) => ids.push(id.into_owned()),
                Err(err) => tracing::warn!(file = %stem, "skipping undecodable state file: {err}"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", urlencoding::encode(session_id)))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, session_id: &str) -> Result<Option<SavedSession>> {
        let path = self.path_for(session_id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("read session state {:?}", path));
            }
        };
        let session = serde_json::from_str::<SavedSession>(&raw)
            .with_context(|| format!("parse session state {:?}", path))?;
        Ok(Some(session))
    }

    fn save(&self, session_id: &str, session: &SavedSession) -> Result<()> {
        let path = self.path_for(session_id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(session).context("serialize session state")?;
        std::fs::write(&tmp, body).with_context(|| format!("write session state {:?}", tmp))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("replace session state {:?}", path))?;
        Ok(())
    }

    fn clear(&self, session_id: &str) -> Result<()> {
        let path = self.path_for(session_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove session state {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use player_session_types::{TrackIndices, TrackType};

    fn sample() -> SavedSession {
        SavedSession {
            player_state: Some(PlayerState::new(5000, false)),
            manual_tracks: vec![
                TrackInfo::new(TrackType::Text, TrackIndices::new(0, 1, 2))
                    .with_name("English CC")
                    .manually_selected(),
            ],
        }
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSessionStore::open(dir.path()).expect("open");
        store.save("video:42", &sample()).expect("save");

        let reopened = FileSessionStore::open(dir.path()).expect("reopen");
        assert_eq!(reopened.load("video:42").expect("load"), Some(sample()));
    }

    #[test]
    fn file_store_encodes_ids_into_file_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSessionStore::open(dir.path()).expect("open");
        store.save("feed/item 7", &sample()).expect("save");

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["feed%2Fitem%207.json".to_string()]);
    }

    #[test]
    fn file_store_lists_decoded_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSessionStore::open(dir.path()).expect("open");
        store.save("feed/item 7", &sample()).expect("save");
        store.save("a", &sample()).expect("save");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        assert_eq!(
            store.session_ids().expect("list"),
            vec!["a".to_string(), "feed/item 7".to_string()]
        );
    }

    #[test]
    fn file_store_clear_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSessionStore::open(dir.path()).expect("open");
        store.save("a", &sample()).expect("save");
        store.clear("a").expect("clear");
        store.clear("a").expect("clear missing");
        assert_eq!(store.load("a").expect("load"), None);
    }

    #[test]
    fn file_store_reports_corrupt_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSessionStore::open(dir.path()).expect("open");
        std::fs::write(dir.path().join("broken.json"), "{not json").expect("write");
        let err = store.load("broken").expect_err("corrupt record");
        assert!(format!("{err:#}").contains("parse session state"));
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load("x").expect("load"), None);
        store.save("x", &sample()).expect("save");
        assert_eq!(store.load("x").expect("load"), Some(sample()));
        store.clear("x").expect("clear");
        assert_eq!(store.load("x").expect("load"), None);
    }
}
