//! Sync token and joined-room persistence for the Matrix transport.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SyncState {
    #[serde(default)]
    sync_token: Option<String>,
    #[serde(default)]
    joined_rooms: BTreeSet<String>,
}

/// JSON file holding where the last sync stopped and which rooms we are in.
#[derive(Debug, Clone)]
pub struct SyncStore {
    path: PathBuf,
    state: SyncState,
}

impl SyncStore {
    /// Load the store from `path`. A missing file is an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| storage_error(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SyncState::default(),
            Err(e) => return Err(storage_error(&path, e)),
        };
        Ok(Self { path, state })
    }

    pub fn sync_token(&self) -> Option<&str> {
        self.state.sync_token.as_deref()
    }

    pub fn set_sync_token(&mut self, token: impl Into<String>) {
        self.state.sync_token = Some(token.into());
    }

    pub fn is_joined(&self, room_id: &str) -> bool {
        self.state.joined_rooms.contains(room_id)
    }

    /// Record a joined room. Returns `true` if it was not known before.
    pub fn add_joined(&mut self, room_id: &str) -> bool {
        self.state.joined_rooms.insert(room_id.to_string())
    }

    pub fn remove_joined(&mut self, room_id: &str) -> bool {
        self.state.joined_rooms.remove(room_id)
    }

    pub fn joined_rooms(&self) -> impl Iterator<Item = &str> {
        self.state.joined_rooms.iter().map(String::as_str)
    }

    /// Write the store to disk, creating parent directories as needed.
    pub async fn save(&self) -> Result<(), TransportError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(&self.path, e))?;
        }
        let raw = serde_json::to_string_pretty(&self.state)
            .map_err(|e| storage_error(&self.path, e))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| storage_error(&self.path, e))
    }
}

fn storage_error(path: &Path, err: impl std::fmt::Display) -> TransportError {
    TransportError::Storage {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
