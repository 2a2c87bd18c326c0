//! Local durable mirror
//!
//! A small key-value cache of the collection and the last reset instant.
//! It is read once at startup and rewritten after every change. Nothing in
//! the mirror is authoritative; a failed read or write is logged and the
//! portal carries on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinic_common::model::ScheduleEntry;
use clinic_common::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Key holding the serialized collection
pub const SCHEDULES_KEY: &str = "ksu-ortho-schedules";

/// Key holding the last reset timestamp
pub const LAST_RESET_KEY: &str = "ksu-ortho-schedules-last-reset";

/// String key-value storage
#[async_trait]
pub trait LocalMirror: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>>;
    async fn write(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key under a folder
pub struct JsonFileMirror {
    dir: PathBuf,
}

impl JsonFileMirror {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(Error::InvalidInput(format!("mirror key {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl LocalMirror for JsonFileMirror {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        // Write-then-rename so a crash never leaves a truncated file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local mirror for tests and `--ephemeral` runs
#[derive(Default)]
pub struct MemoryMirror {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalMirror for MemoryMirror {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

/// Mirrored collection; empty when absent or unreadable
pub async fn load_entries(mirror: &dyn LocalMirror) -> Vec<ScheduleEntry> {
    let raw = match mirror.read(SCHEDULES_KEY).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Failed to read schedule mirror: {}", e);
            return Vec::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Discarding unreadable schedule mirror: {}", e);
            Vec::new()
        }
    }
}

/// Rewrite the mirrored collection, best effort
pub async fn save_entries(mirror: &dyn LocalMirror, entries: &[ScheduleEntry]) {
    let result = match serde_json::to_string(entries) {
        Ok(json) => mirror.write(SCHEDULES_KEY, &json).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(()) => debug!("Mirrored {} entries", entries.len()),
        Err(e) => warn!("Failed to write schedule mirror: {}", e),
    }
}

/// Drop the mirrored collection, best effort
pub async fn clear_entries(mirror: &dyn LocalMirror) {
    if let Err(e) = mirror.remove(SCHEDULES_KEY).await {
        warn!("Failed to clear schedule mirror: {}", e);
    }
}

/// Last recorded reset instant
pub async fn load_last_reset(mirror: &dyn LocalMirror) -> Option<DateTime<Utc>> {
    match mirror.read(LAST_RESET_KEY).await {
        Ok(Some(raw)) => match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(at) => Some(at.with_timezone(&Utc)),
            Err(e) => {
                warn!("Ignoring unreadable last reset {:?}: {}", raw, e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!("Failed to read last reset: {}", e);
            None
        }
    }
}

pub async fn save_last_reset(mirror: &dyn LocalMirror, at: DateTime<Utc>) {
    if let Err(e) = mirror.write(LAST_RESET_KEY, &at.to_rfc3339()).await {
        warn!("Failed to record last reset: {}", e);
    }
}
