use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

use log::{info, warn};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{ConfigProvider, RelaySettings};
use crate::error::StoreError;

/// Settings blob persisted as JSON on disk.
///
/// The blob is kept verbatim; the relay only looks at `endpoint`, `model` and
/// `apiKey`, the rest belongs to the browser UI.
pub struct ConfigStore {
    path: PathBuf,
    blob: RwLock<Value>,
    // Held across the disk write and the in-memory swap, so the file and the
    // blob always agree on the last update.
    writer: Mutex<()>,
}

impl ConfigStore {
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let blob = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("No settings file at {}, starting with empty settings", path.display());
                Value::Object(Map::new())
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        info!("Loaded settings from {}", path.display());
        Ok(Self {
            path,
            blob: RwLock::new(blob),
            writer: Mutex::new(()),
        })
    }

    /// The whole settings blob.
    pub fn snapshot(&self) -> Value {
        self.blob
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Persist a new blob, then make it current.
    ///
    /// The file is replaced with a rename, so a failed write leaves the
    /// previous settings on disk.
    pub async fn update(&self, blob: Value) -> Result<(), StoreError> {
        if !blob.is_object() {
            return Err(StoreError::NotAnObject);
        }

        let _writer = self.writer.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let rendered = serde_json::to_string_pretty(&blob).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let staging = self.staging_path();
        tokio::fs::write(&staging, rendered)
            .await
            .map_err(|e| StoreError::io(&staging, e))?;
        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(StoreError::io(&self.path, e));
        }

        *self
            .blob
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = blob;

        info!("Settings updated at {}", self.path.display());
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("config.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ConfigProvider for ConfigStore {
    fn current(&self) -> RelaySettings {
        let blob = self.blob.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        RelaySettings::from_blob(&blob)
    }
}
