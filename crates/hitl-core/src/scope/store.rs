//! Persisted tenant fallback
//!
//! Key-value store remembering the last selected tenant. Writes that do not
//! come from route navigation broadcast a [`FallbackChange`] so the scope is
//! recomputed without a route change.

use crate::error::StoreError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

const CHANGE_CAPACITY: usize = 16;

/// Who wrote a fallback value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written back from the current route
    Route,
    /// Written by anything else (tenant switcher, CLI)
    External,
}

/// Out-of-band fallback update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChange {
    /// Key written
    pub key: String,
    /// New value, `None` when cleared
    pub value: Option<String>,
}

/// Persisted key-value fallback with change notification
pub trait FallbackStore: Send + Sync + Debug {
    /// Read a value
    fn get(&self, key: &str) -> Option<String>;

    /// Write or clear a value
    ///
    /// # Errors
    /// Returns [`StoreError`] if the value could not be persisted.
    fn set(&self, key: &str, value: Option<&str>, origin: ChangeOrigin) -> Result<(), StoreError>;

    /// Subscribe to out-of-band changes
    fn subscribe(&self) -> broadcast::Receiver<FallbackChange>;
}

/// Applies a write to `values`, returning the change to broadcast
fn apply(
    values: &mut BTreeMap<String, String>,
    key: &str,
    value: Option<&str>,
    origin: ChangeOrigin,
) -> Option<FallbackChange> {
    let previous = match value {
        Some(v) => values.insert(key.to_string(), v.to_string()),
        None => values.remove(key),
    };
    let changed = previous.as_deref() != value;
    (changed && origin == ChangeOrigin::External).then(|| FallbackChange {
        key: key.to_string(),
        value: value.map(str::to_string),
    })
}

/// In-memory fallback store
#[derive(Debug)]
pub struct MemoryFallbackStore {
    values: RwLock<BTreeMap<String, String>>,
    changes: broadcast::Sender<FallbackChange>,
}

impl Default for MemoryFallbackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFallbackStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            values: RwLock::new(BTreeMap::new()),
            changes,
        }
    }

    /// Create store with initial values
    #[must_use]
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        store
            .values
            .write()
            .extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        store
    }
}

impl FallbackStore for MemoryFallbackStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Option<&str>, origin: ChangeOrigin) -> Result<(), StoreError> {
        let change = apply(&mut self.values.write(), key, value, origin);
        if let Some(change) = change {
            // No subscribers is fine
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<FallbackChange> {
        self.changes.subscribe()
    }
}

/// JSON-file fallback store
///
/// The whole map is rewritten on every change through a sibling temp file and
/// a rename.
#[derive(Debug)]
pub struct FileFallbackStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
    changes: broadcast::Sender<FallbackChange>,
}

impl FileFallbackStore {
    /// Open a store, starting empty if the file does not exist
    ///
    /// # Errors
    /// Returns [`StoreError`] if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        tracing::debug!(path = %path.display(), entries = values.len(), "opened fallback store");

        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Ok(Self {
            path,
            values: RwLock::new(values),
            changes,
        })
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(values)?).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl FallbackStore for FileFallbackStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Option<&str>, origin: ChangeOrigin) -> Result<(), StoreError> {
        let change = {
            let mut values = self.values.write();
            if values.get(key).map(String::as_str) == value {
                return Ok(());
            }
            let change = apply(&mut values, key, value, origin);
            self.persist(&values)?;
            change
        };
        if let Some(change) = change {
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<FallbackChange> {
        self.changes.subscribe()
    }
}
