//! Persisted state for one game instance.
//!
//! Every piece of engine state lives in the game's private state directory:
//! - [`JsonListStore`]: a JSON array file of one record type, loaded once per
//!   session through [`JsonListStore::load_or_init`] and saved atomically
//! - [`LinkStore`]: the set of paths the engine created in the game directory
//! - [`CacheStore`]: the staging tree of displaced pre-existing files
//! - [`DeployJournal`]: write-ahead log of links about to be created
//!
//! Array order in every JSON file is meaningful and preserved exactly.

pub mod cache;
pub mod journal;
pub mod links;

pub use cache::CacheStore;
pub use journal::{DeployJournal, JournalEntry};
pub use links::LinkStore;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing persisted state
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt state file {path}: {source}")]
    Corrupt {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: &Utf8Path, source: io::Error) -> Self {
        StoreError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What to do when a state file exists but does not parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptPolicy {
    /// Surface [`StoreError::Corrupt`] and leave the file untouched.
    Fail,
    /// Delete the file and rebuild it from the initializer.
    Rebuild,
}

/// Where the records returned by [`JsonListStore::load_or_init`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    Existing,
    Initialized,
    Rebuilt,
}

/// Typed result of a load-or-initialize call
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    pub origin: LoadOrigin,
}

/// A JSON array of `T` persisted at a fixed path.
pub struct JsonListStore<T> {
    path: Utf8PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonListStore<T> {
    fn clone(&self) -> Self {
        Self::new(self.path.clone())
    }
}

impl<T> std::fmt::Debug for JsonListStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonListStore").field("path", &self.path).finish()
    }
}

impl<T> JsonListStore<T> {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl<T: Serialize + DeserializeOwned> JsonListStore<T> {
    /// Read the file, or `None` if it does not exist.
    pub fn read(&self) -> Result<Option<Vec<T>>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io("read", &self.path, err)),
        };
        let items = serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(items))
    }

    /// Load the persisted records, creating the file from `init` when it is
    /// missing (or corrupt, under [`CorruptPolicy::Rebuild`]).
    ///
    /// # Arguments
    /// * `policy` - Handling of a file that exists but fails to parse
    /// * `init` - Produces the initial records; only called when needed
    ///
    /// # Returns
    /// The records together with the [`LoadOrigin`] they came from
    pub fn load_or_init<E, F>(&self, policy: CorruptPolicy, init: F) -> Result<Loaded<T>, E>
    where
        E: From<StoreError>,
        F: FnOnce() -> Result<Vec<T>, E>,
    {
        let origin = match self.read() {
            Ok(Some(items)) => {
                return Ok(Loaded {
                    items,
                    origin: LoadOrigin::Existing,
                });
            }
            Ok(None) => LoadOrigin::Initialized,
            Err(StoreError::Corrupt { path, source }) if policy == CorruptPolicy::Rebuild => {
                tracing::warn!("Discarding corrupt state file {}: {}", path, source);
                self.remove()?;
                LoadOrigin::Rebuilt
            }
            Err(err) => return Err(err.into()),
        };

        let items = init()?;
        self.save(&items)?;
        tracing::debug!("Initialized {} with {} records", self.path, items.len());
        Ok(Loaded { items, origin })
    }

    /// Write all records, replacing the file atomically.
    pub fn save(&self, items: &[T]) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(items).map_err(|source| StoreError::Serialize {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, raw.as_bytes())
    }

    /// Delete the file if present.
    pub fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::io("remove", &self.path, err)),
        }
    }
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
pub(crate) fn write_atomic(path: &Utf8Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| StoreError::io("create", parent, err))?;
        }
    }
    let temp = Utf8PathBuf::from(format!("{path}.tmp"));
    fs::write(&temp, contents).map_err(|err| StoreError::io("write", &temp, err))?;
    fs::rename(&temp, path).map_err(|err| StoreError::io("replace", path, err))?;
    Ok(())
}

pub(crate) fn utf8_path(path: PathBuf) -> Result<Utf8PathBuf, StoreError> {
    Utf8PathBuf::from_path_buf(path).map_err(StoreError::NonUtf8Path)
}
