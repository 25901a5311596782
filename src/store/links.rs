use super::{CorruptPolicy, JsonListStore, StoreError};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

/// Whether the platform's default filesystems ignore case in file names.
pub const CASE_INSENSITIVE_PATHS: bool = cfg!(any(windows, target_os = "macos"));

/// The persisted record of every path the engine created in the game
/// directory.
///
/// This is the only source of truth for what the engine may delete. Entries
/// keep their creation order and the spelling they were first recorded with.
/// With case folding on, two spellings of one path are the same entry.
#[derive(Debug)]
pub struct LinkStore {
    store: JsonListStore<Utf8PathBuf>,
    paths: IndexMap<String, Utf8PathBuf>,
    fold_case: bool,
}

impl LinkStore {
    /// Load the store from `path`, creating an empty one if missing.
    ///
    /// A store that fails to parse is an error: without it there is no safe
    /// way to tell engine links from user files.
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_case_folding(path, CASE_INSENSITIVE_PATHS)
    }

    /// Like [`open`](Self::open), with explicit control over whether lookups
    /// ignore case.
    pub fn open_with_case_folding(
        path: impl Into<Utf8PathBuf>,
        fold_case: bool,
    ) -> Result<Self, StoreError> {
        let store = JsonListStore::new(path);
        let loaded =
            store.load_or_init::<StoreError, _>(CorruptPolicy::Fail, || Ok(Vec::new()))?;
        let mut links = Self {
            store,
            paths: IndexMap::new(),
            fold_case,
        };
        for path in loaded.items {
            links.insert(path);
        }
        Ok(links)
    }

    fn key(&self, path: &Utf8Path) -> String {
        if self.fold_case {
            path.as_str().to_lowercase()
        } else {
            path.as_str().to_string()
        }
    }

    pub fn path(&self) -> &Utf8Path {
        self.store.path()
    }

    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.paths.contains_key(&self.key(path))
    }

    /// Record a path; returns `false` if it was already recorded.
    pub fn insert(&mut self, path: Utf8PathBuf) -> bool {
        let key = self.key(&path);
        if self.paths.contains_key(&key) {
            return false;
        }
        self.paths.insert(key, path);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utf8Path> {
        self.paths.values().map(Utf8PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Forget every path in memory. Call [`save`](Self::save) to persist.
    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let paths: Vec<Utf8PathBuf> = self.paths.values().cloned().collect();
        self.store.save(&paths)
    }
}
