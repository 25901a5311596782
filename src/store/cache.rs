use super::{StoreError, utf8_path};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use walkdir::WalkDir;

/// Staging tree for game files displaced by a deployment.
///
/// A displaced file is stored at the same relative path it had under the
/// game directory, so the tree itself is the record of what to restore.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: Utf8PathBuf,
}

impl CacheStore {
    /// Open the cache at `root`, creating the directory if needed.
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| StoreError::io("create", &root, err))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Move `source` into the cache under `relative`.
    ///
    /// # Returns
    /// The path of the cached copy
    pub fn stash(&self, source: &Utf8Path, relative: &Utf8Path) -> Result<Utf8PathBuf, StoreError> {
        let cached = self.root.join(relative);
        if let Some(parent) = cached.parent() {
            fs::create_dir_all(parent).map_err(|err| StoreError::io("create", parent, err))?;
        }
        move_file(source, &cached)?;
        tracing::debug!("Cached {} -> {}", source, cached);
        Ok(cached)
    }

    /// Every cached file, as paths under the cache root.
    pub fn files(&self) -> Result<Vec<Utf8PathBuf>, StoreError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false).min_depth(1) {
            let entry = entry.map_err(|err| {
                let path = err
                    .path()
                    .and_then(Utf8Path::from_path)
                    .map(Utf8Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone());
                StoreError::io("walk", &path, io::Error::other(err))
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            files.push(utf8_path(entry.into_path())?);
        }
        files.sort();
        Ok(files)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.files()?.is_empty())
    }

    /// Move every cached file back to its relative location under
    /// `game_dir`, overwriting whatever is there, then empty the cache.
    ///
    /// # Returns
    /// Number of files restored
    pub fn restore_into(&self, game_dir: &Utf8Path) -> Result<usize, StoreError> {
        let files = self.files()?;
        for cached in &files {
            let relative = cached
                .strip_prefix(&self.root)
                .map_err(|_| {
                    StoreError::io("resolve", cached, io::Error::other("outside cache root"))
                })?;
            let dest = game_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|err| StoreError::io("create", parent, err))?;
            }
            if let Ok(meta) = fs::symlink_metadata(&dest) {
                if meta.is_dir() {
                    return Err(StoreError::io(
                        "restore",
                        &dest,
                        io::Error::other("destination is a directory"),
                    ));
                }
                fs::remove_file(&dest).map_err(|err| StoreError::io("remove", &dest, err))?;
            }
            move_file(cached, &dest)?;
            tracing::debug!("Restored {}", dest);
        }

        fs::remove_dir_all(&self.root).map_err(|err| StoreError::io("empty", &self.root, err))?;
        fs::create_dir_all(&self.root).map_err(|err| StoreError::io("create", &self.root, err))?;
        Ok(files.len())
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Utf8Path, to: &Utf8Path) -> Result<(), StoreError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to).map_err(|err| StoreError::io("copy", from, err))?;
            fs::remove_file(from).map_err(|err| StoreError::io("remove", from, err))
        }
        Err(err) => Err(StoreError::io("move", from, err)),
    }
}
