use crate::models::{Game, LinkPreference, Mod};
use crate::store::{CacheStore, DeployJournal, LinkStore, StoreError, utf8_path};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use thiserror::Error;
use walkdir::WalkDir;

/// How a mod file is made visible in the game directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkMode {
    Hardlink,
    Symlink,
}

impl LinkMode {
    /// Hard links on Windows (no symlink privilege needed), symbolic links
    /// everywhere else.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            LinkMode::Hardlink
        } else {
            LinkMode::Symlink
        }
    }

    pub fn from_preference(preference: LinkPreference) -> Self {
        match preference {
            LinkPreference::Auto => Self::platform_default(),
            LinkPreference::Hardlink => LinkMode::Hardlink,
            LinkPreference::Symlink => LinkMode::Symlink,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LinkMode::Hardlink => "hardlink",
            LinkMode::Symlink => "symlink",
        }
    }
}

/// Progress notification raised after each mod is fully linked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployProgress {
    pub mod_name: String,
    /// Zero-based position of the mod in processing order.
    pub ordinal: usize,
    pub total: usize,
}

/// Summary of a completed deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub mods_deployed: usize,
    pub files_linked: usize,
    /// Links from a lower-priority mod replaced by a higher-priority one.
    pub files_overridden: usize,
    /// Pre-existing game files moved into the cache.
    pub files_cached: usize,
    pub link_mode: LinkMode,
}

/// Summary of a completed restore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub links_removed: usize,
    /// Recorded links that were already gone.
    pub links_missing: usize,
    pub files_restored: usize,
    /// Directories created by deployment and removed once empty.
    pub directories_removed: usize,
}

/// Errors that can occur during deployment or restore
#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Destination exists as a directory: {0}")]
    DestinationIsDirectory(Utf8PathBuf),

    #[error("Content root of mod '{name}' not found: {path}")]
    ModRootMissing { name: String, path: Utf8PathBuf },

    #[error("Symbolic links are not supported on this platform")]
    SymlinkUnsupported,
}

fn io_error(action: &'static str, path: &Utf8Path) -> impl FnOnce(io::Error) -> DeployError {
    let path = path.to_path_buf();
    move |source| DeployError::Io {
        action,
        path,
        source,
    }
}

/// Overlays ordered mod directories onto one game directory with links and
/// restores it losslessly.
///
/// State is loaded once at [`open`](Self::open): the link store, the cache
/// directory and any journal entries left by an interrupted deployment.
///
/// # Ordering guarantee
///
/// The link store and journal are always written no later than the
/// filesystem change they describe, so [`clear`](Self::clear) can return the
/// game directory to a clean state after any failure.
#[derive(Debug)]
pub struct DeploymentEngine {
    game_dir: Utf8PathBuf,
    links: LinkStore,
    cache: CacheStore,
    journal: DeployJournal,
    link_mode: LinkMode,
}

impl DeploymentEngine {
    /// Load deployment state for `game`.
    ///
    /// Journal entries from an interrupted deployment are folded into the
    /// link store before returning.
    pub fn open(game: &Game, link_mode: LinkMode) -> Result<Self, DeployError> {
        fs::create_dir_all(&game.state_dir).map_err(io_error("create", &game.state_dir))?;
        let game_dir = absolute(&game.game_dir)?;

        let mut links = LinkStore::open(game.deployed_files_path())?;
        let cache = CacheStore::open(game.cache_dir())?;
        let mut journal = DeployJournal::new(game.journal_path());

        let pending = journal.pending_paths()?;
        if !pending.is_empty() {
            tracing::warn!(
                "Recovering {} journaled paths from an interrupted deployment of {}",
                pending.len(),
                game.name
            );
            for path in pending {
                links.insert(path);
            }
            links.save()?;
            journal.truncate()?;
        }

        tracing::debug!(
            "Deployment engine ready for {}: {} recorded links, mode={}",
            game.name,
            links.len(),
            link_mode.label()
        );

        Ok(Self {
            game_dir,
            links,
            cache,
            journal,
            link_mode,
        })
    }

    pub fn link_mode(&self) -> LinkMode {
        self.link_mode
    }

    pub fn game_dir(&self) -> &Utf8Path {
        &self.game_dir
    }

    /// Paths currently recorded as created by the engine.
    pub fn deployed_paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.links.iter()
    }

    pub fn deployed_count(&self) -> usize {
        self.links.len()
    }

    /// Restore the game directory, then link `mods` into it.
    ///
    /// `mods` is ordered lowest priority first. Mods are applied in that
    /// order and a later mod replaces any link an earlier one made for the
    /// same relative path, so the highest-priority file wins.
    ///
    /// # Arguments
    /// * `mods` - Enabled mods in ascending priority
    /// * `on_progress` - Called once per mod after its files are linked and
    ///   the link store is persisted
    ///
    /// # Errors
    ///
    /// Any filesystem failure aborts the deployment. Everything done up to
    /// that point is recorded, so [`clear`](Self::clear) can undo it.
    pub fn deploy<F>(
        &mut self,
        mods: &[Mod],
        mut on_progress: F,
    ) -> Result<DeployReport, DeployError>
    where
        F: FnMut(DeployProgress),
    {
        self.clear()?;

        let total = mods.len();
        let mut report = DeployReport {
            mods_deployed: 0,
            files_linked: 0,
            files_overridden: 0,
            files_cached: 0,
            link_mode: self.link_mode,
        };

        tracing::info!(
            "Deploying {} mods into {} using {} links",
            total,
            self.game_dir,
            self.link_mode.label()
        );

        for (ordinal, entry) in mods.iter().enumerate() {
            let linked = self.link_mod(entry, &mut report)?;
            self.links.save()?;
            self.journal.truncate()?;
            report.mods_deployed += 1;

            tracing::info!(
                "Deployed mod {} ({}/{}): {} files",
                entry.name,
                ordinal + 1,
                total,
                linked
            );
            on_progress(DeployProgress {
                mod_name: entry.name.clone(),
                ordinal,
                total,
            });
        }

        tracing::info!(
            "Deployment complete: {} files linked, {} overridden, {} cached",
            report.files_linked,
            report.files_overridden,
            report.files_cached
        );
        Ok(report)
    }

    fn link_mod(&mut self, entry: &Mod, report: &mut DeployReport) -> Result<usize, DeployError> {
        let mod_root = absolute(&entry.path)?;
        if !mod_root.is_dir() {
            return Err(DeployError::ModRootMissing {
                name: entry.name.clone(),
                path: mod_root,
            });
        }

        let mut linked = 0;
        for walked in WalkDir::new(&mod_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|walked| {
                let relative = walked
                    .path()
                    .strip_prefix(&mod_root)
                    .unwrap_or(walked.path());
                !is_ignored_deploy_path(relative)
            })
        {
            let walked = walked.map_err(|err| DeployError::Io {
                action: "walk",
                path: mod_root.clone(),
                source: io::Error::other(err),
            })?;
            if !walked.file_type().is_file() {
                continue;
            }

            let source = utf8_path(walked.into_path())?;
            let relative = source
                .strip_prefix(&mod_root)
                .map_err(|_| DeployError::Io {
                    action: "resolve",
                    path: source.clone(),
                    source: io::Error::other("file outside mod root"),
                })?
                .to_path_buf();
            let dest = self.game_dir.join(&relative);

            if self.links.contains(&dest) {
                if dest.is_dir() {
                    return Err(DeployError::DestinationIsDirectory(dest));
                }
                remove_if_present(&dest)?;
                report.files_overridden += 1;
                tracing::debug!("{} overrides {}", entry.name, dest);
            } else {
                match fs::symlink_metadata(&dest) {
                    Ok(meta) if meta.is_dir() => {
                        return Err(DeployError::DestinationIsDirectory(dest));
                    }
                    Ok(_) => {
                        self.cache.stash(&dest, &relative)?;
                        report.files_cached += 1;
                    }
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => return Err(io_error("stat", &dest)(err)),
                }
            }

            self.create_parent_dirs(&dest)?;
            self.journal.record_link(&dest)?;
            create_link(&source, &dest, self.link_mode)?;
            self.links.insert(dest);

            linked += 1;
            report.files_linked += 1;
        }

        Ok(linked)
    }

    /// Create the missing ancestors of `dest` one level at a time, recording
    /// each so that `clear` can remove it again.
    fn create_parent_dirs(&mut self, dest: &Utf8Path) -> Result<(), DeployError> {
        let mut missing = Vec::new();
        let mut current = dest.parent();
        while let Some(dir) = current {
            if dir == self.game_dir || dir.exists() {
                break;
            }
            missing.push(dir.to_path_buf());
            current = dir.parent();
        }

        for dir in missing.into_iter().rev() {
            self.journal.record_dir(&dir)?;
            fs::create_dir(&dir).map_err(io_error("create", &dir))?;
            self.links.insert(dir);
        }
        Ok(())
    }

    /// Delete every recorded link, remove the directories deployment
    /// created once they are empty, empty the link store, then move every
    /// cached file back into the game directory and empty the cache.
    ///
    /// Safe to call when nothing is deployed.
    pub fn clear(&mut self) -> Result<ClearReport, DeployError> {
        for path in self.journal.pending_paths()? {
            self.links.insert(path);
        }

        let mut report = ClearReport::default();
        let mut directories = Vec::new();
        for path in self.links.iter() {
            match fs::symlink_metadata(path) {
                Ok(meta) if meta.is_dir() => directories.push(path),
                Ok(_) => {
                    fs::remove_file(path).map_err(io_error("remove", path))?;
                    report.links_removed += 1;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!("Recorded link already gone: {}", path);
                    report.links_missing += 1;
                }
                Err(err) => return Err(io_error("stat", path)(err)),
            }
        }

        // Recorded parent first, so children go first in reverse
        for dir in directories.into_iter().rev() {
            match fs::remove_dir(dir) {
                Ok(()) => report.directories_removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) if err.kind() == io::ErrorKind::DirectoryNotEmpty => {
                    tracing::warn!(
                        "Leaving {} in place: it holds files not created by deployment",
                        dir
                    );
                }
                Err(err) => return Err(io_error("remove", dir)(err)),
            }
        }

        self.links.clear();
        self.links.save()?;
        self.journal.truncate()?;

        report.files_restored = self.cache.restore_into(&self.game_dir)?;

        if report.links_removed > 0 || report.files_restored > 0 {
            tracing::info!(
                "Cleared deployment: {} links removed, {} files restored",
                report.links_removed,
                report.files_restored
            );
        }
        Ok(report)
    }
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, DeployError> {
    let absolute = std::path::absolute(path).map_err(io_error("resolve", path))?;
    Ok(utf8_path(absolute)?)
}

fn remove_if_present(path: &Utf8Path) -> Result<(), DeployError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error("remove", path)(err)),
    }
}

fn create_link(source: &Utf8Path, dest: &Utf8Path, mode: LinkMode) -> Result<(), DeployError> {
    match mode {
        LinkMode::Hardlink => fs::hard_link(source, dest).map_err(io_error("hard link", dest)),
        LinkMode::Symlink => create_symlink(source, dest),
    }
}

#[cfg(unix)]
fn create_symlink(source: &Utf8Path, dest: &Utf8Path) -> Result<(), DeployError> {
    std::os::unix::fs::symlink(source, dest).map_err(io_error("symlink", dest))
}

#[cfg(windows)]
fn create_symlink(source: &Utf8Path, dest: &Utf8Path) -> Result<(), DeployError> {
    std::os::windows::fs::symlink_file(source, dest).map_err(io_error("symlink", dest))
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_source: &Utf8Path, _dest: &Utf8Path) -> Result<(), DeployError> {
    Err(DeployError::SymlinkUnsupported)
}

fn is_ignored_deploy_path(path: &std::path::Path) -> bool {
    path.components().any(|component| {
        let part = component.as_os_str().to_string_lossy();
        part.eq_ignore_ascii_case("__MACOSX")
            || part.eq_ignore_ascii_case(".ds_store")
            || part.eq_ignore_ascii_case("thumbs.db")
            || part == ".git"
            || part == ".svn"
    })
}
