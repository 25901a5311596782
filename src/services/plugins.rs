use crate::models::{BgsVariant, Game, Plugin};
use crate::models::game::{LOADORDER_TXT, PLUGINS_TXT};
use crate::services::load_order::{self, TxtEntry};
use crate::store::{CorruptPolicy, JsonListStore, LoadOrigin, StoreError, write_atomic};
use camino::{Utf8Path, Utf8PathBuf};
use filetime::FileTime;
use std::fs;
use std::io;
use std::time::SystemTime;
use thiserror::Error;

/// Errors raised by the plugin repository
#[derive(Error, Debug)]
pub enum PluginError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Plugin index {index} out of range for {len} plugins")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Game '{0}' has no plugin load order")]
    Unsupported(String),
}

/// What a sync pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Whether enabled plugins were reordered to match `plugins.txt`.
    pub reordered: bool,
}

/// The authoritative ordered plugin list of one Bethesda-style game.
///
/// The list lives in `plugins.json` in the game's state directory. Every
/// persist also projects the enabled subsequence into `plugins.txt`,
/// `loadorder.txt` and the plugin files' modification times, so engines and
/// tools that read any of the three see the same order.
#[derive(Debug)]
pub struct PluginRepository {
    data_dir: Utf8PathBuf,
    plugins_txt: Utf8PathBuf,
    loadorder_txt: Utf8PathBuf,
    variant: BgsVariant,
    store: JsonListStore<Plugin>,
    plugins: Vec<Plugin>,
}

impl PluginRepository {
    /// Load the plugin list for `game`.
    ///
    /// A missing `plugins.json` is created from `plugins.txt`. A corrupt one
    /// is deleted and rebuilt the same way.
    ///
    /// # Errors
    /// [`PluginError::Unsupported`] if the game has no plugin load order.
    pub fn open(game: &Game) -> Result<Self, PluginError> {
        let (Some(app_data_dir), Some(variant)) = (game.app_data_dir(), game.bgs_variant()) else {
            return Err(PluginError::Unsupported(game.name.clone()));
        };

        fs::create_dir_all(&game.state_dir).map_err(|source| PluginError::Io {
            action: "create",
            path: game.state_dir.clone(),
            source,
        })?;

        let plugins_txt = app_data_dir.join(PLUGINS_TXT);
        let store = JsonListStore::new(game.plugins_json_path());
        let loaded = store.load_or_init::<PluginError, _>(CorruptPolicy::Rebuild, || {
            let entries = read_plugins_txt(&plugins_txt, variant)?;
            Ok(load_order::plugins_from_txt(&entries))
        })?;

        match loaded.origin {
            LoadOrigin::Existing => {}
            LoadOrigin::Initialized => {
                tracing::info!("Created plugin list for {} from {}", game.name, plugins_txt)
            }
            LoadOrigin::Rebuilt => {
                tracing::warn!("Rebuilt corrupt plugin list for {} from {}", game.name, plugins_txt)
            }
        }

        Ok(Self {
            data_dir: game.game_dir.clone(),
            loadorder_txt: app_data_dir.join(LOADORDER_TXT),
            plugins_txt,
            variant,
            store,
            plugins: loaded.items,
        })
    }

    /// The list as last loaded or persisted, without syncing.
    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    pub fn variant(&self) -> BgsVariant {
        self.variant
    }

    /// Sync against the data directory and `plugins.txt`, then return the
    /// ordered list.
    pub fn get_plugins(&mut self) -> Result<&[Plugin], PluginError> {
        self.sync()?;
        Ok(&self.plugins)
    }

    /// Set a plugin's enabled flag and persist.
    ///
    /// # Returns
    /// `false` if no plugin has that exact name
    pub fn update_plugin(&mut self, name: &str, enabled: bool) -> Result<bool, PluginError> {
        let Some(plugin) = self.plugins.iter_mut().find(|plugin| plugin.name == name) else {
            tracing::debug!("Plugin not found: {}", name);
            return Ok(false);
        };
        plugin.is_enabled = enabled;
        tracing::info!("{} plugin {}", if enabled { "Enabled" } else { "Disabled" }, name);
        self.persist()?;
        Ok(true)
    }

    /// Move the plugin at `old_index` to `new_index` (remove then insert)
    /// and persist.
    pub fn reorder_by_indices(
        &mut self,
        old_index: usize,
        new_index: usize,
    ) -> Result<(), PluginError> {
        let len = self.plugins.len();
        if !load_order::move_entry(&mut self.plugins, old_index, new_index) {
            return Err(PluginError::IndexOutOfRange {
                index: old_index.max(new_index),
                len,
            });
        }
        tracing::info!("Moved plugin from position {} to {}", old_index, new_index);
        self.persist()
    }

    /// Reconcile the list with the plugin files on disk and with external
    /// edits to `plugins.txt`, then persist once.
    ///
    /// `plugins.txt` is read before anything is written so that an external
    /// tool's reorder is seen before this pass overwrites it.
    pub fn sync(&mut self) -> Result<SyncReport, PluginError> {
        let external = read_plugins_txt(&self.plugins_txt, self.variant)?;
        let on_disk = self.scan_data_dir()?;

        let reconciled = load_order::reconcile(std::mem::take(&mut self.plugins), &on_disk);
        self.plugins = reconciled.plugins;

        let txt_order: Vec<&str> = external.iter().map(|entry| entry.name.as_str()).collect();
        let reordered = load_order::absorb_external_order(&mut self.plugins, &txt_order);

        for name in &reconciled.added {
            tracing::info!("New plugin found: {}", name);
        }
        for name in &reconciled.removed {
            tracing::info!("Plugin no longer present: {}", name);
        }
        if reordered {
            tracing::info!("Absorbed external load order from {}", self.plugins_txt);
        }

        self.persist()?;
        Ok(SyncReport {
            added: reconciled.added,
            removed: reconciled.removed,
            reordered,
        })
    }

    /// Plugin files in the data directory, newest first.
    fn scan_data_dir(&self) -> Result<Vec<Plugin>, PluginError> {
        let entries = fs::read_dir(&self.data_dir).map_err(|source| PluginError::Io {
            action: "read",
            path: self.data_dir.clone(),
            source,
        })?;

        let mut found: Vec<(SystemTime, Plugin)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PluginError::Io {
                action: "read",
                path: self.data_dir.clone(),
                source,
            })?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(plugin) = Plugin::from_file_name(&name) else {
                continue;
            };
            // Follows links, so deployed plugins count.
            let meta = match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    tracing::warn!("Skipping dangling plugin link: {}", name);
                    continue;
                }
                Err(source) => {
                    return Err(PluginError::Io {
                        action: "stat",
                        path: self.data_dir.join(&name),
                        source,
                    });
                }
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, plugin));
        }

        found.sort_by(|(a_time, a), (b_time, b)| {
            b_time.cmp(a_time).then_with(|| a.name.cmp(&b.name))
        });
        Ok(found.into_iter().map(|(_, plugin)| plugin).collect())
    }

    /// Write the JSON list, both text files and the enabled plugins'
    /// modification times.
    fn persist(&mut self) -> Result<(), PluginError> {
        load_order::assign_indices(&mut self.plugins);
        self.store.save(&self.plugins)?;

        let uses_marker = self.variant.uses_enabled_marker();
        write_atomic(
            &self.plugins_txt,
            load_order::render_plugins_txt(&self.plugins, uses_marker).as_bytes(),
        )?;
        write_atomic(
            &self.loadorder_txt,
            load_order::render_loadorder_txt(&self.plugins).as_bytes(),
        )?;

        for (position, plugin) in load_order::enabled(&self.plugins).enumerate() {
            let path = plugin.file_path(&self.data_dir);
            let mtime = FileTime::from_unix_time(load_order::timestamp_for(position), 0);
            match filetime::set_file_mtime(&path, mtime) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    tracing::warn!("Cannot timestamp missing plugin file {}", path);
                }
                Err(source) => {
                    return Err(PluginError::Io {
                        action: "set modification time of",
                        path,
                        source,
                    });
                }
            }
        }

        tracing::debug!("Persisted {} plugins to {}", self.plugins.len(), self.store.path());
        Ok(())
    }
}

fn read_plugins_txt(path: &Utf8Path, variant: BgsVariant) -> Result<Vec<TxtEntry>, PluginError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(load_order::parse_plugins_txt(&raw, variant.uses_enabled_marker())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(PluginError::Io {
            action: "read",
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameKind;
    use tempfile::TempDir;

    fn game_in(dir: &TempDir, variant: BgsVariant) -> Game {
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("Data")).unwrap();
        fs::create_dir_all(root.join("AppData")).unwrap();
        Game::new(
            "g",
            "Test Game",
            root.join("Data"),
            root.join("state"),
            GameKind::Bgs {
                variant,
                app_data_dir: root.join("AppData"),
            },
        )
    }

    #[test]
    fn test_generic_game_is_unsupported() {
        let game = Game::new("g", "Generic", "/nope", "/nope-state", GameKind::Generic);
        assert!(matches!(PluginRepository::open(&game), Err(PluginError::Unsupported(_))));
    }

    #[test]
    fn test_open_without_any_files_is_empty() {
        let dir = TempDir::new().unwrap();
        let game = game_in(&dir, BgsVariant::PostSkyrim);
        let repo = PluginRepository::open(&game).unwrap();
        assert!(repo.plugins().is_empty());
        assert!(game.plugins_json_path().exists());
    }

    #[test]
    fn test_update_unknown_plugin_returns_false() {
        let dir = TempDir::new().unwrap();
        let game = game_in(&dir, BgsVariant::Classic);
        let mut repo = PluginRepository::open(&game).unwrap();
        assert!(!repo.update_plugin("Missing.esp", false).unwrap());
    }

    #[test]
    fn test_reorder_out_of_range() {
        let dir = TempDir::new().unwrap();
        let game = game_in(&dir, BgsVariant::Classic);
        fs::write(game.game_dir.join("A.esp"), "").unwrap();
        let mut repo = PluginRepository::open(&game).unwrap();
        repo.sync().unwrap();

        let result = repo.reorder_by_indices(0, 5);
        assert!(matches!(result, Err(PluginError::IndexOutOfRange { index: 5, len: 1 })));
    }
}
