// Session module
//
// GameSession owns the engine state of one game and serializes every
// operation on it, running the blocking engine work off the async runtime
// and broadcasting events about what happened.

use crate::models::{Game, Mod, Plugin};
use crate::services::{
    ClearReport, DeployError, DeployReport, DeploymentEngine, LinkMode, PluginError,
    PluginRepository,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};

/// Events emitted while a session operation runs
///
/// Delivery is best effort: a lagging subscriber loses the oldest events and
/// nobody waits on a slow one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A deployment has acquired the session and is starting
    DeployStarted { total: usize },

    /// One mod has been fully linked
    ModDeployed {
        mod_name: String,
        ordinal: usize,
        total: usize,
    },

    /// Deployment finished successfully
    DeployFinished {
        files_linked: usize,
        files_overridden: usize,
        files_cached: usize,
    },

    /// The game directory has been restored
    Cleared { links_removed: usize, files_restored: usize },

    /// The plugin list changed (sync, toggle or reorder)
    PluginsChanged { enabled: usize, total: usize },

    /// An operation failed; the error itself is returned to the caller
    OperationFailed { operation: String, message: String },
}

/// Errors surfaced by [`GameSession`]
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("Game '{0}' has no plugin load order")]
    NoPlugins(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

struct Inner {
    engine: DeploymentEngine,
    plugins: Option<PluginRepository>,
}

/// Single-flight access to one game's deployment and plugin state
///
/// Every operation takes the session lock for its whole duration and runs
/// on tokio's blocking pool, so two deployments (or a deployment and a
/// plugin sync) on the same game never interleave. Cloning yields another
/// handle to the same session.
///
/// # Related Types
///
/// - [`DeploymentEngine`]: Deploy and Clear
/// - [`PluginRepository`]: Plugin sync, toggle and reorder
/// - [`SessionEvent`]: Broadcast via [`subscribe()`](Self::subscribe)
#[derive(Clone)]
pub struct GameSession {
    game: Arc<Game>,
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<SessionEvent>,
}

impl GameSession {
    /// Open the engine state for `game`.
    ///
    /// The plugin repository is only opened for games with a load order.
    ///
    /// # Arguments
    /// * `game` - The game to manage
    /// * `link_mode` - Link kind used by every deployment of this session
    pub async fn open(game: Game, link_mode: LinkMode) -> Result<Self, SessionError> {
        let game = Arc::new(game);
        let for_open = Arc::clone(&game);
        let inner = tokio::task::spawn_blocking(move || -> Result<Inner, SessionError> {
            let engine = DeploymentEngine::open(&for_open, link_mode)?;
            let plugins = if for_open.supports_plugins() {
                Some(PluginRepository::open(&for_open)?)
            } else {
                None
            };
            Ok(Inner { engine, plugins })
        })
        .await??;

        tracing::info!("Opened session for {} ({})", game.name, game.kind_label());
        let (events, _) = broadcast::channel(100);
        Ok(Self {
            game,
            inner: Arc::new(Mutex::new(inner)),
            events,
        })
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Run `op` on the blocking pool while holding the session lock.
    async fn run<F, R>(&self, operation: &str, op: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut Inner) -> Result<R, SessionError> + Send + 'static,
        R: Send + 'static,
    {
        let mut guard = Arc::clone(&self.inner).lock_owned().await;
        let result = match tokio::task::spawn_blocking(move || op(&mut guard)).await {
            Ok(result) => result,
            Err(join) => Err(SessionError::Join(join)),
        };

        if let Err(err) = &result {
            tracing::error!("{} failed for {}: {}", operation, self.game.name, err);
            // Ignore send errors - it's OK if no one is listening
            let _ = self.events.send(SessionEvent::OperationFailed {
                operation: operation.to_string(),
                message: err.to_string(),
            });
        }
        result
    }

    /// Restore the game directory, then deploy `mods` (lowest priority first)
    pub async fn deploy(&self, mods: Vec<Mod>) -> Result<DeployReport, SessionError> {
        let events = self.events.clone();
        self.run("deploy", move |inner| {
            let _ = events.send(SessionEvent::DeployStarted { total: mods.len() });
            let report = inner.engine.deploy(&mods, |progress| {
                let _ = events.send(SessionEvent::ModDeployed {
                    mod_name: progress.mod_name,
                    ordinal: progress.ordinal,
                    total: progress.total,
                });
            })?;
            let _ = events.send(SessionEvent::DeployFinished {
                files_linked: report.files_linked,
                files_overridden: report.files_overridden,
                files_cached: report.files_cached,
            });
            Ok(report)
        })
        .await
    }

    /// Remove every deployed link and restore displaced files
    pub async fn clear(&self) -> Result<ClearReport, SessionError> {
        let events = self.events.clone();
        self.run("clear", move |inner| {
            let report = inner.engine.clear()?;
            let _ = events.send(SessionEvent::Cleared {
                links_removed: report.links_removed,
                files_restored: report.files_restored,
            });
            Ok(report)
        })
        .await
    }

    /// Number of links currently recorded for this game
    pub async fn deployed_count(&self) -> usize {
        self.inner.lock().await.engine.deployed_count()
    }

    /// Sync and return the ordered plugin list
    pub async fn plugins(&self) -> Result<Vec<Plugin>, SessionError> {
        let name = self.game.name.clone();
        let events = self.events.clone();
        self.run("plugin sync", move |inner| {
            let repo = inner.plugins.as_mut().ok_or(SessionError::NoPlugins(name))?;
            let report = repo.sync()?;
            let plugins = repo.plugins().to_vec();
            if !report.added.is_empty() || !report.removed.is_empty() || report.reordered {
                let _ = events.send(plugins_changed(&plugins));
            }
            Ok(plugins)
        })
        .await
    }

    /// Enable or disable a plugin by exact name
    ///
    /// # Returns
    /// `false` if the plugin is not in the list
    pub async fn update_plugin(&self, name: String, enabled: bool) -> Result<bool, SessionError> {
        let game_name = self.game.name.clone();
        let events = self.events.clone();
        self.run("plugin update", move |inner| {
            let repo = inner.plugins.as_mut().ok_or(SessionError::NoPlugins(game_name))?;
            let found = repo.update_plugin(&name, enabled)?;
            if found {
                let _ = events.send(plugins_changed(repo.plugins()));
            }
            Ok(found)
        })
        .await
    }

    /// Move a plugin from `old_index` to `new_index` (remove then insert)
    pub async fn reorder_plugin(
        &self,
        old_index: usize,
        new_index: usize,
    ) -> Result<(), SessionError> {
        let game_name = self.game.name.clone();
        let events = self.events.clone();
        self.run("plugin reorder", move |inner| {
            let repo = inner.plugins.as_mut().ok_or(SessionError::NoPlugins(game_name))?;
            repo.reorder_by_indices(old_index, new_index)?;
            let _ = events.send(plugins_changed(repo.plugins()));
            Ok(())
        })
        .await
    }
}

fn plugins_changed(plugins: &[Plugin]) -> SessionEvent {
    SessionEvent::PluginsChanged {
        enabled: plugins.iter().filter(|plugin| plugin.is_enabled).count(),
        total: plugins.len(),
    }
}
