use crate::models::{GameCatalog, UserConfig};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;

/// File name of the user settings inside the config directory.
pub const SETTINGS_YAML: &str = "settings.yaml";

/// File name of the game catalog inside the config directory.
pub const GAMES_YAML: &str = "games.yaml";

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages two configuration files:
/// - User config (`settings.yaml`): Debug mode, log directory, link mode
/// - Game catalog (`games.yaml`): Every managed game, in insertion order
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
    games_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files
    ///
    /// # Returns
    /// A new ConfigManager instance
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join(SETTINGS_YAML),
            games_path: config_dir.join(GAMES_YAML),
            config_dir,
        })
    }

    /// Load the user configuration file.
    ///
    /// # Returns
    /// The loaded UserConfig, or default if file doesn't exist
    pub fn load_user_config(&self) -> Result<UserConfig> {
        self.load_or_default(&self.user_config_path, "user config")
    }

    /// Save the user configuration file.
    ///
    /// # Arguments
    /// * `config` - The UserConfig to save
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        self.save(&self.user_config_path, config, "user config")
    }

    /// Load the game catalog.
    ///
    /// # Returns
    /// The loaded GameCatalog, or an empty one if the file doesn't exist
    pub fn load_games(&self) -> Result<GameCatalog> {
        self.load_or_default(&self.games_path, "game catalog")
    }

    /// Save the game catalog.
    pub fn save_games(&self, catalog: &GameCatalog) -> Result<()> {
        self.save(&self.games_path, catalog, "game catalog")
    }

    fn load_or_default<T>(&self, path: &Utf8Path, label: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        if !path.exists() {
            tracing::debug!("No {} at {}, using defaults", label, path);
            return Ok(T::default());
        }

        let file_contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}: {}", label, path))?;

        let config: T = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse {}: {}", label, path))?;

        tracing::info!("Loaded {} from {}", label, path);
        Ok(config)
    }

    fn save<T: Serialize>(&self, path: &Utf8Path, value: &T, label: &str) -> Result<()> {
        let yaml_string = serde_yaml_ng::to_string(value)
            .with_context(|| format!("Failed to serialize {} to YAML", label))?;

        fs::write(path, yaml_string)
            .with_context(|| format!("Failed to write {}: {}", label, path))?;

        tracing::info!("Saved {} to {}", label, path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Default private state directory for a game id.
    pub fn default_state_dir(&self, game_id: &str) -> Utf8PathBuf {
        self.config_dir.join("games").join(game_id)
    }
}
