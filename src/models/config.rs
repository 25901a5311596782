use crate::models::Game;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// User configuration from `settings.yaml`
///
/// Contains process-wide preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "Settings", default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,

    #[serde(rename = "Log Directory", default = "default_log_dir")]
    pub log_dir: String,

    #[serde(rename = "Link Mode", default)]
    pub link_mode: LinkPreference,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            log_dir: default_log_dir(),
            link_mode: LinkPreference::Auto,
        }
    }
}

fn default_log_dir() -> String {
    "logs".to_string()
}

/// How deployment links are created.
///
/// `Auto` picks hard links on Windows and symbolic links elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPreference {
    #[default]
    Auto,
    Hardlink,
    Symlink,
}

/// Game catalog from `games.yaml`, keyed by game id in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameCatalog {
    #[serde(rename = "Games", default)]
    pub games: IndexMap<String, Game>,
}

impl GameCatalog {
    pub fn get(&self, id: &str) -> Option<&Game> {
        self.games.get(id)
    }

    /// Insert or replace a game, keeping the original position on replace.
    pub fn upsert(&mut self, game: Game) {
        self.games.insert(game.id.clone(), game);
    }

    pub fn remove(&mut self, id: &str) -> Option<Game> {
        self.games.shift_remove(id)
    }
}
