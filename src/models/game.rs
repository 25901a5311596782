use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// File name of the link store inside a game's state directory.
pub const DEPLOYED_FILES_JSON: &str = "deployed_files.json";

/// File name of the persisted plugin list inside a game's state directory.
pub const PLUGINS_JSON: &str = "plugins.json";

/// File name of the mod catalog inside a game's state directory.
pub const MODS_JSON: &str = "mods.json";

/// File name of the deployment write-ahead journal.
pub const DEPLOY_JOURNAL: &str = "deploy_journal.jsonl";

/// Engine-consumed plugin list in the game's app data directory.
pub const PLUGINS_TXT: &str = "plugins.txt";

/// Tool-consumed load order list in the game's app data directory.
pub const LOADORDER_TXT: &str = "loadorder.txt";

/// Plugin text file dialect of a Bethesda-style game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BgsVariant {
    /// Oblivion, Fallout 3, Fallout New Vegas: `plugins.txt` holds bare names.
    Classic,
    /// Skyrim SE, Fallout 4 and later: enabled entries carry a `*` marker.
    PostSkyrim,
}

impl BgsVariant {
    /// Whether enabled lines in `plugins.txt` are written as `*Name.esp`.
    pub fn uses_enabled_marker(self) -> bool {
        matches!(self, BgsVariant::PostSkyrim)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BgsVariant::Classic => "bgs",
            BgsVariant::PostSkyrim => "bgs-post-skyrim",
        }
    }
}

/// What kind of game a [`Game`] is.
///
/// Only Bethesda-style games carry a plugin load order; everything else is
/// deployment only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameKind {
    Generic,
    Bgs {
        variant: BgsVariant,
        /// Directory holding `plugins.txt` and `loadorder.txt`.
        app_data_dir: Utf8PathBuf,
    },
}

/// A managed game instance.
///
/// Holds the filesystem roots the deployment engine and plugin repository
/// operate on. `game_dir` is the deployment target; for Bethesda-style games
/// it is the `Data` folder, which is also where plugin files are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
    pub game_dir: Utf8PathBuf,
    /// Private directory for this tool's persisted state.
    pub state_dir: Utf8PathBuf,
    #[serde(flatten)]
    pub kind: GameKind,
}

impl Game {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        game_dir: impl Into<Utf8PathBuf>,
        state_dir: impl Into<Utf8PathBuf>,
        kind: GameKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            game_dir: game_dir.into(),
            state_dir: state_dir.into(),
            kind,
        }
    }

    /// Default root for installed mod content.
    pub fn mods_dir(&self) -> Utf8PathBuf {
        self.state_dir.join("mods")
    }

    /// Staging directory for files displaced by deployment.
    pub fn cache_dir(&self) -> Utf8PathBuf {
        self.state_dir.join("cache")
    }

    pub fn deployed_files_path(&self) -> Utf8PathBuf {
        self.state_dir.join(DEPLOYED_FILES_JSON)
    }

    pub fn journal_path(&self) -> Utf8PathBuf {
        self.state_dir.join(DEPLOY_JOURNAL)
    }

    pub fn plugins_json_path(&self) -> Utf8PathBuf {
        self.state_dir.join(PLUGINS_JSON)
    }

    pub fn mods_json_path(&self) -> Utf8PathBuf {
        self.state_dir.join(MODS_JSON)
    }

    /// The app data directory, for games with a plugin load order.
    pub fn app_data_dir(&self) -> Option<&Utf8Path> {
        match &self.kind {
            GameKind::Generic => None,
            GameKind::Bgs { app_data_dir, .. } => Some(app_data_dir),
        }
    }

    pub fn bgs_variant(&self) -> Option<BgsVariant> {
        match &self.kind {
            GameKind::Generic => None,
            GameKind::Bgs { variant, .. } => Some(*variant),
        }
    }

    pub fn supports_plugins(&self) -> bool {
        self.app_data_dir().is_some()
    }

    pub fn kind_label(&self) -> &'static str {
        match &self.kind {
            GameKind::Generic => "generic",
            GameKind::Bgs { variant, .. } => variant.as_str(),
        }
    }
}
