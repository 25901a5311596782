use camino::Utf8Path;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static PLUGIN_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(esp|esl|esm)$").expect("Invalid plugin extension regex"));

/// Plugin file type, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PluginType {
    Esp,
    Esl,
    Esm,
}

impl PluginType {
    /// Classify a file name by extension, case-insensitively.
    ///
    /// Returns `None` for anything that is not `.esp`, `.esl` or `.esm`.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let captures = PLUGIN_EXTENSION.captures(file_name)?;
        match captures[1].to_ascii_lowercase().as_str() {
            "esp" => Some(PluginType::Esp),
            "esl" => Some(PluginType::Esl),
            "esm" => Some(PluginType::Esm),
            _ => None,
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PluginType::Esp => "ESP",
            PluginType::Esl => "ESL",
            PluginType::Esm => "ESM",
        };
        f.write_str(label)
    }
}

/// One entry of the persisted plugin list.
///
/// `name` is the file name and the identity key. `load_order_index` is
/// derived from list position on every save and is never trusted as input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    pub name: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    #[serde(default)]
    pub load_order_index: usize,
    pub is_enabled: bool,
}

impl Plugin {
    /// Build an enabled plugin from a file name, or `None` if the extension
    /// is not a plugin extension.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let plugin_type = PluginType::from_file_name(file_name)?;
        Some(Self {
            name: file_name.to_string(),
            plugin_type,
            load_order_index: 0,
            is_enabled: true,
        })
    }

    /// Location of the backing file inside a data directory.
    pub fn file_path(&self, data_dir: &Utf8Path) -> camino::Utf8PathBuf {
        data_dir.join(&self.name)
    }
}
