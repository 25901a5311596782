use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// A self-contained directory of override files.
///
/// Position in the owning catalog is its priority: later entries are applied
/// later during deployment and win path collisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mod {
    pub id: String,
    pub name: String,
    /// Content root; its tree is mirrored into the game directory.
    pub path: Utf8PathBuf,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
}

impl Mod {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
            is_enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}
