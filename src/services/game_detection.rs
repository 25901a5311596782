//! Bethesda-style game variant detection from load order files.
//!
//! The variant decides whether `plugins.txt` marks enabled entries with `*`.
//! It is inferred from the first base-game master listed:
//! - `Skyrim.esm`, `Fallout4.esm`, `Starfield.esm` → [`BgsVariant::PostSkyrim`]
//! - `Oblivion.esm`, `Fallout3.esm`, `FalloutNV.esm` → [`BgsVariant::Classic`]
//!
//! # Examples
//!
//! ```ignore
//! use modweave::services::game_detection::detect_variant_from_load_order;
//! use camino::Utf8Path;
//!
//! let variant = detect_variant_from_load_order(Utf8Path::new("plugins.txt"))?;
//! ```

use crate::models::BgsVariant;
use crate::models::game::{LOADORDER_TXT, PLUGINS_TXT};
use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs::File;
use std::io::{BufRead, BufReader};

const BASE_MASTERS: [(&str, BgsVariant); 6] = [
    ("skyrim.esm", BgsVariant::PostSkyrim),
    ("fallout4.esm", BgsVariant::PostSkyrim),
    ("starfield.esm", BgsVariant::PostSkyrim),
    ("oblivion.esm", BgsVariant::Classic),
    ("fallout3.esm", BgsVariant::Classic),
    ("falloutnv.esm", BgsVariant::Classic),
];

/// Variant implied by a single plugin name, if it is a base-game master.
///
/// Matching is case-insensitive on the whole file name.
pub fn variant_for_master(plugin_name: &str) -> Option<BgsVariant> {
    let lowered = plugin_name.to_ascii_lowercase();
    BASE_MASTERS
        .iter()
        .find(|(master, _)| *master == lowered)
        .map(|(_, variant)| *variant)
}

/// Detects the game variant by reading a load order file and looking for
/// the first base-game master.
///
/// # Arguments
///
/// * `load_order_path` - Path to the load order file (plugins.txt or loadorder.txt)
///
/// # Returns
///
/// The detected variant, or `None` if no known master is listed
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded
pub fn detect_variant_from_load_order(load_order_path: &Utf8Path) -> Result<Option<BgsVariant>> {
    let file = File::open(load_order_path)
        .with_context(|| format!("Failed to open load order file: {}", load_order_path))?;

    let reader = BufReader::new(file);

    for line_result in reader.lines() {
        let line = line_result.context("Failed to read line from load order file")?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Enabled markers used by the engine and by mod organizer profiles
        let plugin_name = line.trim_start_matches(['*', '+', '-']).trim();

        if let Some(variant) = variant_for_master(plugin_name) {
            tracing::info!("Detected {} from {}", variant.as_str(), load_order_path);
            return Ok(Some(variant));
        }
    }

    tracing::debug!("No base-game master found in {}", load_order_path);
    Ok(None)
}

/// Detect the variant from whichever of `plugins.txt` or `loadorder.txt`
/// exists in an app data directory.
pub fn detect_variant_in_app_data(app_data_dir: &Utf8Path) -> Result<Option<BgsVariant>> {
    for file_name in [PLUGINS_TXT, LOADORDER_TXT] {
        let path = app_data_dir.join(file_name);
        if !path.exists() {
            continue;
        }
        if let Some(variant) = detect_variant_from_load_order(&path)? {
            return Ok(Some(variant));
        }
    }
    Ok(None)
}
