//! Integration tests for game variant detection
//!
//! These tests verify:
//! - Variant detection from load order file contents
//! - Detection from an app data directory holding plugins.txt or loadorder.txt
//! - The detected variant driving the plugins.txt dialect

use camino::{Utf8Path, Utf8PathBuf};
use modweave::services::{
    PluginRepository, detect_variant_from_load_order, detect_variant_in_app_data,
};
use modweave::{BgsVariant, Game, GameKind};
use std::fs;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn load_order_file(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{}", contents).unwrap();
    temp_file
}

fn detect(contents: &str) -> Option<BgsVariant> {
    let temp_file = load_order_file(contents);
    let temp_path = Utf8Path::from_path(temp_file.path()).unwrap();
    detect_variant_from_load_order(temp_path).unwrap()
}

#[test]
fn test_post_skyrim_masters() {
    assert_eq!(detect("*Skyrim.esm\n*Update.esm\n"), Some(BgsVariant::PostSkyrim));
    assert_eq!(detect("*Fallout4.esm\n*DLCRobot.esm\n"), Some(BgsVariant::PostSkyrim));
    assert_eq!(detect("*Starfield.esm\n"), Some(BgsVariant::PostSkyrim));
}

#[test]
fn test_classic_masters() {
    assert_eq!(detect("Oblivion.esm\n"), Some(BgsVariant::Classic));
    assert_eq!(detect("Fallout3.esm\nAnchorage.esm\n"), Some(BgsVariant::Classic));
    assert_eq!(detect("FalloutNV.esm\nDeadMoney.esm\n"), Some(BgsVariant::Classic));
}

#[test]
fn test_load_order_with_comments_and_whitespace() {
    assert_eq!(
        detect("# This file is used by the game\n\n   *Skyrim.esm   \n"),
        Some(BgsVariant::PostSkyrim)
    );
}

#[test]
fn test_load_order_with_prefix_characters() {
    assert_eq!(detect("+Fallout4.esm\n"), Some(BgsVariant::PostSkyrim));
    assert_eq!(detect("-FalloutNV.esm\n"), Some(BgsVariant::Classic));
}

#[test]
fn test_load_order_with_crlf() {
    assert_eq!(detect("*Update.esm\r\n*Skyrim.esm\r\n"), Some(BgsVariant::PostSkyrim));
}

#[test]
fn test_first_master_wins() {
    assert_eq!(detect("FalloutNV.esm\n*Fallout4.esm\n"), Some(BgsVariant::Classic));
}

#[test]
fn test_load_order_case_insensitivity() {
    assert_eq!(detect("*skyrim.ESM\n"), Some(BgsVariant::PostSkyrim));
}

#[test]
fn test_load_order_returns_none_for_unknown_game() {
    assert_eq!(detect("*SomeMod.esp\n*Update.esm\n"), None);
}

#[test]
fn test_empty_load_order_returns_none() {
    assert_eq!(detect(""), None);
}

#[test]
fn test_detect_in_app_data_prefers_plugins_txt() {
    let temp_dir = TempDir::new().unwrap();
    let app_data = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    fs::write(app_data.join("plugins.txt"), "*Mod.esp\n").unwrap();
    fs::write(app_data.join("loadorder.txt"), "Oblivion.esm\nMod.esp\n").unwrap();

    // plugins.txt names no master, so loadorder.txt decides
    assert_eq!(
        detect_variant_in_app_data(&app_data).unwrap(),
        Some(BgsVariant::Classic)
    );

    fs::write(app_data.join("plugins.txt"), "*Skyrim.esm\n").unwrap();
    assert_eq!(
        detect_variant_in_app_data(&app_data).unwrap(),
        Some(BgsVariant::PostSkyrim)
    );
}

#[test]
fn test_detect_in_empty_app_data() {
    let temp_dir = TempDir::new().unwrap();
    let app_data = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    assert_eq!(detect_variant_in_app_data(&app_data).unwrap(), None);
}

#[test]
fn test_game_detection_workflow() {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let app_data = root.join("AppData");
    fs::create_dir_all(&app_data).unwrap();
    fs::create_dir_all(root.join("Data")).unwrap();
    fs::write(root.join("Data/Fallout3.esm"), "master").unwrap();
    fs::write(app_data.join("plugins.txt"), "Fallout3.esm\n").unwrap();

    let variant = detect_variant_in_app_data(&app_data).unwrap().unwrap();
    let game = Game::new(
        "fo3",
        "Fallout 3",
        root.join("Data"),
        root.join("state"),
        GameKind::Bgs {
            variant,
            app_data_dir: app_data.clone(),
        },
    );

    let mut repo = PluginRepository::open(&game).unwrap();
    let plugins = repo.get_plugins().unwrap();
    assert_eq!(plugins.len(), 1);
    assert!(plugins[0].is_enabled);

    // Classic games never get the enabled marker
    let written = fs::read_to_string(app_data.join("plugins.txt")).unwrap();
    assert_eq!(written.trim_end(), "Fallout3.esm");
}
