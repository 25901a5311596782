//! Integration tests for the deployment engine
//!
//! These tests verify:
//! - Deploy then Clear restores the game directory exactly
//! - Deploying twice yields the same state as deploying once
//! - Higher-priority mods win file collisions
//! - Pre-existing game files are cached, never deleted
//! - Progress notifications and crash recovery from the journal

use camino::{Utf8Path, Utf8PathBuf};
use modweave::models::GameKind;
use modweave::services::{ClearReport, DeployError, DeployProgress, DeploymentEngine, LinkMode};
use modweave::store::DeployJournal;
use modweave::{Game, Mod};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;
use walkdir::WalkDir;

struct Workspace {
    _temp_dir: TempDir,
    root: Utf8PathBuf,
    game: Game,
}

fn create_workspace() -> Workspace {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    fs::create_dir_all(root.join("game")).unwrap();
    let game = Game::new(
        "test",
        "Test Game",
        root.join("game"),
        root.join("state"),
        GameKind::Generic,
    );
    Workspace {
        _temp_dir: temp_dir,
        root,
        game,
    }
}

fn write_file(path: &Utf8Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn make_mod(ws: &Workspace, name: &str, files: &[(&str, &str)]) -> Mod {
    let root = ws.root.join("mods").join(name);
    fs::create_dir_all(&root).unwrap();
    for (relative, contents) in files {
        write_file(&root.join(relative), contents);
    }
    Mod::new(name, name, root)
}

/// Relative path -> file contents (`None` for directories).
fn snapshot(dir: &Utf8Path) -> BTreeMap<String, Option<String>> {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            let relative = entry
                .path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            let contents = if entry.file_type().is_dir() {
                None
            } else {
                Some(fs::read_to_string(entry.path()).unwrap())
            };
            (relative, contents)
        })
        .collect()
}

fn read(ws: &Workspace, relative: &str) -> String {
    fs::read_to_string(ws.game.game_dir.join(relative)).unwrap()
}

#[test]
fn test_deploy_then_clear_restores_game_directory() {
    let ws = create_workspace();
    write_file(&ws.game.game_dir.join("game.ini"), "vanilla settings");
    write_file(&ws.game.game_dir.join("textures/sky.dds"), "vanilla sky");
    fs::create_dir_all(ws.game.game_dir.join("empty")).unwrap();
    let before = snapshot(&ws.game.game_dir);

    let mods = vec![
        make_mod(&ws, "a", &[("game.ini", "tweaked"), ("meshes/new/rock.nif", "rock")]),
        make_mod(
            &ws,
            "b",
            &[("textures/sky.dds", "hd sky"), ("textures/extra/cloud.dds", "cloud")],
        ),
    ];

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    let report = engine.deploy(&mods, |_| {}).unwrap();
    assert_eq!(report.mods_deployed, 2);
    assert_eq!(report.files_linked, 4);
    assert_eq!(report.files_cached, 2);
    assert_eq!(read(&ws, "textures/sky.dds"), "hd sky");

    let cleared = engine.clear().unwrap();
    assert_eq!(cleared.links_removed, 4);
    assert_eq!(cleared.files_restored, 2);

    assert_eq!(snapshot(&ws.game.game_dir), before);
}

#[test]
fn test_deploy_is_idempotent() {
    let ws = create_workspace();
    write_file(&ws.game.game_dir.join("base.txt"), "original");
    let mods = vec![
        make_mod(&ws, "a", &[("base.txt", "from a"), ("a/only.txt", "a")]),
        make_mod(&ws, "b", &[("b.txt", "b")]),
    ];

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    engine.deploy(&mods, |_| {}).unwrap();
    let first_game = snapshot(&ws.game.game_dir);
    let first_links: Vec<Utf8PathBuf> =
        engine.deployed_paths().map(Utf8Path::to_path_buf).collect();
    let first_store = fs::read_to_string(ws.game.deployed_files_path()).unwrap();

    engine.deploy(&mods, |_| {}).unwrap();

    assert_eq!(snapshot(&ws.game.game_dir), first_game);
    let second_links: Vec<Utf8PathBuf> =
        engine.deployed_paths().map(Utf8Path::to_path_buf).collect();
    assert_eq!(second_links, first_links);
    assert_eq!(fs::read_to_string(ws.game.deployed_files_path()).unwrap(), first_store);

    engine.clear().unwrap();
    assert_eq!(read(&ws, "base.txt"), "original");
}

#[test]
fn test_later_mod_wins_collision() {
    let ws = create_workspace();
    let mods = vec![
        make_mod(&ws, "low", &[("shared.txt", "low"), ("low.txt", "low")]),
        make_mod(&ws, "high", &[("shared.txt", "high")]),
    ];

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    let report = engine.deploy(&mods, |_| {}).unwrap();

    assert_eq!(read(&ws, "shared.txt"), "high");
    assert_eq!(read(&ws, "low.txt"), "low");
    assert_eq!(report.files_overridden, 1);
    assert_eq!(report.files_cached, 0);
    // The low mod's own copy is untouched
    assert_eq!(fs::read_to_string(ws.root.join("mods/low/shared.txt")).unwrap(), "low");
}

#[test]
fn test_pre_existing_file_is_cached_not_deleted() {
    let ws = create_workspace();
    write_file(&ws.game.game_dir.join("Data/Skyrim.ini"), "user content");
    let mods = vec![make_mod(&ws, "ini", &[("Data/Skyrim.ini", "mod content")])];

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    engine.deploy(&mods, |_| {}).unwrap();

    assert_eq!(read(&ws, "Data/Skyrim.ini"), "mod content");
    assert_eq!(
        fs::read_to_string(ws.game.cache_dir().join("Data/Skyrim.ini")).unwrap(),
        "user content"
    );

    // A fresh engine (new process) must still be able to restore
    drop(engine);
    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    engine.clear().unwrap();
    assert_eq!(read(&ws, "Data/Skyrim.ini"), "user content");
}

#[test]
fn test_progress_reported_per_mod_in_order() {
    let ws = create_workspace();
    let mods = vec![
        make_mod(&ws, "first", &[("1.txt", "1")]),
        make_mod(&ws, "second", &[("2.txt", "2")]),
        make_mod(&ws, "third", &[("3.txt", "3")]),
    ];

    let mut events = Vec::new();
    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    engine.deploy(&mods, |progress| events.push(progress)).unwrap();

    assert_eq!(
        events,
        vec![
            DeployProgress {
                mod_name: "first".to_string(),
                ordinal: 0,
                total: 3
            },
            DeployProgress {
                mod_name: "second".to_string(),
                ordinal: 1,
                total: 3
            },
            DeployProgress {
                mod_name: "third".to_string(),
                ordinal: 2,
                total: 3
            },
        ]
    );
}

#[test]
fn test_ignored_entries_are_not_deployed() {
    let ws = create_workspace();
    let mods = vec![make_mod(
        &ws,
        "noisy",
        &[
            ("real.esp", "plugin"),
            (".git/config", "[core]"),
            ("Thumbs.db", "thumbs"),
            ("__MACOSX/._real.esp", "fork"),
        ],
    )];

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    let report = engine.deploy(&mods, |_| {}).unwrap();

    assert_eq!(report.files_linked, 1);
    assert!(ws.game.game_dir.join("real.esp").exists());
    assert!(!ws.game.game_dir.join(".git").exists());
    assert!(!ws.game.game_dir.join("Thumbs.db").exists());
    assert!(!ws.game.game_dir.join("__MACOSX").exists());
}

#[test]
fn test_clear_tolerates_missing_links() {
    let ws = create_workspace();
    let mods = vec![make_mod(&ws, "a", &[("a.txt", "a"), ("b.txt", "b")])];

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    engine.deploy(&mods, |_| {}).unwrap();
    fs::remove_file(ws.game.game_dir.join("a.txt")).unwrap();

    let report = engine.clear().unwrap();

    assert_eq!(report.links_removed, 1);
    assert_eq!(report.links_missing, 1);
    assert_eq!(engine.deployed_count(), 0);
}

#[test]
fn test_journal_recovers_links_from_interrupted_deploy() {
    let ws = create_workspace();
    let source = make_mod(&ws, "a", &[("a.esp", "plugin")]);
    fs::create_dir_all(&ws.game.state_dir).unwrap();

    // Simulate a crash after the journal write and link, before the store save
    let dest = std::path::absolute(ws.game.game_dir.join("a.esp")).unwrap();
    let dest = Utf8PathBuf::try_from(dest).unwrap();
    let mut journal = DeployJournal::new(ws.game.journal_path());
    journal.record_link(&dest).unwrap();
    fs::hard_link(source.path.join("a.esp"), &dest).unwrap();
    drop(journal);

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    assert_eq!(engine.deployed_count(), 1);
    let store = fs::read_to_string(ws.game.deployed_files_path()).unwrap();
    assert!(store.contains("a.esp"));

    engine.clear().unwrap();
    assert!(!dest.exists());
    assert!(source.path.join("a.esp").exists());
}

#[test]
fn test_corrupt_link_store_is_an_error() {
    let ws = create_workspace();
    write_file(&ws.game.deployed_files_path(), "[\"/game/a.txt\",");

    let result = DeploymentEngine::open(&ws.game, LinkMode::Hardlink);
    assert!(matches!(result, Err(DeployError::Store(_))));
}

#[cfg(unix)]
#[test]
fn test_symlink_mode_points_at_mod_file() {
    let ws = create_workspace();
    let mods = vec![make_mod(&ws, "a", &[("textures/a.dds", "a")])];

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Symlink).unwrap();
    let report = engine.deploy(&mods, |_| {}).unwrap();

    let dest = ws.game.game_dir.join("textures/a.dds");
    assert_eq!(report.link_mode, LinkMode::Symlink);
    assert!(fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
    let target = fs::read_link(&dest).unwrap();
    assert!(target.ends_with("mods/a/textures/a.dds"));
    assert!(target.is_absolute());

    engine.clear().unwrap();
    assert!(!ws.game.game_dir.join("textures").exists());
    assert!(ws.root.join("mods/a/textures/a.dds").exists());
}

#[test]
fn test_clear_after_failed_deploy_restores_game_directory() {
    let ws = create_workspace();
    write_file(&ws.game.game_dir.join("a.txt"), "user");
    fs::create_dir_all(ws.game.game_dir.join("z")).unwrap();
    let before = snapshot(&ws.game.game_dir);

    // Sorted walk order: a.txt, sub/b.txt, then z collides with a directory
    let mods = vec![make_mod(
        &ws,
        "broken",
        &[("a.txt", "mod"), ("sub/b.txt", "b"), ("z", "not a directory")],
    )];

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    let result = engine.deploy(&mods, |_| {});
    assert!(matches!(result, Err(DeployError::DestinationIsDirectory(_))));
    drop(engine);

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    assert_eq!(engine.deployed_count(), 3);

    let cleared = engine.clear().unwrap();
    assert_eq!(cleared.links_removed, 2);
    assert_eq!(cleared.directories_removed, 1);
    assert_eq!(cleared.files_restored, 1);
    assert_eq!(read(&ws, "a.txt"), "user");
    assert!(!ws.game.game_dir.join("sub").exists());
    assert_eq!(snapshot(&ws.game.game_dir), before);

    let again = engine.clear().unwrap();
    assert_eq!(again, ClearReport::default());
    assert_eq!(snapshot(&ws.game.game_dir), before);
}

#[test]
fn test_clear_twice_after_deploy() {
    let ws = create_workspace();
    write_file(&ws.game.game_dir.join("base.ini"), "vanilla");
    let before = snapshot(&ws.game.game_dir);
    let mods = vec![make_mod(&ws, "a", &[("base.ini", "modded"), ("meshes/a.nif", "a")])];

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    engine.deploy(&mods, |_| {}).unwrap();

    engine.clear().unwrap();
    let after_first = snapshot(&ws.game.game_dir);
    let again = engine.clear().unwrap();

    assert_eq!(after_first, before);
    assert_eq!(again, ClearReport::default());
    assert_eq!(snapshot(&ws.game.game_dir), before);
}

#[test]
fn test_mod_stored_under_ignored_directory_name_is_deployed() {
    let ws = create_workspace();
    let root = ws.root.join(".git").join("mods").join("a");
    write_file(&root.join("a.esp"), "plugin");
    write_file(&root.join(".git/HEAD"), "ref");
    let mods = vec![Mod::new("a", "A", root)];

    let mut engine = DeploymentEngine::open(&ws.game, LinkMode::Hardlink).unwrap();
    let report = engine.deploy(&mods, |_| {}).unwrap();

    assert_eq!(report.files_linked, 1);
    assert_eq!(read(&ws, "a.esp"), "plugin");
    assert!(!ws.game.game_dir.join(".git").exists());
}
