//! modweave - link-based mod deployment and plugin load order management
//!
//! Main entry point for the command-line application.
//!
//! # Overview
//!
//! This binary is glue around the library. It initializes:
//! - Logging infrastructure (file rotation + optional console output)
//! - Configuration loading ([`ConfigManager`]: `settings.yaml`, `games.yaml`)
//! - A tokio runtime driving a [`GameSession`] for engine operations
//!
//! # Configuration Files
//!
//! Expected in the config directory (`--config-dir`, default `modweave-data`):
//! - `settings.yaml`: Debug mode, log directory, link mode
//! - `games.yaml`: Managed games
//! - `games/<id>/`: Default per-game state (mods.json, plugins.json, link store, cache)

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use modweave::services::detect_variant_in_app_data;
use modweave::{
    APP_NAME, BgsVariant, ConfigManager, Game, GameKind, GameSession, LinkMode, Mod, ModCatalog,
    SessionEvent, VERSION,
};

#[derive(Parser)]
#[command(name = "modweave", version)]
#[command(about = "Link-based mod deployment and plugin load order management")]
struct Cli {
    /// Directory holding settings.yaml, games.yaml and per-game state
    #[arg(long, global = true, default_value = "modweave-data")]
    config_dir: Utf8PathBuf,

    /// Also log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage games
    Game {
        #[command(subcommand)]
        command: GameCommand,
    },
    /// Manage a game's mod list
    Mod {
        #[command(subcommand)]
        command: ModCommand,
    },
    /// Restore the game directory, then link every enabled mod into it
    Deploy { game: String },
    /// Remove deployed links and restore displaced game files
    Clear { game: String },
    /// Manage a game's plugin load order
    Plugins {
        #[command(subcommand)]
        command: PluginCommand,
    },
}

#[derive(Subcommand)]
enum GameCommand {
    /// Register a game
    Add {
        id: String,
        /// Deployment target (the Data folder for Bethesda-style games)
        game_dir: Utf8PathBuf,
        #[arg(long)]
        name: Option<String>,
        /// Private state directory (defaults to <config-dir>/games/<id>)
        #[arg(long)]
        state_dir: Option<Utf8PathBuf>,
        #[arg(long, value_enum, default_value_t = KindArg::Generic)]
        kind: KindArg,
        /// Directory holding plugins.txt and loadorder.txt
        #[arg(long, required_if_eq("kind", "bgs"))]
        app_data_dir: Option<Utf8PathBuf>,
        /// Plugin text dialect; detected from the load order when omitted
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
    },
    /// List registered games
    List,
    /// Forget a game (its state directory is left in place)
    Remove { id: String },
}

#[derive(Subcommand)]
enum ModCommand {
    /// Append a mod at the highest priority
    Add {
        game: String,
        id: String,
        path: Utf8PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// List mods, lowest priority first
    List { game: String },
    Enable { game: String, id: String },
    Disable { game: String, id: String },
    /// Move a mod from one position to another
    Move { game: String, from: usize, to: usize },
    Remove { game: String, id: String },
}

#[derive(Subcommand)]
enum PluginCommand {
    /// Sync and list plugins in load order
    List { game: String },
    Enable { game: String, name: String },
    Disable { game: String, name: String },
    /// Move a plugin from one position to another
    Move { game: String, from: usize, to: usize },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Generic,
    Bgs,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    Classic,
    PostSkyrim,
}

impl From<VariantArg> for BgsVariant {
    fn from(value: VariantArg) -> Self {
        match value {
            VariantArg::Classic => BgsVariant::Classic,
            VariantArg::PostSkyrim => BgsVariant::PostSkyrim,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let user_config = config_manager.load_user_config()?;
    let settings = &user_config.settings;

    let log_dir = cli.config_dir.join(&settings.log_dir);
    let _guard = modweave::logging::setup_logging_with_console(
        log_dir.as_str(),
        "modweave",
        settings.debug_mode,
        cli.verbose,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let link_mode = LinkMode::from_preference(settings.link_mode);

    match cli.command {
        Commands::Game { command } => run_game_command(&config_manager, command),
        Commands::Mod { command } => run_mod_command(&config_manager, command),
        Commands::Deploy { game } => {
            let game = find_game(&config_manager, &game)?;
            block_on(deploy(game, link_mode))
        }
        Commands::Clear { game } => {
            let game = find_game(&config_manager, &game)?;
            block_on(clear(game, link_mode))
        }
        Commands::Plugins { command } => {
            block_on(run_plugin_command(&config_manager, command, link_mode))
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("modweave-worker")
        .build()
        .context("Failed to build tokio runtime")?;
    runtime.block_on(future)
}

fn find_game(config_manager: &ConfigManager, id: &str) -> Result<Game> {
    let catalog = config_manager.load_games()?;
    catalog
        .get(id)
        .cloned()
        .with_context(|| format!("Unknown game '{}'", id))
}

fn run_game_command(config_manager: &ConfigManager, command: GameCommand) -> Result<()> {
    let mut catalog = config_manager.load_games()?;

    match command {
        GameCommand::Add {
            id,
            game_dir,
            name,
            state_dir,
            kind,
            app_data_dir,
            variant,
        } => {
            let kind = match (kind, app_data_dir) {
                (KindArg::Generic, _) => GameKind::Generic,
                (KindArg::Bgs, Some(app_data_dir)) => {
                    let variant = match variant {
                        Some(variant) => variant.into(),
                        None => detect_variant_in_app_data(&app_data_dir)?.with_context(|| {
                            format!(
                                "Could not detect the game variant from {}; pass --variant",
                                app_data_dir
                            )
                        })?,
                    };
                    GameKind::Bgs { variant, app_data_dir }
                }
                (KindArg::Bgs, None) => {
                    bail!("--app-data-dir is required for Bethesda-style games")
                }
            };
            let state_dir = state_dir.unwrap_or_else(|| config_manager.default_state_dir(&id));
            let name = name.unwrap_or_else(|| id.clone());
            let game = Game::new(id.clone(), name, game_dir, state_dir, kind);
            println!("Added {} ({})", game.name, game.kind_label());
            catalog.upsert(game);
            config_manager.save_games(&catalog)?;
        }
        GameCommand::List => {
            for game in catalog.games.values() {
                println!("{}\t{}\t{}\t{}", game.id, game.kind_label(), game.name, game.game_dir);
            }
        }
        GameCommand::Remove { id } => {
            if catalog.remove(&id).is_none() {
                bail!("Unknown game '{}'", id);
            }
            config_manager.save_games(&catalog)?;
        }
    }
    Ok(())
}

fn run_mod_command(config_manager: &ConfigManager, command: ModCommand) -> Result<()> {
    match command {
        ModCommand::Add { game, id, path, name } => {
            let game = find_game(config_manager, &game)?;
            let mut catalog = ModCatalog::open(&game)?;
            catalog.add(Mod::new(id.clone(), name.unwrap_or(id), path))?;
        }
        ModCommand::List { game } => {
            let game = find_game(config_manager, &game)?;
            let catalog = ModCatalog::open(&game)?;
            for (position, entry) in catalog.mods().iter().enumerate() {
                let flag = if entry.is_enabled { "+" } else { "-" };
                println!("{:>3} {} {}\t{}\t{}", position, flag, entry.id, entry.name, entry.path);
            }
        }
        ModCommand::Enable { game, id } => set_mod_enabled(config_manager, &game, &id, true)?,
        ModCommand::Disable { game, id } => set_mod_enabled(config_manager, &game, &id, false)?,
        ModCommand::Move { game, from, to } => {
            let game = find_game(config_manager, &game)?;
            ModCatalog::open(&game)?.reorder_by_indices(from, to)?;
        }
        ModCommand::Remove { game, id } => {
            let game = find_game(config_manager, &game)?;
            if ModCatalog::open(&game)?.remove(&id)?.is_none() {
                bail!("Unknown mod '{}'", id);
            }
        }
    }
    Ok(())
}

fn set_mod_enabled(
    config_manager: &ConfigManager,
    game: &str,
    id: &str,
    enabled: bool,
) -> Result<()> {
    let game = find_game(config_manager, game)?;
    if !ModCatalog::open(&game)?.set_enabled(id, enabled)? {
        bail!("Unknown mod '{}'", id);
    }
    Ok(())
}

async fn deploy(game: Game, link_mode: LinkMode) -> Result<()> {
    let mods = ModCatalog::open(&game)?.enabled_in_order();
    let session = GameSession::open(game, link_mode).await?;

    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::ModDeployed { mod_name, ordinal, total } = event {
                println!("[{}/{}] {}", ordinal + 1, total, mod_name);
            }
        }
    });

    let report = session.deploy(mods).await;
    drop(session);
    let _ = printer.await;
    let report = report?;

    println!(
        "Deployed {} mods: {} files linked ({}), {} overridden, {} game files cached",
        report.mods_deployed,
        report.files_linked,
        report.link_mode.label(),
        report.files_overridden,
        report.files_cached
    );
    Ok(())
}

async fn clear(game: Game, link_mode: LinkMode) -> Result<()> {
    let session = GameSession::open(game, link_mode).await?;
    let report = session.clear().await?;
    println!(
        "Removed {} links ({} already missing), restored {} files",
        report.links_removed, report.links_missing, report.files_restored
    );
    Ok(())
}

async fn run_plugin_command(
    config_manager: &ConfigManager,
    command: PluginCommand,
    link_mode: LinkMode,
) -> Result<()> {
    let game_id = match &command {
        PluginCommand::List { game }
        | PluginCommand::Enable { game, .. }
        | PluginCommand::Disable { game, .. }
        | PluginCommand::Move { game, .. } => game.clone(),
    };
    let game = find_game(config_manager, &game_id)?;
    let session = GameSession::open(game, link_mode).await?;

    match command {
        PluginCommand::List { .. } => {
            for plugin in session.plugins().await? {
                let flag = if plugin.is_enabled { "*" } else { " " };
                println!(
                    "{:>3} {} {} [{}]",
                    plugin.load_order_index, flag, plugin.name, plugin.plugin_type
                );
            }
        }
        PluginCommand::Enable { name, .. } => update_plugin(&session, name, true).await?,
        PluginCommand::Disable { name, .. } => update_plugin(&session, name, false).await?,
        PluginCommand::Move { from, to, .. } => session.reorder_plugin(from, to).await?,
    }
    Ok(())
}

async fn update_plugin(session: &GameSession, name: String, enabled: bool) -> Result<()> {
    if !session.update_plugin(name.clone(), enabled).await? {
        bail!("Unknown plugin '{}'", name);
    }
    Ok(())
}
