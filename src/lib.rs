// modweave - link-based mod deployment and plugin load order management
//
// This is the library crate containing the engine and data structures.
// The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{BgsVariant, Game, GameCatalog, GameKind, Mod, Plugin, PluginType, UserConfig};
pub use services::{DeploymentEngine, LinkMode, ModCatalog, PluginRepository};
pub use state::{GameSession, SessionError, SessionEvent};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
