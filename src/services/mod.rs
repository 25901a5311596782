//! Services module - the synchronous engine behind every game operation.
//!
//! Nothing in here is async or knows about the CLI. Callers that need to keep
//! a thread free go through [`GameSession`](crate::state::GameSession), which
//! runs these services on the blocking pool one operation at a time.
//!
//! # Components
//!
//! - [`DeploymentEngine`]: Overlays ordered mod directories onto the game
//!   directory with hard or symbolic links, and restores it:
//!   - Displaced game files are moved to a per-game cache first
//!   - Every created link is journaled, then recorded in the link store
//!   - `clear` removes exactly the recorded links and restores the cache
//!
//! - [`PluginRepository`]: The authoritative plugin load order of a
//!   Bethesda-style game, kept in sync with:
//!   - the plugin files present in the data directory
//!   - `plugins.txt` (engine) and `loadorder.txt` (tools)
//!   - plugin file modification times
//!
//! - [`load_order`]: Pure list algorithms used by the repository (reconcile,
//!   external-order absorption, remove-then-insert moves, text rendering).
//!
//! - [`ModCatalog`]: The persisted, ordered mod list that produces deployment
//!   input.
//!
//! - [`game_detection`]: Infers the plugin text dialect from a load order file.
//!
//! # Ordering
//!
//! Every list here is ordered by position, lowest priority first. Nothing
//! reads a stored index back as input.

pub mod deployment;
pub mod game_detection;
pub mod load_order;
pub mod mod_catalog;
pub mod plugins;

pub use deployment::{
    ClearReport, DeployError, DeployProgress, DeployReport, DeploymentEngine, LinkMode,
};
pub use game_detection::{detect_variant_from_load_order, detect_variant_in_app_data};
pub use mod_catalog::{CatalogError, ModCatalog};
pub use plugins::{PluginError, PluginRepository, SyncReport};
