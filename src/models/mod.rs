//! Data models for modweave.
//!
//! This module contains the core data structures shared by the engine and the
//! configuration layer:
//! - [`Game`]: The filesystem roots a game instance is managed through, with a
//!   closed [`GameKind`] deciding whether it has a plugin load order
//! - [`Mod`]: One mod directory and its enabled flag
//! - [`Plugin`]: One entry of the persisted plugin list, typed by [`PluginType`]
//! - [`UserConfig`] / [`GameCatalog`]: YAML-backed settings and game catalog
//!
//! # Architecture Note
//!
//! All models are plain serializable values. Persisted ordering (plugin list,
//! mod catalog) is carried by `Vec` position, never by a stored index.

pub mod config;
pub mod game;
pub mod mod_entry;
pub mod plugin;

pub use config::{GameCatalog, LinkPreference, Settings, UserConfig};
pub use game::{BgsVariant, Game, GameKind};
pub use mod_entry::Mod;
pub use plugin::{Plugin, PluginType};
