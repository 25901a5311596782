//! Pure load-order algorithms.
//!
//! Nothing here touches the filesystem. [`PluginRepository`] feeds these
//! functions the persisted list, the on-disk scan and the parsed text file,
//! and writes back what they return.
//!
//! [`PluginRepository`]: crate::services::PluginRepository

use crate::models::Plugin;
use std::collections::{HashMap, HashSet};

/// Seconds from the Unix epoch to 2000-01-01T00:00:00Z, the modification
/// time given to the first enabled plugin.
pub const TIMESTAMP_ANCHOR_SECS: i64 = 946_684_800;

/// Spacing between consecutive enabled plugins' modification times.
pub const TIMESTAMP_STEP_SECS: i64 = 86_400;

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// One plugin line read from `plugins.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtEntry {
    pub name: String,
    pub enabled: bool,
}

/// Outcome of merging the persisted list with the data directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub plugins: Vec<Plugin>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Parse the engine-consumed plugin list.
///
/// Blank lines, `#` comments and names without a plugin extension are
/// skipped; repeated names keep their first occurrence. With
/// `uses_marker`, only `*`-prefixed lines count as enabled. Otherwise every
/// listed plugin is enabled.
pub fn parse_plugins_txt(raw: &str, uses_marker: bool) -> Vec<TxtEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, starred) = match line.strip_prefix('*') {
            Some(rest) => (rest.trim(), true),
            None => (line, false),
        };
        if Plugin::from_file_name(name).is_none() || !seen.insert(name.to_string()) {
            continue;
        }
        entries.push(TxtEntry {
            name: name.to_string(),
            enabled: starred || !uses_marker,
        });
    }

    entries
}

/// Initial plugin list built from parsed `plugins.txt` entries.
pub fn plugins_from_txt(entries: &[TxtEntry]) -> Vec<Plugin> {
    let mut plugins: Vec<Plugin> = entries
        .iter()
        .filter_map(|entry| {
            let mut plugin = Plugin::from_file_name(&entry.name)?;
            plugin.is_enabled = entry.enabled;
            Some(plugin)
        })
        .collect();
    assign_indices(&mut plugins);
    plugins
}

/// Drop persisted plugins whose files are gone and append newly found ones.
///
/// # Arguments
/// * `persisted` - The authoritative list, in load order
/// * `on_disk` - Plugins present in the data directory, newest first
///
/// # Returns
/// The merged list. Surviving entries keep their relative order and enabled
/// flag; new entries follow in `on_disk` order, enabled.
pub fn reconcile(persisted: Vec<Plugin>, on_disk: &[Plugin]) -> Reconciled {
    let present: HashSet<&str> = on_disk.iter().map(|plugin| plugin.name.as_str()).collect();

    let mut reconciled = Reconciled::default();
    let mut kept: HashSet<String> = HashSet::new();

    for plugin in persisted {
        if !present.contains(plugin.name.as_str()) {
            reconciled.removed.push(plugin.name);
        } else if kept.insert(plugin.name.clone()) {
            reconciled.plugins.push(plugin);
        }
    }

    for plugin in on_disk {
        if kept.insert(plugin.name.clone()) {
            reconciled.added.push(plugin.name.clone());
            reconciled.plugins.push(plugin.clone());
        }
    }

    reconciled
}

/// Adopt the relative order an external tool gave enabled plugins.
///
/// Enabled plugins that appear in `txt_order` are sorted by their position
/// there, but only among the list slots they already occupy. Disabled
/// plugins and enabled plugins missing from `txt_order` do not move.
///
/// # Returns
/// `true` if the list changed
pub fn absorb_external_order(plugins: &mut [Plugin], txt_order: &[&str]) -> bool {
    let rank: HashMap<&str, usize> = txt_order
        .iter()
        .enumerate()
        .map(|(position, name)| (*name, position))
        .collect();

    let slots: Vec<usize> = plugins
        .iter()
        .enumerate()
        .filter(|(_, plugin)| plugin.is_enabled && rank.contains_key(plugin.name.as_str()))
        .map(|(slot, _)| slot)
        .collect();

    let mut ordered: Vec<Plugin> = slots.iter().map(|&slot| plugins[slot].clone()).collect();
    ordered.sort_by_key(|plugin| rank[plugin.name.as_str()]);

    let mut changed = false;
    for (slot, plugin) in slots.into_iter().zip(ordered) {
        if plugins[slot].name != plugin.name {
            plugins[slot] = plugin;
            changed = true;
        }
    }
    changed
}

/// Remove the entry at `old` and reinsert it at `new`.
///
/// List semantics, not a swap: `[A, B, C, D]` moved `0 -> 2` becomes
/// `[B, C, A, D]`. Returns `false` without touching the list if either
/// index is out of range.
pub fn move_entry<T>(items: &mut Vec<T>, old: usize, new: usize) -> bool {
    if old >= items.len() || new >= items.len() {
        return false;
    }
    let item = items.remove(old);
    items.insert(new, item);
    true
}

/// Rewrite every `load_order_index` to the entry's position.
pub fn assign_indices(plugins: &mut [Plugin]) {
    for (position, plugin) in plugins.iter_mut().enumerate() {
        plugin.load_order_index = position;
    }
}

/// Enabled plugins in list order.
pub fn enabled(plugins: &[Plugin]) -> impl Iterator<Item = &Plugin> {
    plugins.iter().filter(|plugin| plugin.is_enabled)
}

/// Contents of `plugins.txt`: one enabled plugin per line, `*`-prefixed
/// when the game expects the marker.
pub fn render_plugins_txt(plugins: &[Plugin], uses_marker: bool) -> String {
    let marker = if uses_marker { "*" } else { "" };
    enabled(plugins)
        .map(|plugin| format!("{marker}{}{LINE_ENDING}", plugin.name))
        .collect()
}

/// Contents of `loadorder.txt`: one enabled plugin per line, bare names.
pub fn render_loadorder_txt(plugins: &[Plugin]) -> String {
    enabled(plugins)
        .map(|plugin| format!("{}{LINE_ENDING}", plugin.name))
        .collect()
}

/// Unix modification time for the enabled plugin at `position`.
pub fn timestamp_for(position: usize) -> i64 {
    TIMESTAMP_ANCHOR_SECS + TIMESTAMP_STEP_SECS * position as i64
}
