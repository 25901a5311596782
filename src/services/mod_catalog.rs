use crate::models::{Game, Mod};
use crate::services::load_order::move_entry;
use crate::store::{CorruptPolicy, JsonListStore, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("A mod with id '{0}' already exists")]
    DuplicateId(String),

    #[error("Mod index {index} out of range for {len} mods")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Ordered list of installed mods, persisted as `mods.json`.
///
/// Position is priority: the last entry wins every file collision.
#[derive(Debug)]
pub struct ModCatalog {
    store: JsonListStore<Mod>,
    mods: Vec<Mod>,
}

impl ModCatalog {
    pub fn open(game: &Game) -> Result<Self, CatalogError> {
        let store = JsonListStore::new(game.mods_json_path());
        let loaded = store.load_or_init::<CatalogError, _>(CorruptPolicy::Fail, || Ok(Vec::new()))?;
        Ok(Self {
            store,
            mods: loaded.items,
        })
    }

    pub fn mods(&self) -> &[Mod] {
        &self.mods
    }

    pub fn get(&self, id: &str) -> Option<&Mod> {
        self.mods.iter().find(|entry| entry.id == id)
    }

    /// Append a mod at the highest priority.
    pub fn add(&mut self, entry: Mod) -> Result<(), CatalogError> {
        if self.get(&entry.id).is_some() {
            return Err(CatalogError::DuplicateId(entry.id));
        }
        tracing::info!("Added mod {} ({})", entry.name, entry.id);
        self.mods.push(entry);
        self.save()
    }

    /// Remove by id. Returns the removed mod, or `None` if unknown.
    pub fn remove(&mut self, id: &str) -> Result<Option<Mod>, CatalogError> {
        let Some(position) = self.mods.iter().position(|entry| entry.id == id) else {
            return Ok(None);
        };
        let removed = self.mods.remove(position);
        self.save()?;
        tracing::info!("Removed mod {} ({})", removed.name, removed.id);
        Ok(Some(removed))
    }

    /// Replace the mod with the same id in place.
    ///
    /// # Returns
    /// `false` if no mod has that id
    pub fn modify(&mut self, entry: Mod) -> Result<bool, CatalogError> {
        let Some(slot) = self.mods.iter_mut().find(|existing| existing.id == entry.id) else {
            return Ok(false);
        };
        *slot = entry;
        self.save()?;
        Ok(true)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<bool, CatalogError> {
        let Some(mut entry) = self.get(id).cloned() else {
            return Ok(false);
        };
        entry.is_enabled = enabled;
        self.modify(entry)
    }

    /// Move the mod at `old_index` to `new_index` (remove then insert).
    pub fn reorder_by_indices(
        &mut self,
        old_index: usize,
        new_index: usize,
    ) -> Result<(), CatalogError> {
        let len = self.mods.len();
        if !move_entry(&mut self.mods, old_index, new_index) {
            return Err(CatalogError::IndexOutOfRange {
                index: old_index.max(new_index),
                len,
            });
        }
        self.save()
    }

    /// Enabled mods, lowest priority first. This is the deployment input.
    pub fn enabled_in_order(&self) -> Vec<Mod> {
        self.mods.iter().filter(|entry| entry.is_enabled).cloned().collect()
    }

    fn save(&self) -> Result<(), CatalogError> {
        Ok(self.store.save(&self.mods)?)
    }
}
