use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::foundation::error::PanelwaveResult;
use crate::identity::store::{IdentitySnapshot, IdentityStore};

/// Hands out one identity store per title.
///
/// A chapter run holds its title's store lock for the whole identity step, so chapters of the
/// same title serialize while chapters of different titles proceed in parallel.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    stores: Mutex<HashMap<String, Arc<Mutex<IdentityStore>>>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared store for `title`, created empty on first use.
    pub fn store(&self, title: &str) -> Arc<Mutex<IdentityStore>> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        stores
            .entry(title.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(IdentityStore::new())))
            .clone()
    }

    /// Replace the store for `title` with one seeded from `snapshot`.
    pub fn seed(&self, title: &str, snapshot: &IdentitySnapshot) -> PanelwaveResult<()> {
        let seeded = IdentityStore::from_snapshot(snapshot)?;
        let store = self.store(title);
        *lock_store(&store) = seeded;
        Ok(())
    }

    /// Snapshot of `title`'s active clusters, if the title has been seen.
    pub fn snapshot(&self, title: &str) -> Option<IdentitySnapshot> {
        let store = {
            let stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
            stores.get(title).cloned()
        }?;
        let snapshot = lock_store(&store).snapshot();
        Some(snapshot)
    }

    pub fn titles(&self) -> Vec<String> {
        let stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        let mut titles: Vec<String> = stores.keys().cloned().collect();
        titles.sort();
        titles
    }
}

/// Lock a title store. A panic in another chapter run leaves the store in its last consistent
/// state, so poisoning is ignored.
pub fn lock_store(store: &Mutex<IdentityStore>) -> MutexGuard<'_, IdentityStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "../../tests/unit/identity/registry.rs"]
mod tests;
