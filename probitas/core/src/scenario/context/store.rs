use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use crate::scenario::StepValue;

/// Key/value scratch space shared by every record of one scenario run.
#[derive(Clone, Default)]
pub struct Store {
    entries: Arc<RwLock<HashMap<String, StepValue>>>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning whatever was there before.
    pub fn insert<T>(&self, key: impl Into<String>, value: T) -> Option<StepValue>
    where
        T: Send + Sync + 'static,
    {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::new(value))
    }

    /// Returns the value under `key` if it exists and has type `T`.
    #[must_use]
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?;
        value.downcast::<T>().ok()
    }

    pub fn remove(&self, key: &str) -> Option<StepValue> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let store = Store::new();
        let other = store.clone();

        store.insert("token", String::from("abc"));

        assert_eq!(other.get::<String>("token").as_deref().map(String::as_str), Some("abc"));
        assert!(other.get::<u32>("token").is_none());
        assert!(other.remove("token").is_some());
        assert!(store.is_empty());
    }
}
