//! Environment backing stores.
//!
//! The resolution engine and loader depend on [`EnvStore`] rather than on the
//! ambient process environment, so tests can run against an isolated
//! [`MemoryEnv`] without snapshotting and restoring `std::env`.

use std::collections::BTreeMap;

use parking_lot::RwLock;

pub trait EnvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn vars(&self) -> Vec<(String, String)>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// The live process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvStore for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn set(&self, key: &str, value: &str) {
        std::env::set_var(key, value);
    }

    fn remove(&self, key: &str) {
        std::env::remove_var(key);
    }

    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }
}

/// In-memory store with the same contract as the process environment.
#[derive(Debug, Default)]
pub struct MemoryEnv {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }
}

impl EnvStore for MemoryEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.values
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
