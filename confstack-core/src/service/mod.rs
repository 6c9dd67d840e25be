//! The resolution engine: the single authoritative read/write path for
//! configuration values.
//!
//! Lookup precedence, highest to lowest, each step short-circuiting on the
//! first defined result (`Value::Null` counts as defined, absence does not):
//!
//! 1. the validated mapping, when a validator ran at load time;
//! 2. the registry host holding factory output (and later `set` writes);
//! 3. the environment store, unless configured out.
//!
//! Only the environment step is memoized when caching is enabled: validated
//! and registry values are immutable outside `set`, while caching the store
//! read trades freshness for speed. A cached path no longer observes
//! external environment changes until the next `set` on it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::env::EnvStore;
use crate::error::{Error, Result};
use crate::events::{ChangeBus, ConfigChangeEvent};
use crate::expand::{self, ExpandOptions};
use crate::loader::LoadedSignal;
use crate::path::{get_path, set_path};
use crate::registry::FactoryRegistration;

/// A predefined property path with an optional default, for call sites that
/// pass lookups around as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigKey {
    pub path: String,
    pub default: Option<Value>,
}

impl ConfigKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            default: None,
        }
    }

    pub fn with_default(path: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            default: Some(default.into()),
        }
    }
}

pub(crate) struct ServiceParts {
    pub validated: Option<Value>,
    pub host: Value,
    pub env: Arc<dyn EnvStore>,
    pub cache_enabled: bool,
    pub skip_process_env: bool,
    pub ignore_env_vars_on_get: bool,
    pub template: Option<BTreeMap<String, String>>,
    pub expand: Option<ExpandOptions>,
    pub signal: LoadedSignal,
}

pub struct ConfigService {
    validated: Option<Value>,
    host: RwLock<Value>,
    env: Arc<dyn EnvStore>,
    cache: Mutex<HashMap<String, Value>>,
    cache_enabled: bool,
    skip_process_env: bool,
    ignore_env_vars_on_get: bool,
    /// Unexpanded file values, retained so `set` can re-resolve
    /// interpolations. Present only when expansion was enabled.
    template: Mutex<Option<BTreeMap<String, String>>>,
    expand: Option<ExpandOptions>,
    changes: ChangeBus,
    signal: LoadedSignal,
}

impl std::fmt::Debug for ConfigService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigService")
            .field("cache_enabled", &self.cache_enabled)
            .field("skip_process_env", &self.skip_process_env)
            .field("ignore_env_vars_on_get", &self.ignore_env_vars_on_get)
            .finish_non_exhaustive()
    }
}

impl ConfigService {
    pub(crate) fn new(parts: ServiceParts) -> Self {
        Self {
            validated: parts.validated,
            host: RwLock::new(parts.host),
            env: parts.env,
            cache: Mutex::new(HashMap::new()),
            cache_enabled: parts.cache_enabled,
            skip_process_env: parts.skip_process_env,
            ignore_env_vars_on_get: parts.ignore_env_vars_on_get,
            template: Mutex::new(parts.template),
            expand: parts.expand,
            changes: ChangeBus::default(),
            signal: parts.signal,
        }
    }

    /// Resolves `path`, or `None` when no source defines it.
    pub fn get(&self, path: &str) -> Option<Value> {
        if let Some(validated) = &self.validated {
            if let Some(value) = get_path(validated, path) {
                return Some(value.clone());
            }
        }
        {
            let host = self.host.read();
            if let Some(value) = get_path(&host, path) {
                return Some(value.clone());
            }
        }
        if self.skip_process_env || self.ignore_env_vars_on_get {
            return None;
        }
        self.env_lookup(path)
    }

    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.get(path).unwrap_or_else(|| default.into())
    }

    /// Typed read: deserializes the resolved value into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path) {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| Error::Config(format!("failed to deserialize '{path}': {err}"))),
            None => Ok(None),
        }
    }

    pub fn get_by_key(&self, key: &ConfigKey) -> Option<Value> {
        self.get(&key.path).or_else(|| key.default.clone())
    }

    /// Like [`get`](Self::get), but an undefined resolution is an error
    /// naming the path.
    pub fn require(&self, path: &str) -> Result<Value> {
        self.get(path)
            .ok_or_else(|| Error::UnknownKey(path.to_owned()))
    }

    pub fn require_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.get_or(path, default)
    }

    /// Writes `value` at `path` and keeps every backing store consistent.
    ///
    /// The registry host is always updated. Plain (dot-free) keys are also
    /// stringified into the environment store, and any file value that
    /// interpolates the key is re-expanded and rewritten there. Dotted paths
    /// stay host-only. One change event is published per call.
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        let value = value.into();
        let old_value = self.get(path);

        {
            let mut host = self.host.write();
            set_path(&mut host, path, value.clone());
        }

        if !path.contains('.') {
            let rendered = render_env_value(&value);
            self.env.set(path, &rendered);
            self.rewrite_interpolations(path, &rendered);
        }

        if self.cache_enabled {
            self.cache.lock().insert(path.to_owned(), value.clone());
        }

        self.changes.publish(ConfigChangeEvent {
            path: path.to_owned(),
            old_value,
            new_value: value,
        });
    }

    /// Change stream: one event per completed `set`, no replay for late
    /// subscribers.
    pub fn changes(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.changes.subscribe()
    }

    /// Merges one more factory registration after bootstrap.
    pub async fn merge_feature(&self, registration: FactoryRegistration) -> Result<()> {
        let partial = registration.factory.load().await?;
        let mut host = self.host.write();
        crate::registry::merge_partial(&mut host, partial, registration.token.as_ref());
        Ok(())
    }

    pub fn loaded_signal(&self) -> LoadedSignal {
        self.signal.clone()
    }

    fn env_lookup(&self, path: &str) -> Option<Value> {
        if !self.cache_enabled {
            return self.env.get(path).map(Value::String);
        }
        let mut cache = self.cache.lock();
        if let Some(value) = cache.get(path) {
            return Some(value.clone());
        }
        let value = self.env.get(path).map(Value::String)?;
        cache.insert(path.to_owned(), value.clone());
        Some(value)
    }

    /// Re-expands file values that reference `key` and rewrites their
    /// environment entries, so interpolations track the new value.
    fn rewrite_interpolations(&self, key: &str, rendered: &str) {
        let Some(options) = self.expand else {
            return;
        };
        let mut template_guard = self.template.lock();
        let Some(template) = template_guard.as_mut() else {
            return;
        };
        template.insert(key.to_owned(), rendered.to_owned());

        let snapshot = template.clone();
        let env = Arc::clone(&self.env);
        let lookup = move |name: &str| -> Option<String> {
            snapshot.get(name).cloned().or_else(|| {
                if options.ignore_process_env {
                    None
                } else {
                    env.get(name)
                }
            })
        };

        for (other_key, raw) in template.iter() {
            if other_key == key {
                continue;
            }
            if !expand::referenced_keys(raw).iter().any(|name| name == key) {
                continue;
            }
            match expand::expand_value(raw, &lookup) {
                Ok(expanded) => {
                    self.env.set(other_key, &expanded);
                    if self.cache_enabled {
                        self.cache
                            .lock()
                            .insert(other_key.clone(), Value::String(expanded));
                    }
                }
                Err(err) => {
                    tracing::warn!(key = %other_key, "failed to re-expand interpolated value: {err}");
                }
            }
        }
    }
}

fn render_env_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
