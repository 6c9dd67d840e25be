//! Environment source orchestration.
//!
//! The loader reads the configured environment files (earlier files win),
//! overlays predefined environment variables, runs the configured validator,
//! writes top-level scalars back into the environment store, resolves the
//! registered factories, and hands the result to the resolution engine.

mod options;
mod signal;

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::expand;
use crate::registry::merge_partial;
use crate::service::{ConfigService, ServiceParts};

pub use options::ConfigOptions;
pub use signal::LoadedSignal;

impl ConfigOptions {
    /// Runs the load pipeline and wires the resolution engine.
    ///
    /// A validation failure or a missing explicitly named file aborts the
    /// load; a missing default `./.env` is tolerated silently.
    pub async fn load(self) -> Result<ConfigService> {
        let env = Arc::clone(&self.env);

        // Unexpanded file values, earlier listed files winning on conflicts.
        let mut raw_files: BTreeMap<String, String> = BTreeMap::new();
        let mut accumulator: BTreeMap<String, String> = BTreeMap::new();
        if !self.ignore_env_file {
            for path in &self.env_file_paths {
                let bytes = match std::fs::read(path) {
                    Ok(bytes) => bytes,
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {
                        if self.explicit_paths {
                            return Err(Error::EnvFileNotFound(path.clone()));
                        }
                        tracing::debug!(
                            path = %path.display(),
                            "default environment file not found, skipping"
                        );
                        continue;
                    }
                    Err(err) => {
                        return Err(Error::EnvFileRead {
                            path: path.clone(),
                            source: err,
                        })
                    }
                };
                let parsed = self.parser.parse(&bytes).map_err(|err| Error::Parse {
                    path: path.clone(),
                    message: err.to_string(),
                })?;
                for (key, value) in parsed {
                    raw_files.entry(key).or_insert(value);
                }
                accumulator = raw_files.clone();
                if let Some(expand_options) = self.expand {
                    expand::expand_mapping(&mut accumulator, env.as_ref(), expand_options)?;
                }
            }
        }

        let mut merged = accumulator;
        if !self.ignore_env_vars {
            for (key, value) in env.vars() {
                if self.override_env {
                    merged.entry(key).or_insert(value);
                } else {
                    merged.insert(key, value);
                }
            }
        }

        let merged_value = Value::Object(
            merged
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect::<Map<String, Value>>(),
        );

        let validated = match &self.validator {
            Some(validator) => Some(validator.validate(merged_value.clone())?),
            None => None,
        };

        // Only top-level scalars reach the store; structured values would
        // corrupt it.
        let write_back = validated.as_ref().unwrap_or(&merged_value);
        if let Some(object) = write_back.as_object() {
            for (key, value) in object {
                let Some(rendered) = scalar_to_string(value) else {
                    continue;
                };
                if self.override_env || !env.contains(key) {
                    env.set(key, &rendered);
                }
            }
        }

        let mut host = Value::Object(Map::new());
        let outputs = futures::future::try_join_all(
            self.factories
                .iter()
                .map(|registration| registration.factory.load()),
        )
        .await?;
        for (registration, output) in self.factories.iter().zip(outputs) {
            merge_partial(&mut host, output, registration.token.as_ref());
        }

        tracing::debug!(
            keys = merged.len(),
            factories = self.factories.len(),
            "environment configuration loaded"
        );

        let service = ConfigService::new(ServiceParts {
            validated,
            host,
            env,
            cache_enabled: self.cache,
            skip_process_env: self.skip_process_env,
            ignore_env_vars_on_get: self.ignore_env_vars_on_get,
            template: self.expand.map(|_| raw_files),
            expand: self.expand,
            signal: self.signal.clone(),
        });
        self.signal.fire();
        Ok(service)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::ConfigOptions;
    use crate::env::{EnvStore, MemoryEnv};
    use crate::error::Error;
    use crate::registry::{register_as, registration, AsyncFactory, FnFactory};

    fn env_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "{contents}").expect("write temp file");
        file
    }

    #[tokio::test]
    async fn earlier_listed_files_win() {
        let first = env_file("PORT=3000\n");
        let second = env_file("PORT=4000\nTIMEOUT=5000\n");
        let env = Arc::new(MemoryEnv::new());

        let config = ConfigOptions::new()
            .env_file(first.path())
            .env_file(second.path())
            .env_store(env.clone())
            .load()
            .await
            .expect("load");

        assert_eq!(config.get("PORT"), Some(json!("3000")));
        assert_eq!(config.get("TIMEOUT"), Some(json!("5000")));
    }

    #[tokio::test]
    async fn missing_explicit_file_is_fatal() {
        let error = ConfigOptions::new()
            .env_file("/nonexistent/.env.missing")
            .env_store(Arc::new(MemoryEnv::new()))
            .load()
            .await
            .expect_err("missing explicit file must fail");
        assert!(matches!(error, Error::EnvFileNotFound(_)));
    }

    #[tokio::test]
    async fn missing_default_file_is_tolerated() {
        let env = Arc::new(MemoryEnv::seeded([("NAME", "TEST")]));
        let config = ConfigOptions::new()
            .env_store(env)
            .load()
            .await
            .expect("load without a default .env");
        assert_eq!(config.get("NAME"), Some(json!("TEST")));
    }

    #[tokio::test]
    async fn predefined_variables_win_by_default() {
        let file = env_file("PORT=4000\n");
        let env = Arc::new(MemoryEnv::seeded([("PORT", "8000")]));

        let config = ConfigOptions::new()
            .env_file(file.path())
            .env_store(env.clone())
            .load()
            .await
            .expect("load");

        assert_eq!(config.get("PORT"), Some(json!("8000")));
        assert_eq!(env.get("PORT"), Some("8000".to_owned()));
    }

    #[tokio::test]
    async fn override_env_lets_file_values_win() {
        let file = env_file("PORT=4000\n");
        let env = Arc::new(MemoryEnv::seeded([("PORT", "8000")]));

        let config = ConfigOptions::new()
            .env_file(file.path())
            .env_store(env.clone())
            .override_env(true)
            .load()
            .await
            .expect("load");

        assert_eq!(config.get("PORT"), Some(json!("4000")));
        assert_eq!(env.get("PORT"), Some("4000".to_owned()));
    }

    #[tokio::test]
    async fn schema_validation_produces_the_authoritative_mapping() {
        let file = env_file("PORT=4000\nDATABASE_NAME=test\n");
        let env = Arc::new(MemoryEnv::seeded([("PORT", "8000")]));

        let config = ConfigOptions::new()
            .env_file(file.path())
            .env_store(env)
            .override_env(true)
            .validation_schema(json!({
                "type": "object",
                "properties": {
                    "PORT": {"type": "integer"},
                    "DATABASE_NAME": {"type": "string"}
                },
                "required": ["PORT", "DATABASE_NAME"]
            }))
            .expect("schema compiles")
            .load()
            .await
            .expect("load");

        assert_eq!(config.get("PORT"), Some(json!(4000)));
    }

    #[tokio::test]
    async fn schema_rejection_aborts_the_load() {
        let file = env_file("PORT=not-a-number\n");
        let error = ConfigOptions::new()
            .env_file(file.path())
            .env_store(Arc::new(MemoryEnv::new()))
            .ignore_env_vars(true)
            .validation_schema(json!({
                "type": "object",
                "properties": {"PORT": {"type": "integer"}},
                "required": ["PORT"]
            }))
            .expect("schema compiles")
            .load()
            .await
            .expect_err("validation must abort the load");
        assert!(matches!(error, Error::Validation(_)));
    }

    #[tokio::test]
    async fn only_top_level_scalars_are_written_back() {
        let env = Arc::new(MemoryEnv::new());
        ConfigOptions::new()
            .ignore_env_file(true)
            .env_store(env.clone())
            .validate_with(|_config| {
                Ok(json!({"PORT": "4000", "complex": {"hello": "there"}}))
            })
            .load()
            .await
            .expect("load");

        assert_eq!(env.get("PORT"), Some("4000".to_owned()));
        assert_eq!(env.get("complex"), None);
    }

    #[tokio::test]
    async fn factories_merge_under_their_tokens() {
        let env = Arc::new(MemoryEnv::new());
        let config = ConfigOptions::new()
            .ignore_env_file(true)
            .env_store(env)
            .register(register_as(
                "database",
                FnFactory::new(|| json!({"host": "localhost", "port": 5432})),
            ))
            .register(registration(FnFactory::new(|| json!({"NAME": "first"}))))
            .register(registration(AsyncFactory::new(|| async {
                Ok(json!({"NAME": "second", "subject": "value5000"}))
            })))
            .load()
            .await
            .expect("load");

        assert_eq!(config.get("database.host"), Some(json!("localhost")));
        assert_eq!(config.get("database.port"), Some(json!(5432)));
        // Untagged factories shallow-merge in registration order.
        assert_eq!(config.get("NAME"), Some(json!("second")));
        assert_eq!(config.get("subject"), Some(json!("value5000")));
    }

    #[tokio::test]
    async fn loaded_signal_fires_once_per_load() {
        let options = ConfigOptions::new()
            .ignore_env_file(true)
            .env_store(Arc::new(MemoryEnv::new()));
        let signal = options.loaded_signal();
        assert!(!signal.is_loaded());

        options.load().await.expect("load");

        assert!(signal.is_loaded());
        signal.wait().await;
        signal.wait().await;
    }

    #[tokio::test]
    async fn ignore_env_vars_excludes_predefined_variables() {
        let env = Arc::new(MemoryEnv::seeded([("RANDOM_PREDEFINED", "test")]));
        let config = ConfigOptions::new()
            .ignore_env_file(true)
            .ignore_env_vars(true)
            .skip_process_env(true)
            .env_store(env)
            .load()
            .await
            .expect("load");

        assert_eq!(config.get("RANDOM_PREDEFINED"), None);
    }
}
