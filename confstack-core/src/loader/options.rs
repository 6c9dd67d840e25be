use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::env::{EnvStore, ProcessEnv};
use crate::error::Result;
use crate::expand::ExpandOptions;
use crate::loader::LoadedSignal;
use crate::parse::{DotenvParser, EnvFileParser};
use crate::registry::FactoryRegistration;
use crate::validate::{ConfigValidator, FnValidator, JsonSchemaValidator, ValidationOptions};

/// Options for one configuration load.
///
/// ```no_run
/// use confstack_core::ConfigOptions;
///
/// # async fn bootstrap() -> confstack_core::Result<()> {
/// let config = ConfigOptions::new()
///     .env_file(".env")
///     .expand_variables()
///     .cache(true)
///     .load()
///     .await?;
/// let port = config.get_or("PORT", 3000);
/// # let _ = port;
/// # Ok(())
/// # }
/// ```
#[must_use = "options do nothing until .load() is awaited"]
pub struct ConfigOptions {
    pub(crate) env_file_paths: Vec<PathBuf>,
    pub(crate) explicit_paths: bool,
    pub(crate) ignore_env_file: bool,
    pub(crate) ignore_env_vars: bool,
    pub(crate) expand: Option<ExpandOptions>,
    pub(crate) validator: Option<Arc<dyn ConfigValidator>>,
    pub(crate) factories: Vec<FactoryRegistration>,
    pub(crate) cache: bool,
    pub(crate) skip_process_env: bool,
    pub(crate) ignore_env_vars_on_get: bool,
    pub(crate) parser: Arc<dyn EnvFileParser>,
    pub(crate) override_env: bool,
    pub(crate) env: Arc<dyn EnvStore>,
    pub(crate) signal: LoadedSignal,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            env_file_paths: vec![PathBuf::from("./.env")],
            explicit_paths: false,
            ignore_env_file: false,
            ignore_env_vars: false,
            expand: None,
            validator: None,
            factories: Vec::new(),
            cache: false,
            skip_process_env: false,
            ignore_env_vars_on_get: false,
            parser: Arc::new(DotenvParser),
            override_env: false,
            env: Arc::new(ProcessEnv),
            signal: LoadedSignal::new(),
        }
    }
}

impl ConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an environment file. Files are consulted in the order listed and
    /// earlier files win on conflicting keys. A file named here must exist.
    pub fn env_file(mut self, path: impl AsRef<Path>) -> Self {
        if !self.explicit_paths {
            self.env_file_paths.clear();
            self.explicit_paths = true;
        }
        self.env_file_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn env_files<P: AsRef<Path>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        for path in paths {
            self = self.env_file(path);
        }
        self
    }

    pub fn ignore_env_file(mut self, ignore: bool) -> Self {
        self.ignore_env_file = ignore;
        self
    }

    /// Excludes predefined environment variables from the merged mapping
    /// (and therefore from validation).
    pub fn ignore_env_vars(mut self, ignore: bool) -> Self {
        self.ignore_env_vars = ignore;
        self
    }

    pub fn expand_variables(self) -> Self {
        self.expand_variables_with(ExpandOptions::default())
    }

    pub fn expand_variables_with(mut self, options: ExpandOptions) -> Self {
        self.expand = Some(options);
        self
    }

    pub fn validator(mut self, validator: impl ConfigValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Validates the merged mapping against a JSON Schema.
    pub fn validation_schema(self, schema: Value) -> Result<Self> {
        self.validation_schema_with(schema, ValidationOptions::default())
    }

    pub fn validation_schema_with(
        self,
        schema: Value,
        options: ValidationOptions,
    ) -> Result<Self> {
        let validator = JsonSchemaValidator::with_options(schema, options)?;
        Ok(self.validator(validator))
    }

    /// Validates with a plain function; its return value becomes the
    /// authoritative validated mapping.
    pub fn validate_with<F>(self, validate: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.validator(FnValidator::new(validate))
    }

    /// Queues a configuration factory for this load.
    pub fn register(mut self, registration: FactoryRegistration) -> Self {
        self.factories.push(registration);
        self
    }

    /// Memoizes environment-store reads per path. Trades freshness for
    /// speed: a cached path no longer observes external environment changes.
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn skip_process_env(mut self, skip: bool) -> Self {
        self.skip_process_env = skip;
        self
    }

    pub fn ignore_env_vars_on_get(mut self, ignore: bool) -> Self {
        self.ignore_env_vars_on_get = ignore;
        self
    }

    /// Lets file-sourced values overwrite predefined environment variables,
    /// both in the merged mapping and on write-back.
    pub fn override_env(mut self, override_env: bool) -> Self {
        self.override_env = override_env;
        self
    }

    pub fn parser(mut self, parser: impl EnvFileParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Injects the environment backing store. Defaults to the live process
    /// environment.
    pub fn env_store(mut self, env: Arc<dyn EnvStore>) -> Self {
        self.env = env;
        self
    }

    /// Handle on the one-shot loaded signal, for collaborators that must
    /// suspend until configuration is available.
    pub fn loaded_signal(&self) -> LoadedSignal {
        self.signal.clone()
    }
}
