pub mod env;
pub mod error;
pub mod events;
pub mod expand;
pub mod loader;
pub mod logging;
pub mod parse;
pub mod path;
pub mod registry;
pub mod service;
pub mod validate;

pub use env::{EnvStore, MemoryEnv, ProcessEnv};
pub use error::{Error, Result};
pub use events::ConfigChangeEvent;
pub use expand::ExpandOptions;
pub use loader::{ConfigOptions, LoadedSignal};
pub use parse::{DotenvParser, EnvFileParser, YamlParser};
pub use registry::{
    register_as, registration, AsyncFactory, ConfigFactory, FactoryRegistration, FnFactory,
    RegistrationToken,
};
pub use service::{ConfigKey, ConfigService};
pub use validate::{ConfigValidator, FnValidator, JsonSchemaValidator, ValidationOptions};
