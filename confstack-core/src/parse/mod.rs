//! Parser adapters turning raw file bytes into flat key/value mappings.

mod dotenv;
mod yaml;

use std::collections::BTreeMap;

use crate::error::Result;

pub use dotenv::DotenvParser;
pub use yaml::YamlParser;

pub trait EnvFileParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<BTreeMap<String, String>>;
}
