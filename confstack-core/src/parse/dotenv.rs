use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::parse::EnvFileParser;

/// `KEY=VALUE` line parser. Blank lines and `#` comments are skipped, an
/// `export ` prefix is tolerated, and matching surrounding quotes are
/// stripped from values.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotenvParser;

impl EnvFileParser for DotenvParser {
    fn parse(&self, bytes: &[u8]) -> Result<BTreeMap<String, String>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|err| Error::Config(format!("environment file is not valid utf-8: {err}")))?;

        let mut values = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            values.insert(key.to_owned(), unquote(value.trim()).to_owned());
        }
        Ok(values)
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}
