use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::parse::EnvFileParser;

/// YAML document parser. Nested mappings are flattened into dot-joined keys
/// (`database: {host: x}` becomes `database.host=x`); scalar leaves are
/// rendered as strings and sequences as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl EnvFileParser for YamlParser {
    fn parse(&self, bytes: &[u8]) -> Result<BTreeMap<String, String>> {
        let yaml_value = serde_yaml::from_slice::<serde_yaml::Value>(bytes)
            .map_err(|err| Error::Config(format!("failed parsing yaml document: {err}")))?;
        let json_value = serde_json::to_value(yaml_value)
            .map_err(|err| Error::Config(format!("failed converting yaml to json: {err}")))?;

        let Value::Object(root) = json_value else {
            return Err(Error::Config(
                "yaml environment document must be a mapping at the root".to_owned(),
            ));
        };

        let mut values = BTreeMap::new();
        for (key, value) in root {
            flatten(&key, value, &mut values);
        }
        Ok(values)
    }
}

fn flatten(prefix: &str, value: Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(object) => {
            for (key, value) in object {
                flatten(&format!("{prefix}.{key}"), value, out);
            }
        }
        Value::String(text) => {
            out.insert(prefix.to_owned(), text);
        }
        Value::Null => {
            out.insert(prefix.to_owned(), String::new());
        }
        other => {
            out.insert(prefix.to_owned(), other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::YamlParser;
    use crate::parse::EnvFileParser;

    #[test]
    fn flattens_nested_mappings() {
        let doc = b"database:\n  host: localhost\n  port: 5432\nname: myapp\n";
        let parsed = YamlParser.parse(doc).expect("parse should succeed");
        assert_eq!(
            parsed.get("database.host").map(String::as_str),
            Some("localhost")
        );
        assert_eq!(parsed.get("database.port").map(String::as_str), Some("5432"));
        assert_eq!(parsed.get("name").map(String::as_str), Some("myapp"));
    }

    #[test]
    fn rejects_non_mapping_root() {
        assert!(YamlParser.parse(b"- a\n- b\n").is_err());
    }
}
