//! `${KEY}` / `$KEY` interpolation expansion.
//!
//! References are resolved against the environment store first (unless
//! configured to ignore it) and the parsed mapping second; unresolved
//! references expand to the empty string. Expansion runs in passes until no
//! substitution is made, so chained references resolve; exceeding the pass
//! cap is reported as a circular reference.

use std::collections::BTreeMap;

use crate::env::EnvStore;
use crate::error::{Error, Result};

const MAX_PASSES: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpandOptions {
    /// Resolve references against the parsed mapping only, and do not write
    /// expanded values back into the environment store.
    pub ignore_process_env: bool,
}

/// Expands every value of `mapping` in place.
///
/// For keys the environment store already defines, the store's value is the
/// expansion base (predefined variables win); after expansion the resulting
/// values are written back into the store. Both behaviors are disabled by
/// `ignore_process_env`.
pub fn expand_mapping(
    mapping: &mut BTreeMap<String, String>,
    env: &dyn EnvStore,
    options: ExpandOptions,
) -> Result<()> {
    if !options.ignore_process_env {
        for (key, value) in mapping.iter_mut() {
            if let Some(env_value) = env.get(key) {
                *value = env_value;
            }
        }
    }

    for _ in 0..MAX_PASSES {
        let snapshot = mapping.clone();
        let lookup = |name: &str| -> Option<String> {
            if !options.ignore_process_env {
                if let Some(value) = env.get(name) {
                    if !value.is_empty() {
                        return Some(value);
                    }
                }
            }
            snapshot.get(name).cloned()
        };

        let mut substitutions = 0;
        for value in mapping.values_mut() {
            let (expanded, count) = substitute(value, &lookup);
            *value = expanded;
            substitutions += count;
        }

        if substitutions == 0 {
            if !options.ignore_process_env {
                for (key, value) in mapping.iter() {
                    env.set(key, value);
                }
            }
            return Ok(());
        }
    }

    Err(circular_reference())
}

/// Expands a single raw value to a fixed point against `lookup`.
pub fn expand_value(raw: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<String> {
    let mut value = raw.to_owned();
    for _ in 0..MAX_PASSES {
        let (expanded, substitutions) = substitute(&value, lookup);
        value = expanded;
        if substitutions == 0 {
            return Ok(value);
        }
    }
    Err(circular_reference())
}

/// Names referenced by `value`, in order of appearance.
pub fn referenced_keys(value: &str) -> Vec<String> {
    // The scanner is the single source of truth for reference syntax.
    let keys = std::cell::RefCell::new(Vec::new());
    let lookup = |name: &str| -> Option<String> {
        keys.borrow_mut().push(name.to_owned());
        None
    };
    let _ = substitute(value, &lookup);
    keys.into_inner()
}

fn substitute(value: &str, lookup: &dyn Fn(&str) -> Option<String>) -> (String, usize) {
    let mut result = String::with_capacity(value.len());
    let mut substitutions = 0;
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    // Unterminated reference stays literal.
                    result.push_str("${");
                    result.push_str(&name);
                    continue;
                }
                result.push_str(&lookup(&name).unwrap_or_default());
                substitutions += 1;
            }
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                let mut name = String::new();
                while let Some(c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || *c == '_' {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                result.push_str(&lookup(&name).unwrap_or_default());
                substitutions += 1;
            }
            _ => result.push('$'),
        }
    }

    (result, substitutions)
}

fn circular_reference() -> Error {
    Error::Config("circular reference detected while expanding environment variables".to_owned())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{expand_mapping, expand_value, referenced_keys, ExpandOptions};
    use crate::env::{EnvStore, MemoryEnv};

    fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn expands_braced_and_bare_references() {
        let env = MemoryEnv::new();
        let mut values = mapping(&[
            ("URL", "myapp.test"),
            ("EMAIL", "support@${URL}"),
            ("SHORT", "prefix-$URL"),
        ]);
        expand_mapping(&mut values, &env, ExpandOptions::default()).expect("expansion");
        assert_eq!(values["EMAIL"], "support@myapp.test");
        assert_eq!(values["SHORT"], "prefix-myapp.test");
    }

    #[test]
    fn expands_chained_references() {
        let env = MemoryEnv::new();
        let mut values = mapping(&[("A", "hello"), ("B", "${A} world"), ("C", "${B}!")]);
        expand_mapping(&mut values, &env, ExpandOptions::default()).expect("expansion");
        assert_eq!(values["C"], "hello world!");
    }

    #[test]
    fn predefined_store_value_is_the_expansion_base() {
        let env = MemoryEnv::seeded([("DB_URL", "protocol://${db_username}@127.0.0.1/test")]);
        let mut values = mapping(&[("DB_URL", "file-value"), ("db_username", "sa")]);
        expand_mapping(&mut values, &env, ExpandOptions::default()).expect("expansion");
        assert_eq!(values["DB_URL"], "protocol://sa@127.0.0.1/test");
        // Expanded values are written back into the store, overwriting it.
        assert_eq!(
            env.get("DB_URL"),
            Some("protocol://sa@127.0.0.1/test".to_owned())
        );
    }

    #[test]
    fn ignore_process_env_expands_from_the_mapping_alone() {
        let env = MemoryEnv::seeded([("URL", "process-app.test")]);
        let mut values = mapping(&[("URL", "myapp.test"), ("EMAIL", "support@${URL}")]);
        expand_mapping(
            &mut values,
            &env,
            ExpandOptions {
                ignore_process_env: true,
            },
        )
        .expect("expansion");
        assert_eq!(values["EMAIL"], "support@myapp.test");
        assert_eq!(env.get("EMAIL"), None);
    }

    #[test]
    fn unresolved_references_expand_to_empty() {
        let env = MemoryEnv::new();
        let mut values = mapping(&[("URL", "http://${MISSING}/api")]);
        expand_mapping(&mut values, &env, ExpandOptions::default()).expect("expansion");
        assert_eq!(values["URL"], "http:///api");
    }

    #[test]
    fn circular_references_are_detected() {
        let env = MemoryEnv::new();
        let mut values = mapping(&[("A", "${B}"), ("B", "${A}")]);
        let error = expand_mapping(&mut values, &env, ExpandOptions::default())
            .expect_err("circular reference must fail");
        assert!(error.to_string().contains("circular reference"));
    }

    #[test]
    fn expand_value_resolves_against_lookup() {
        let lookup = |name: &str| -> Option<String> {
            (name == "URL").then(|| "yourapp.test".to_owned())
        };
        let expanded = expand_value("support@${URL}", &lookup).expect("expansion");
        assert_eq!(expanded, "support@yourapp.test");
    }

    #[test]
    fn referenced_keys_reports_both_forms() {
        assert_eq!(
            referenced_keys("one ${A} two $B_2 three $$"),
            vec!["A".to_owned(), "B_2".to_owned()]
        );
    }
}
