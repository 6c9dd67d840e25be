//! Validator adapters.
//!
//! Every concrete validator implements the single [`ConfigValidator`]
//! capability: take the merged configuration, return an error or the
//! validated (possibly transformed) configuration.

mod schema;

use serde_json::Value;

use crate::error::Result;

pub use schema::JsonSchemaValidator;

pub trait ConfigValidator: Send + Sync {
    fn validate(&self, config: Value) -> Result<Value>;
}

#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Accept top-level keys the schema does not declare.
    pub allow_unknown: bool,
    /// Report only the first violation instead of aggregating all of them.
    pub abort_early: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            allow_unknown: true,
            abort_early: false,
        }
    }
}

/// Adapts a plain `validate(config) -> config` function.
pub struct FnValidator<F>(F);

impl<F> FnValidator<F>
where
    F: Fn(Value) -> Result<Value> + Send + Sync,
{
    pub fn new(validate: F) -> Self {
        Self(validate)
    }
}

impl<F> ConfigValidator for FnValidator<F>
where
    F: Fn(Value) -> Result<Value> + Send + Sync,
{
    fn validate(&self, config: Value) -> Result<Value> {
        (self.0)(config)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ConfigValidator, FnValidator};
    use crate::error::Error;

    #[test]
    fn fn_validator_returns_the_transformed_config() {
        let validator = FnValidator::new(|mut config| {
            config["extra"] = json!(true);
            Ok(config)
        });
        let validated = validator.validate(json!({"PORT": "4000"})).expect("valid");
        assert_eq!(validated, json!({"PORT": "4000", "extra": true}));
    }

    #[test]
    fn fn_validator_propagates_rejections() {
        let validator = FnValidator::new(|_config| {
            Err(Error::Validation("PORT is required".to_owned()))
        });
        let error = validator
            .validate(json!({}))
            .expect_err("rejection must surface");
        assert!(error.to_string().contains("PORT is required"));
    }
}
