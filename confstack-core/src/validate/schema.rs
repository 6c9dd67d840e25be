use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::validate::{ConfigValidator, ValidationOptions};

/// JSON Schema adapter.
///
/// Environment values arrive as strings, so before validation string scalars
/// are coerced to the `integer`/`number`/`boolean` type the schema declares
/// for their property, when they parse cleanly. The coerced configuration is
/// what gets returned on success.
pub struct JsonSchemaValidator {
    schema: Value,
    compiled: JSONSchema,
    options: ValidationOptions,
}

impl JsonSchemaValidator {
    pub fn new(schema: Value) -> Result<Self> {
        Self::with_options(schema, ValidationOptions::default())
    }

    pub fn with_options(schema: Value, options: ValidationOptions) -> Result<Self> {
        let compiled = JSONSchema::compile(&schema)
            .map_err(|err| Error::Config(format!("failed compiling validation schema: {err}")))?;
        Ok(Self {
            schema,
            compiled,
            options,
        })
    }

    fn declared_type(&self, key: &str) -> Option<&str> {
        self.schema
            .get("properties")
            .and_then(|properties| properties.get(key))
            .and_then(|property| property.get("type"))
            .and_then(Value::as_str)
    }

    fn coerce(&self, config: Value) -> Value {
        match config {
            Value::Object(object) => Value::Object(
                object
                    .into_iter()
                    .map(|(key, value)| {
                        let value = self.coerce_value(&key, value);
                        (key, value)
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    fn coerce_value(&self, key: &str, value: Value) -> Value {
        match value {
            Value::String(text) => match self.declared_type(key) {
                Some("integer") => match text.parse::<i64>() {
                    Ok(number) => Value::from(number),
                    Err(_) => Value::String(text),
                },
                Some("number") => match text.parse::<f64>() {
                    Ok(number) => Value::from(number),
                    Err(_) => Value::String(text),
                },
                Some("boolean") if text.eq_ignore_ascii_case("true") => Value::Bool(true),
                Some("boolean") if text.eq_ignore_ascii_case("false") => Value::Bool(false),
                _ => Value::String(text),
            },
            other => other,
        }
    }
}

impl ConfigValidator for JsonSchemaValidator {
    fn validate(&self, config: Value) -> Result<Value> {
        let coerced = self.coerce(config);

        let mut details: Vec<String> = Vec::new();
        if !self.options.allow_unknown {
            if let (Some(object), Some(properties)) = (
                coerced.as_object(),
                self.schema.get("properties").and_then(Value::as_object),
            ) {
                for key in object.keys() {
                    if !properties.contains_key(key) {
                        details.push(format!("/{key}: \"{key}\" is not allowed"));
                    }
                }
            }
        }

        if let Err(errors) = self.compiled.validate(&coerced) {
            details.extend(errors.map(|err| format!("{}: {}", err.instance_path, err)));
        }

        if !details.is_empty() {
            if self.options.abort_early {
                details.truncate(1);
            }
            return Err(Error::Validation(details.join("\n")));
        }

        Ok(coerced)
    }
}
