//! Namespaced partial configurations contributed by factories.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

/// Namespace under which a factory's output is merged into the shared host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationToken(String);

impl RegistrationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Mints an anonymous token, for registrations that need a distinct
    /// namespace without a meaningful name.
    pub fn unique() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RegistrationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegistrationToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for RegistrationToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

#[async_trait]
pub trait ConfigFactory: Send + Sync {
    async fn load(&self) -> Result<Value>;
}

/// Wraps a synchronous closure as a factory.
pub struct FnFactory<F>(F);

impl<F> FnFactory<F>
where
    F: Fn() -> Value + Send + Sync,
{
    pub fn new(factory: F) -> Self {
        Self(factory)
    }
}

#[async_trait]
impl<F> ConfigFactory for FnFactory<F>
where
    F: Fn() -> Value + Send + Sync,
{
    async fn load(&self) -> Result<Value> {
        Ok((self.0)())
    }
}

/// Wraps an asynchronous closure as a factory.
pub struct AsyncFactory<F>(F);

impl<F, Fut> AsyncFactory<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    pub fn new(factory: F) -> Self {
        Self(factory)
    }
}

#[async_trait]
impl<F, Fut> ConfigFactory for AsyncFactory<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn load(&self) -> Result<Value> {
        (self.0)().await
    }
}

/// A factory paired with its optional namespace token. Registrations are
/// plain data and travel with the options that carry them.
#[derive(Clone)]
pub struct FactoryRegistration {
    pub token: Option<RegistrationToken>,
    pub factory: Arc<dyn ConfigFactory>,
}

/// Tags a factory with the namespace its output is merged under.
pub fn register_as(
    token: impl Into<RegistrationToken>,
    factory: impl ConfigFactory + 'static,
) -> FactoryRegistration {
    FactoryRegistration {
        token: Some(token.into()),
        factory: Arc::new(factory),
    }
}

/// Registers a factory without a namespace; its keys merge into the host
/// directly.
pub fn registration(factory: impl ConfigFactory + 'static) -> FactoryRegistration {
    FactoryRegistration {
        token: None,
        factory: Arc::new(factory),
    }
}

/// Merges a factory's output into the host.
///
/// With a token, the partial replaces whatever the host held at that key.
/// Without one, the partial's own keys shallow-merge into the host, so
/// same-named keys from later registrations win.
pub fn merge_partial(host: &mut Value, partial: Value, token: Option<&RegistrationToken>) {
    let Some(object) = host.as_object_mut() else {
        return;
    };
    match token {
        Some(token) => {
            object.insert(token.as_str().to_owned(), partial);
        }
        None => {
            if let Value::Object(partial) = partial {
                for (key, value) in partial {
                    object.insert(key, value);
                }
            }
        }
    }
}
