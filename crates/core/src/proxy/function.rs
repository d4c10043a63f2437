//! Registered callables and the name -> callable table transports dispatch on.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::ProxyError;

/// A callable registered on a proxy server.
///
/// Takes the JSON params sent by the client (`Value::Null` when there are
/// none) and resolves to the JSON result.
pub type ProxyFunction =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ProxyError>> + Send + Sync>;

/// Wraps an async closure into a [`ProxyFunction`].
pub fn proxy_function<F, Fut>(f: F) -> ProxyFunction
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ProxyError>> + Send + 'static,
{
    Arc::new(move |params| Box::pin(f(params)))
}

/// Name-keyed table of registered functions.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, ProxyFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `function` under `name`, rejecting duplicates.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        function: ProxyFunction,
    ) -> Result<(), ProxyError> {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(ProxyError::DuplicateRegistration { name });
        }
        self.functions.insert(name, function);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<ProxyFunction> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Looks up `name` and invokes it with `params`.
    pub async fn invoke(&self, name: &str, params: Value) -> Result<Value, ProxyError> {
        let function = self
            .get(name)
            .ok_or_else(|| ProxyError::unknown_function(name))?;
        function(params).await
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
