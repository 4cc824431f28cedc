//! Method registry used when this side answers calls.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::binder::Argument;
use crate::error::{HandlerError, RegistrationError};

/// Result of a handler invocation. `Ok(None)` is reported to the caller as `true`.
pub type HandlerResult = Result<Option<Value>, HandlerError>;

/// How a request's `params` are turned into handler arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingMode {
    /// The whole params value is handed over as a single argument
    Pass,
    /// Object params are destructured into these names, in this order
    Named(Vec<String>),
    /// Array params are spread as positional arguments
    Positional,
    /// The handler takes no protocol arguments, only the routing context
    None,
}

impl BindingMode {
    /// Convenience constructor for [`BindingMode::Named`]
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BindingMode::Named(names.into_iter().map(Into::into).collect())
    }
}

/// Trait for handling JSON-RPC method calls
///
/// `C` is the routing context handed to [`crate::JsonRpcEngine::handle_message`];
/// it reaches the handler unchanged.
#[async_trait]
pub trait MethodHandler<C>: Send + Sync {
    async fn handle(&self, args: Vec<Argument>, context: C) -> HandlerResult;
}

/// A closure-based handler
pub struct FunctionHandler<F> {
    handler_fn: F,
}

impl<F> FunctionHandler<F> {
    pub fn new<C, Fut>(handler_fn: F) -> Self
    where
        F: Fn(Vec<Argument>, C) -> Fut + Send + Sync,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self { handler_fn }
    }
}

#[async_trait]
impl<C, F, Fut> MethodHandler<C> for FunctionHandler<F>
where
    C: Send + 'static,
    F: Fn(Vec<Argument>, C) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, args: Vec<Argument>, context: C) -> HandlerResult {
        (self.handler_fn)(args, context).await
    }
}

/// A registered method: its binding mode and a shared reference to the handler
pub struct RegistryEntry<C> {
    pub mode: BindingMode,
    pub handler: Arc<dyn MethodHandler<C>>,
}

impl<C> Clone for RegistryEntry<C> {
    fn clone(&self) -> Self {
        Self {
            mode: self.mode.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Mapping from method name to handler
pub struct DispatchRegistry<C> {
    methods: RwLock<HashMap<String, RegistryEntry<C>>>,
}

impl<C> DispatchRegistry<C>
where
    C: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) a method.
    ///
    /// Invalid names are rejected immediately; nothing is stored in that case.
    pub fn register(
        &self,
        method: impl Into<String>,
        mode: BindingMode,
        handler: Arc<dyn MethodHandler<C>>,
    ) -> Result<(), RegistrationError> {
        let method = method.into();
        validate(&method, &mode)?;

        let replaced = self
            .methods
            .write()
            .insert(method.clone(), RegistryEntry { mode, handler })
            .is_some();
        debug!(method = %method, replaced, "Registered method");
        Ok(())
    }

    /// Remove a method. Returns whether it was registered.
    pub fn deregister(&self, method: &str) -> bool {
        let removed = self.methods.write().remove(method).is_some();
        if removed {
            debug!(method = %method, "Deregistered method");
        }
        removed
    }

    /// Snapshot of the entry for `method`; the lock is not held afterwards
    pub fn lookup(&self, method: &str) -> Option<RegistryEntry<C>> {
        self.methods.read().get(method).cloned()
    }

    /// Get all registered methods, sorted
    pub fn registered_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.methods.read().keys().cloned().collect();
        methods.sort();
        methods
    }

    pub fn clear(&self) {
        self.methods.write().clear();
    }
}

impl<C> Default for DispatchRegistry<C>
where
    C: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn validate(method: &str, mode: &BindingMode) -> Result<(), RegistrationError> {
    if method.is_empty() {
        return Err(RegistrationError::EmptyMethodName);
    }
    if method.starts_with("rpc.") {
        return Err(RegistrationError::ReservedMethodName(method.to_string()));
    }
    if let BindingMode::Named(names) = mode {
        let mut seen = HashSet::new();
        for name in names {
            if name.is_empty() {
                return Err(RegistrationError::EmptyParameterName(method.to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(RegistrationError::DuplicateParameter {
                    method: method.to_string(),
                    parameter: name.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> Arc<dyn MethodHandler<()>> {
        Arc::new(FunctionHandler::new(|args: Vec<Argument>, _ctx: ()| async move {
            Ok(args.into_iter().next().and_then(Argument::into_value))
        }))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = DispatchRegistry::new();
        registry
            .register("echo", BindingMode::Pass, echo())
            .unwrap();
        registry
            .register("add", BindingMode::named(["a", "b"]), echo())
            .unwrap();

        assert_eq!(registry.registered_methods(), vec!["add", "echo"]);
        let entry = registry.lookup("add").unwrap();
        assert_eq!(entry.mode, BindingMode::named(["a", "b"]));
        assert!(registry.lookup("ghost").is_none());
    }

    #[test]
    fn test_register_overwrites() {
        let registry = DispatchRegistry::new();
        registry.register("m", BindingMode::Pass, echo()).unwrap();
        registry.register("m", BindingMode::None, echo()).unwrap();
        assert_eq!(registry.lookup("m").unwrap().mode, BindingMode::None);
        assert_eq!(registry.registered_methods().len(), 1);
    }

    #[test]
    fn test_deregister() {
        let registry = DispatchRegistry::new();
        registry.register("m", BindingMode::Pass, echo()).unwrap();
        assert!(registry.deregister("m"));
        assert!(!registry.deregister("m"));
        assert!(registry.lookup("m").is_none());
    }

    #[test]
    fn test_invalid_registrations_fail_immediately() {
        let registry = DispatchRegistry::new();
        assert_eq!(
            registry.register("", BindingMode::Pass, echo()),
            Err(RegistrationError::EmptyMethodName)
        );
        assert_eq!(
            registry.register("rpc.discover", BindingMode::Pass, echo()),
            Err(RegistrationError::ReservedMethodName("rpc.discover".to_string()))
        );
        assert_eq!(
            registry.register("m", BindingMode::named(["a", ""]), echo()),
            Err(RegistrationError::EmptyParameterName("m".to_string()))
        );
        assert_eq!(
            registry.register("m", BindingMode::named(["a", "a"]), echo()),
            Err(RegistrationError::DuplicateParameter {
                method: "m".to_string(),
                parameter: "a".to_string()
            })
        );
        assert!(registry.registered_methods().is_empty());
    }

    #[tokio::test]
    async fn test_function_handler() {
        let handler = echo();
        let result = handler
            .handle(vec![Argument::Value(json!({"x": 1}))], ())
            .await
            .unwrap();
        assert_eq!(result, Some(json!({"x": 1})));
    }
}
