//! Turns a request's `params` into a handler's argument list.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{HandlerError, JsonRpcErrorObject};
use crate::registry::BindingMode;
use crate::request::RequestParams;

/// One bound argument. `Missing` marks a declared name the caller did not supply,
/// which is distinct from an explicit `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Value),
    Missing,
}

impl Argument {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Argument::Value(value) => Some(value),
            Argument::Missing => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Argument::Value(value) => Some(value),
            Argument::Missing => None,
        }
    }

    /// Deserialize a required argument, failing with INVALID_PARAMS
    pub fn parse<T: DeserializeOwned>(&self, name: &str) -> Result<T, HandlerError> {
        let value = self.as_value().ok_or_else(|| {
            JsonRpcErrorObject::invalid_params(Some(Value::String(format!(
                "missing argument '{}'",
                name
            ))))
        })?;
        serde_json::from_value(value.clone()).map_err(|e| {
            JsonRpcErrorObject::invalid_params(Some(Value::String(format!(
                "argument '{}': {}",
                name, e
            ))))
            .into()
        })
    }
}

/// Bind `params` for `method` according to its declared mode.
///
/// The routing context is not part of the returned list; it is handed to the
/// handler separately and always follows the protocol arguments.
pub fn bind(
    method: &str,
    mode: &BindingMode,
    params: Option<RequestParams>,
) -> Result<Vec<Argument>, JsonRpcErrorObject> {
    match (mode, params) {
        (BindingMode::Pass, params) => Ok(vec![
            params
                .map(|p| Argument::Value(p.into_value()))
                .unwrap_or(Argument::Missing),
        ]),
        (_, None) => Ok(Vec::new()),
        (BindingMode::None, Some(RequestParams::Array(items))) if !items.is_empty() => {
            Err(JsonRpcErrorObject::invalid_params(Some(Value::String(
                format!("method {} takes no arguments", method),
            ))))
        }
        (_, Some(RequestParams::Array(items))) => {
            Ok(items.into_iter().map(Argument::Value).collect())
        }
        (BindingMode::Named(names), Some(RequestParams::Object(mut supplied))) => {
            let args = names
                .iter()
                .map(|name| {
                    supplied
                        .remove(name)
                        .map(Argument::Value)
                        .unwrap_or(Argument::Missing)
                })
                .collect();

            if !supplied.is_empty() {
                let mut unused: Vec<String> = supplied.keys().cloned().collect();
                unused.sort();
                let unused: Vec<Value> = unused.into_iter().map(Value::String).collect();
                return Err(JsonRpcErrorObject::invalid_params(Some(Value::Array(unused))));
            }
            Ok(args)
        }
        (_, Some(RequestParams::Object(_))) => Err(JsonRpcErrorObject::invalid_params(Some(
            Value::String(format!("undeclared arguments for method {}", method)),
        ))),
    }
}
