/**
 * Function Registry — Qualified-Name Handler Map
 *
 * DESIGN DECISION: `HashMap<String, FunctionEntry>` behind a plain struct,
 * no interior mutability
 * WHY: §4.3 — "read-only during evaluation." The registry is built once
 * (at `Engine` construction) and shared thereafter; nothing inside an
 * evaluation ever mutates it, so there is no need for a `Mutex` or `RwLock`.
 *
 * REASONING CHAIN:
 * 1. `register` both installs new functions and replaces existing ones
 *    (§4.3: "installs or replaces"), so host applications can override a
 *    reference builtin with their own implementation.
 * 2. `call` validates arity before invoking the handler, then wraps any
 *    handler-returned error with the function name so the caller never has
 *    to reconstruct "which function failed" from a generic message.
 * 3. `purity_of` lets the evaluator's cache-eligibility check (§4.4) ask
 *    "is this call pure?" without invoking it.
 *
 * PATTERN: read-only post-construction map (grounded on aetherlight-core's
 * function_registry, narrowed from semantic search to exact lookup)
 */
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::value::Value;

use super::types::{check_arity, Arity, FunctionEntry, Handler, Purity};

/// A read-only-after-construction map from qualified function name to its
/// handler, arity, and purity tag.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionEntry>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry {
            functions: HashMap::new(),
        }
    }

    /// An empty registry plus every reference builtin from
    /// [`crate::function_registry::builtins::TABLE`].
    pub fn with_builtins() -> Self {
        let mut registry = FunctionRegistry::new();
        super::builtins::install(&mut registry);
        registry
    }

    /// Install or replace a handler. Replacing an existing name is logged
    /// at `warn` since it usually means a host app is overriding a
    /// reference builtin on purpose, but is worth surfacing.
    pub fn register(&mut self, name: impl Into<String>, arity: Arity, purity: Purity, handler: Handler) {
        let name = name.into();
        if self.functions.contains_key(&name) {
            warn!(function = %name, "replacing existing function registration");
        } else {
            debug!(function = %name, "registering function");
        }
        self.functions.insert(
            name.clone(),
            FunctionEntry {
                name,
                arity,
                purity,
                handler,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Whether `name` is impure, for the evaluator's cache-eligibility
    /// check. An unregistered name is treated as impure (fail-closed — an
    /// unresolved function cannot be cache-safe).
    pub fn is_pure(&self, name: &str) -> bool {
        self.functions
            .get(name)
            .map(|entry| entry.purity == Purity::Pure)
            .unwrap_or(false)
    }

    /// Validate arity, invoke the handler, and wrap any error with the
    /// function's name (§4.3).
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let entry = self
            .functions
            .get(name)
            .ok_or_else(|| Error::FunctionError {
                function: name.to_string(),
                message: "no such function registered".to_string(),
            })?;
        check_arity(name, entry.arity, args)?;
        (entry.handler)(args, self).map_err(|err| match err {
            Error::FunctionError { function, message } if function == name => {
                Error::FunctionError { function, message }
            }
            other => Error::FunctionError {
                function: name.to_string(),
                message: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn always_true(_args: &[Value], _registry: &FunctionRegistry) -> Result<Value> {
        Ok(Value::Boolean(true))
    }

    #[test]
    fn register_then_call_round_trips() {
        let mut registry = FunctionRegistry::new();
        registry.register("test.always_true", Arity::Exact(0), Purity::Pure, Arc::new(always_true));
        assert_eq!(registry.call("test.always_true", &[]).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn calling_unknown_function_is_a_function_error() {
        let registry = FunctionRegistry::new();
        let err = registry.call("nope", &[]).unwrap_err();
        assert!(matches!(err, Error::FunctionError { .. }));
    }

    #[test]
    fn calling_with_wrong_arity_is_a_function_error() {
        let mut registry = FunctionRegistry::new();
        registry.register("test.always_true", Arity::Exact(0), Purity::Pure, Arc::new(always_true));
        let err = registry.call("test.always_true", &[Value::Null]).unwrap_err();
        assert!(matches!(err, Error::FunctionError { .. }));
    }

    #[test]
    fn register_can_replace_an_existing_handler() {
        let mut registry = FunctionRegistry::new();
        registry.register("f", Arity::Exact(0), Purity::Pure, Arc::new(always_true));
        registry.register(
            "f",
            Arity::Exact(0),
            Purity::Pure,
            Arc::new(|_args: &[Value], _reg: &FunctionRegistry| Ok(Value::Boolean(false))),
        );
        assert_eq!(registry.call("f", &[]).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn unregistered_function_is_treated_as_impure() {
        let registry = FunctionRegistry::new();
        assert!(!registry.is_pure("nope"));
    }

    #[test]
    fn with_builtins_registers_the_standard_handlers() {
        let registry = FunctionRegistry::with_builtins();
        assert!(registry.contains("collection.count"));
        assert!(registry.contains("math.add"));
        assert!(!registry.is_pure("filesystem.read_file"));
    }
}
