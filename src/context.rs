/**
 * Context — Lexically Scoped Variable Environment
 *
 * DESIGN DECISION: An explicit stack of scopes rather than a single mutable
 * map with manual save/restore of shadowed bindings
 * WHY: `forall`/`exists`/`fixpoint` each introduce exactly one bound
 * variable for exactly the lifetime of one sub-evaluation (§4.2). A stack
 * makes "push before, pop after, on every path" a structural guarantee
 * instead of a convention callers have to remember.
 *
 * REASONING CHAIN:
 * 1. `get` must walk innermost scope outward so a quantifier's bound
 *    variable shadows an outer variable of the same name.
 * 2. `bind` only ever touches the top scope — it cannot reach into an
 *    enclosing scope and mutate a caller's binding.
 * 3. `pop_scope` on an empty stack is a bug in the evaluator, not a user
 *    error, so it reports `InternalInvariant` rather than `NameError`.
 * 4. The depth counter lets callers (and tests) assert the scope-balance
 *    property (§8, property 1) without reaching into private state.
 *
 * PATTERN: scope-stack environment (grounded on aetherlight-core's layered
 * ConfigLevel resolution, generalized from config tiers to lexical scopes)
 */
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::value::{Obj, Value};

/// A lexically scoped environment of variable bindings.
///
/// Not `Send`/`Sync` by design (§5): a single `Context` is never shared
/// across threads during one evaluation.
#[derive(Debug, Clone, Default)]
pub struct Context {
    scopes: Vec<HashMap<String, Value>>,
}

impl Context {
    /// A context with a single, empty root scope.
    pub fn new() -> Self {
        Context {
            scopes: vec![HashMap::new()],
        }
    }

    /// How many scopes are currently on the stack. Used to assert scope
    /// balance around quantifier/fixpoint evaluation.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the innermost scope. An empty stack after this call would mean
    /// the root scope itself was popped — that is an interpreter bug.
    pub fn pop_scope(&mut self) -> Result<()> {
        if self.scopes.len() <= 1 {
            return Err(Error::InternalInvariant(
                "attempted to pop the root scope".to_string(),
            ));
        }
        self.scopes.pop();
        Ok(())
    }

    /// Install `name` into the innermost scope, shadowing any outer binding
    /// of the same name for the lifetime of that scope.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        let scope = self
            .scopes
            .last_mut()
            .expect("Context always has at least a root scope");
        scope.insert(name.into(), value);
    }

    /// Resolve `name`, walking from the innermost scope outward.
    pub fn get(&self, name: &str) -> Result<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Ok(value.clone());
            }
        }
        Err(Error::NameError(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains_key(name))
    }

    /// Flatten every active scope into a single Object, innermost binding
    /// winning on name clashes — the "context snapshot" a trace record
    /// captures alongside a node's inputs and outcome (§4.4).
    pub fn snapshot(&self) -> Value {
        let mut obj = Obj::new();
        for scope in &self.scopes {
            for (name, value) in scope {
                obj.insert(name.clone(), value.clone());
            }
        }
        Value::Object(obj)
    }
}
