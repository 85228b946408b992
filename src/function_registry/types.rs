/**
 * Function Registry Types — Handler Contract
 *
 * DESIGN DECISION: `Handler` receives `(&[Value], &FunctionRegistry)` rather
 * than just the argument slice
 * WHY: the Value model has no closure variant (§9 design notes, open
 * tension resolved in SPEC_FULL.md §4.3), so `collection.filter`/
 * `collection.map`'s second argument is a `String` naming another
 * registered unary function. A handler that needs to call back into another
 * registered function needs a reference to the registry itself.
 *
 * REASONING CHAIN:
 * 1. `Purity::Impure` functions (`filesystem.*`, `cpp.*`) disqualify any
 *    expression that calls them from the evaluator's cache (§4.4 Caching).
 * 2. Handlers are `Arc`-shared so `FunctionRegistry` itself can be cheaply
 *    cloned and shared across concurrent evaluations (§5).
 * 3. Arity is validated once, at `register`, against the static table —
 *    not re-derived by inspecting the handler at call time.
 */
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::Value;

use super::registry::FunctionRegistry;

/// Whether a function may read the filesystem or otherwise see state
/// outside the interpreter. Impure functions disqualify the calling
/// expression from caching (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purity {
    Pure,
    Impure,
}

/// A registered function body. Boxed so the registry can hold built-in
/// reference implementations and host-supplied handlers uniformly.
pub type Handler = Arc<dyn Fn(&[Value], &FunctionRegistry) -> Result<Value> + Send + Sync>;

/// A function's entry in the registry: its handler plus the metadata the
/// evaluator needs without calling it (purity, arity).
#[derive(Clone)]
pub struct FunctionEntry {
    pub name: String,
    pub arity: Arity,
    pub purity: Purity,
    pub handler: Handler,
}

impl fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("purity", &self.purity)
            .finish_non_exhaustive()
    }
}

/// How many arguments a function accepts. `Variadic` covers handlers whose
/// useful arity varies (none of the reference builtins need it today, but
/// host-supplied handlers may).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Variadic,
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => *k == n,
            Arity::Variadic => true,
        }
    }
}

/// Check arity and wrap a handler failure with the function's name for
/// diagnostics (§4.3 — "errors wrapped with function name and arity").
pub(crate) fn check_arity(name: &str, arity: Arity, args: &[Value]) -> Result<()> {
    if !arity.accepts(args.len()) {
        return Err(Error::FunctionError {
            function: name.to_string(),
            message: format!(
                "expected {} argument(s), got {}",
                match arity {
                    Arity::Exact(k) => k.to_string(),
                    Arity::Variadic => "any number of".to_string(),
                },
                args.len()
            ),
        });
    }
    Ok(())
}
