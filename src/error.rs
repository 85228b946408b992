/**
 * Error Handling Module
 *
 * DESIGN DECISION: Centralized error types using thiserror for consistent error semantics
 * WHY: The evaluator must never panic; every fault is reified as a typed
 * `Error` so the executor can record it inside an `Outcome` instead of
 * unwinding past the document boundary (§7).
 *
 * REASONING CHAIN:
 * 1. thiserror provides ergonomic error derive macros without boilerplate.
 * 2. A closed taxonomy (§7) makes every fault mode exhaustively matchable.
 * 3. Clone + PartialEq lets tests assert on errors directly.
 * 4. From conversions for serde_yaml/std::io keep the loader's `?` usage
 *    terse without leaking external error types into the public API.
 *
 * PATTERN: centralized Error enum (grounded on aetherlight-core's error.rs)
 */

use thiserror::Error as ThisError;

/// Every fault the interpreter or its surrounding layers can produce.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum Error {
    /// Missing or ill-typed document field, or an unknown expression key.
    #[error("document malformed: {0}")]
    DocumentMalformed(String),

    /// `var` reference to an identifier with no binding in any active scope.
    #[error("name not found: {0}")]
    NameError(String),

    /// Operator or comparison applied across incompatible variants.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Handler returned an error, unknown function name, or arity mismatch.
    #[error("function error in {function}: {message}")]
    FunctionError { function: String, message: String },

    /// `fixpoint` exceeded its iteration cap without reaching convergence.
    #[error("fixpoint did not converge within {0} iterations")]
    NonTermination(u32),

    /// The per-evaluation deadline elapsed before evaluation completed.
    #[error("evaluation cancelled: deadline exceeded")]
    Cancelled,

    /// Scope stack imbalance, cache-key inconsistency, or similar — a bug
    /// in the interpreter itself, never a user-facing document error.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::DocumentMalformed(format!("YAML parse error: {err}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::DocumentMalformed(format!("I/O error: {err}"))
    }
}
