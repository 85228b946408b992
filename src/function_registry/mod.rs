/**
 * Function Registry Module — Qualified-Name Handler Map
 *
 * DESIGN DECISION: A flat `name -> Handler` map populated once at engine
 * construction, rather than a pluggable trait-object-per-namespace design
 * WHY: §4.3 — the interpreter "never hardcodes any handler's meaning"; a
 * single read-only map keeps that boundary sharp, and a static registration
 * table (`builtins::TABLE`) makes the standard handlers auditable in one
 * place instead of scattered across impls.
 *
 * PATTERN: Pattern-REGISTRY-001, narrowed from semantic/embedding-based
 * dynamic function matching down to exact qualified-name lookup — this
 * interpreter calls functions by the name an expression node names, not by
 * natural-language intent.
 */

pub mod builtins;
pub mod registry;
pub mod types;

pub use registry::FunctionRegistry;
pub use types::{Arity, Handler, Purity};
