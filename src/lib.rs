/**
 * Akao Logic Core
 *
 * DESIGN DECISION: A single `Engine` type as the outward face of the six
 * cooperating components (value model, context, function registry,
 * expression evaluator, document loader, executor), rather than exposing
 * each component's API directly to callers
 * WHY: §6 specifies the engine API as the core's "outward face" —
 * `new`/`load_document`/`run`/`register_function`/`enable_caching`/
 * `enable_tracing`. Consolidating those behind one struct keeps the
 * module-level types (`Document`, `ExpressionNode`, `FunctionRegistry`, …)
 * free to evolve independently of how a host application drives them.
 *
 * REASONING CHAIN:
 * 1. `Engine::new` takes a caller-built `FunctionRegistry` directly (§6);
 *    `Engine::with_builtins` is this expansion's convenience constructor
 *    wired with the reference handlers and a given `EngineConfig` (§6).
 * 2. The engine owns its `DocumentLoader` so duplicate-id tracking (§3)
 *    spans every document loaded through one engine instance, not just one
 *    file.
 * 3. `run` builds a fresh `EvalSession` per call from the engine's current
 *    config — caching/tracing toggles and the registry are all read off
 *    `self`, so a caller never has to reconstruct evaluator plumbing by
 *    hand.
 *
 * PATTERN: facade over cooperating components (grounded on
 * aetherlight-core's crate-root re-export surface, generalized from a
 * pattern-matching facade to a logic-evaluation one)
 */
#![warn(missing_debug_implementations)]

pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod expression;
pub mod function_registry;
pub mod trace;
pub mod value;

use std::path::Path;

use tracing::info;

pub use config::EngineConfig;
pub use context::Context;
pub use document::{Document, DocumentKind, DocumentLoader};
pub use error::{Error, Result};
pub use executor::{Outcome, UnitResult, Violation};
pub use expression::ExpressionNode;
pub use function_registry::{FunctionRegistry, Handler, Purity};
pub use trace::{TraceRecord, TraceSink, VecTraceSink};
pub use value::{Obj, Value};

/// The outward face of the interpreter: owns a function registry, a
/// document loader, and the evaluation tunables from `EngineConfig`.
///
/// `trace_sink`, when present, is installed on the session built for every
/// `run` call and handed back afterward — the engine is the sink's owner
/// across calls, not any one evaluation.
#[derive(Debug)]
pub struct Engine {
    registry: FunctionRegistry,
    loader: DocumentLoader,
    config: EngineConfig,
    trace_sink: Option<Box<dyn TraceSink>>,
}

impl Engine {
    /// Build an engine from a caller-supplied registry and default config
    /// (§6 — `new(registry) -> Engine`).
    pub fn new(registry: FunctionRegistry) -> Self {
        Engine {
            registry,
            loader: DocumentLoader::new(),
            config: EngineConfig::default(),
            trace_sink: None,
        }
    }

    /// Build an engine wired with the reference builtins (§0) and a given
    /// config — this expansion's convenience constructor (§6). A config with
    /// `tracing_enabled` set installs a `VecTraceSink` up front so tracing is
    /// actually observable without a separate `enable_tracing` call.
    pub fn with_builtins(config: EngineConfig) -> Self {
        let trace_sink: Option<Box<dyn TraceSink>> = if config.tracing_enabled {
            Some(Box::new(trace::VecTraceSink::new()))
        } else {
            None
        };
        Engine {
            registry: FunctionRegistry::with_builtins(),
            loader: DocumentLoader::new(),
            config,
            trace_sink,
        }
    }

    /// Parse and load a rule/philosophy document from disk, rejecting a
    /// `metadata.id` already seen by this engine.
    pub fn load_document(&mut self, path: impl AsRef<Path>) -> Result<Document> {
        self.loader.load_path(path)
    }

    /// Parse and load a document from an in-memory YAML string, attributing
    /// errors to `source` (typically a synthetic name for tests).
    pub fn load_document_str(&mut self, yaml: &str, source: &str) -> Result<Document> {
        self.loader.load_str(yaml, source)
    }

    /// Run `doc`'s full five-step procedure (§4.6) starting from `ctx`. Takes
    /// `&mut self` because a sink installed via `enable_tracing` is taken out
    /// for the duration of the run and restored once it finishes.
    pub fn run(&mut self, doc: &Document, ctx: &Context) -> Outcome {
        info!(id = %doc.metadata.id, "running document");
        let sink = self.trace_sink.take();
        let (outcome, sink) = executor::run_document(doc, ctx, &self.registry, &self.config, sink);
        self.trace_sink = sink;
        outcome
    }

    /// Install or replace a handler (§6 — `register_function`). Host
    /// handlers are registered with `Arity::Variadic` since the engine API
    /// does not ask the caller to declare an arity; handlers that need
    /// strict arity checking should validate their own argument count and
    /// return `Error::FunctionError` on mismatch.
    pub fn register_function(&mut self, name: impl Into<String>, purity: Purity, handler: Handler) {
        self.registry
            .register(name, function_registry::Arity::Variadic, purity, handler);
    }

    pub fn enable_caching(&mut self, enabled: bool) {
        self.config.caching_enabled = enabled;
    }

    /// Install `sink` to receive every trace record produced by subsequent
    /// `run` calls (§6). Replaces any sink installed earlier; pass a fresh
    /// `VecTraceSink` to start recording, or read `trace_sink`/swap one out
    /// between runs to drain it.
    pub fn enable_tracing(&mut self, sink: Box<dyn TraceSink>) {
        self.config.tracing_enabled = true;
        self.trace_sink = Some(sink);
    }

    /// Disable tracing and drop any installed sink.
    pub fn disable_tracing(&mut self) {
        self.config.tracing_enabled = false;
        self.trace_sink = None;
    }

    /// Borrow the installed trace sink, if any, so a caller can inspect
    /// accumulated records between runs.
    pub fn trace_sink(&self) -> Option<&dyn TraceSink> {
        self.trace_sink.as_deref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }
}
