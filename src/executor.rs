/**
 * Rule/Philosophy Executor — Drives a Document Through the Evaluator
 *
 * DESIGN DECISION: One `run_document` entry point implementing the five-step
 * procedure of §4.6 verbatim, returning an `Outcome` that never propagates a
 * raw `Error` out of the function
 * WHY: §7's propagation policy: "the executor catches [errors] at the
 * document boundary and records them in the `Outcome`." A validator that
 * panics or bubbles a `Result::Err` on a malformed rule is unusable as a
 * library a caller can run over an entire corpus of documents.
 *
 * REASONING CHAIN:
 * 1. Binding the document happens once per `run_document` call, in a scope
 *    pushed specifically for it, so the binding never leaks into the
 *    caller's own context (§4.6 step 1).
 * 2. `self_check` folds both "failed to evaluate" and "evaluated to a
 *    non-Boolean" into `Boolean(false)` plus a reason string, exactly as
 *    §4.6 step 3 specifies — it is never an `Err` the caller has to handle.
 * 3. Unit tests build a *fresh* context per test from `setup`, not the
 *    caller's context, so one test's bindings cannot leak into the next.
 * 4. A `forall`-shaped `logic` that evaluates to `false` is re-run once with
 *    tracing enabled solely to recover which element failed (§4.6's "sole
 *    concession to what failed and why").
 *
 * PATTERN: orchestrator over a validation pipeline (grounded on
 * validation/validator.rs's `PatternValidator::validate`, generalized from
 * quality+security checks to primary+self-check+unit-test evaluation)
 */
use std::time::Instant;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::context::Context;
use crate::document::Document;
use crate::error::Error;
use crate::evaluator::{eval, EvalSession};
use crate::expression::ExpressionKind;
use crate::function_registry::FunctionRegistry;
use crate::trace::{TraceSink, VecTraceSink};
use crate::value::Value;

/// Result of one `unit_tests` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitResult {
    pub name: String,
    pub pass: bool,
    pub observed: Result<Value, Error>,
    pub expected: Value,
}

/// A recorded failure: which element of a `forall` domain falsified the
/// condition (§4.6's violation reporting).
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub variable: String,
    pub element: Value,
}

/// The aggregated verdict for one document, per §4.6 and SPEC_FULL.md's
/// extension of it with an explicit `violations` field.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub primary: Result<Value, Error>,
    pub self_check: Value,
    pub self_check_reason: Option<String>,
    pub unit_results: Vec<UnitResult>,
    pub violations: Vec<Violation>,
}

impl Outcome {
    /// The pass/fail verdict a caller ultimately cares about: `primary`
    /// evaluated without error to `true`.
    pub fn pass(&self) -> bool {
        matches!(self.primary, Ok(Value::Boolean(true)))
    }
}

/// Build a fresh session from `config`, applying caching, deadline, and an
/// optional caller-installed trace sink uniformly across every entry point
/// that evaluates a document (§5, §6).
fn build_session<'a>(
    registry: &'a FunctionRegistry,
    config: &EngineConfig,
    sink: Option<Box<dyn TraceSink>>,
) -> EvalSession<'a> {
    let mut session = EvalSession::new(registry, config.fixpoint_cap).with_caching(config.caching_enabled);
    if let Some(deadline) = config.deadline() {
        session = session.with_deadline(Instant::now() + deadline);
    }
    if let Some(sink) = sink {
        session = session.with_tracing(sink);
    }
    session
}

/// Drives `doc` through the five-step procedure of §4.6, using `registry`
/// for function calls and `config` for every evaluation tunable (fixpoint
/// cap, caching, deadline). `sink`, if provided, is installed on the session
/// that evaluates `doc.logic`/`doc.self_check` and handed back to the caller
/// once evaluation finishes, so a caller-owned sink survives across calls.
pub fn run_document(
    doc: &Document,
    caller_ctx: &Context,
    registry: &FunctionRegistry,
    config: &EngineConfig,
    sink: Option<Box<dyn TraceSink>>,
) -> (Outcome, Option<Box<dyn TraceSink>>) {
    let mut ctx = caller_ctx.clone();
    let depth_before = ctx.depth();
    let had_sink = sink.is_some();
    let mut session = build_session(registry, config, sink);

    let bind_result = (|| -> Result<(Result<Value, Error>, Value, Option<String>), Error> {
        ctx.push_scope();
        ctx.bind(doc.self_binding_name(), doc.raw.clone());

        let primary = eval(&doc.logic, &mut ctx, &mut session);

        let (self_check, self_check_reason) = match eval(&doc.self_check, &mut ctx, &mut session) {
            Ok(Value::Boolean(b)) => (Value::Boolean(b), None),
            Ok(other) => (
                Value::Boolean(false),
                Some(format!(
                    "self-check evaluated to a non-Boolean value: {}",
                    other.type_name()
                )),
            ),
            Err(err) => (Value::Boolean(false), Some(err.to_string())),
        };

        ctx.pop_scope()?;
        Ok((primary, self_check, self_check_reason))
    })();

    let returned_sink = if had_sink { Some(session.into_sink()) } else { None };

    let (primary, self_check, self_check_reason) = match bind_result {
        Ok(triple) => triple,
        Err(err) => {
            warn!(id = %doc.metadata.id, error = %err, "document binding failed");
            (Err(err), Value::Boolean(false), Some("failed to bind document into context".to_string()))
        }
    };

    if ctx.depth() != depth_before {
        warn!(id = %doc.metadata.id, "scope depth imbalance after document evaluation; forcing recovery");
    }

    let violations = collect_violations(doc, caller_ctx, registry, config, &primary);

    let unit_results = doc
        .unit_tests
        .iter()
        .map(|test| run_unit_test(doc, test, registry, config))
        .collect();

    info!(id = %doc.metadata.id, pass = matches!(primary, Ok(Value::Boolean(true))), "document executed");

    (
        Outcome {
            primary,
            self_check,
            self_check_reason,
            unit_results,
            violations,
        },
        returned_sink,
    )
}

fn run_unit_test(
    doc: &Document,
    test: &crate::document::UnitTestCase,
    registry: &FunctionRegistry,
    config: &EngineConfig,
) -> UnitResult {
    let mut ctx = Context::new();
    for (name, value) in &test.setup {
        ctx.bind(name.clone(), value.clone());
    }
    let mut session = build_session(registry, config, None);
    let observed = eval(&doc.logic, &mut ctx, &mut session);
    let pass = matches!(&observed, Ok(value) if *value == test.expected);
    UnitResult {
        name: test.name.clone(),
        pass,
        observed,
        expected: test.expected.clone(),
    }
}

/// When `primary` is the `Ok(false)` result of a top-level `forall`,
/// re-evaluate its domain once with tracing enabled and replay each element
/// until the condition goes false, recording that one element as the
/// violation (§4.6).
fn collect_violations(
    doc: &Document,
    caller_ctx: &Context,
    registry: &FunctionRegistry,
    config: &EngineConfig,
    primary: &Result<Value, Error>,
) -> Vec<Violation> {
    if !matches!(primary, Ok(Value::Boolean(false))) {
        return Vec::new();
    }
    let ExpressionKind::Forall(body) = &doc.logic.kind else {
        return Vec::new();
    };

    let mut ctx = caller_ctx.clone();
    ctx.push_scope();
    ctx.bind(doc.self_binding_name(), doc.raw.clone());

    let mut session = build_session(registry, config, Some(Box::new(VecTraceSink::new())));
    let domain = match eval(&body.domain, &mut ctx, &mut session) {
        Ok(value) => value,
        Err(_) => {
            let _ = ctx.pop_scope();
            return Vec::new();
        }
    };
    let elements = domain.as_collection().map(|c| c.to_vec()).unwrap_or_default();

    let mut violations = Vec::new();
    for element in elements {
        ctx.push_scope();
        ctx.bind(body.variable.clone(), element.clone());
        let holds = eval(&body.condition, &mut ctx, &mut session).ok().and_then(|v| v.as_boolean().ok());
        let _ = ctx.pop_scope();
        if holds != Some(true) {
            violations.push(Violation {
                variable: body.variable.clone(),
                element,
            });
            break;
        }
    }

    let _ = ctx.pop_scope();
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentLoader;
    use crate::function_registry::FunctionRegistry;

    fn registry() -> FunctionRegistry {
        FunctionRegistry::with_builtins()
    }

    fn load(yaml: &str) -> Document {
        DocumentLoader::new().load_str(yaml, "test").unwrap()
    }

    fn run(doc: &Document, ctx: &Context, registry: &FunctionRegistry) -> Outcome {
        run_document(doc, ctx, registry, &EngineConfig::default(), None).0
    }

    #[test]
    fn self_check_true_for_a_well_formed_document() {
        let yaml = r#"
metadata:
  id: akao:rule:testing:v1
  name: self check
  description: self-validating rule
logic: {literal: true}
self_validation:
  function: has_field
  arguments:
    - {var: this_rule}
    - {literal: logic}
unit_tests: []
"#;
        let doc = load(yaml);
        let outcome = run(&doc, &Context::new(), &registry());
        assert_eq!(outcome.self_check, Value::Boolean(true));
        assert_eq!(outcome.primary.unwrap(), Value::Boolean(true));
    }

    #[test]
    fn unit_tests_run_against_a_fresh_context_per_entry() {
        let yaml = r#"
metadata:
  id: akao:rule:testing:v2
  name: unit tests
  description: checks n < 10
logic:
  operator: less_than
  left: {var: n}
  right: {literal: 10}
self_validation: {literal: true}
unit_tests:
  - name: small
    setup: {n: 3}
    expected: {literal: true}
  - name: large
    setup: {n: 11}
    expected: {literal: false}
"#;
        let doc = load(yaml);
        let outcome = run(&doc, &Context::new(), &registry());
        assert_eq!(outcome.unit_results.len(), 2);
        assert!(outcome.unit_results[0].pass);
        assert!(outcome.unit_results[1].pass);
    }

    #[test]
    fn a_false_forall_records_the_falsifying_element_as_a_violation() {
        let yaml = r#"
metadata:
  id: akao:rule:testing:v3
  name: forall violation
  description: detects the element that breaks the property
logic:
  forall:
    variable: x
    domain: {literal: [1, 2, 15, 3, 4]}
    condition:
      operator: less_than
      left: {var: x}
      right: {literal: 10}
self_validation: {literal: true}
unit_tests: []
"#;
        let doc = load(yaml);
        let outcome = run(&doc, &Context::new(), &registry());
        assert_eq!(outcome.primary.clone().unwrap(), Value::Boolean(false));
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].element, Value::Integer(15));
    }

    #[test]
    fn document_binding_does_not_leak_into_the_caller_context() {
        let yaml = r#"
metadata:
  id: akao:rule:testing:v4
  name: no leak
  description: this_rule must not escape run_document
logic: {literal: true}
self_validation: {literal: true}
unit_tests: []
"#;
        let doc = load(yaml);
        let caller_ctx = Context::new();
        let depth_before = caller_ctx.depth();
        let _ = run(&doc, &caller_ctx, &registry());
        assert_eq!(caller_ctx.depth(), depth_before);
        assert!(!caller_ctx.has("this_rule"));
    }
}
