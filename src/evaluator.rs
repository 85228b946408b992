/**
 * Expression Evaluator — Recursive Interpreter for the Logic Language
 *
 * DESIGN DECISION: A single recursive `eval` function dispatching on
 * `ExpressionKind`, driven by a per-run `EvalSession` that owns the cache,
 * trace sink, deadline, and fixpoint cap
 * WHY: §2 calls this component "the heart of the system" at ~40% of the
 * budget; keeping cache/tracing/cancellation state in one session object
 * (rather than threaded as separate mutable parameters) keeps `eval`'s
 * signature stable as those concerns evolve.
 *
 * REASONING CHAIN:
 * 1. Every quantifier/fixpoint body runs inside `scoped`, which pushes a
 *    scope, evaluates, and pops it on every path — success, type error, or
 *    cancellation — satisfying property 1 (scope balance) structurally
 *    instead of by convention at each call site.
 * 2. Caching is attempted only for nodes with zero free variables and zero
 *    impure function calls anywhere in the subtree (§4.4); the cache key is
 *    the node's `NodeId` alone, which is policy (a) from the Design Notes.
 * 3. The deadline is checked once per node, before evaluating it, so a
 *    cancellation surfaces as soon as possible without adding a check
 *    inside every leaf case.
 * 4. Tracing wraps every node evaluation uniformly: record constructed
 *    after the inner match returns, regardless of which arm ran, so no
 *    expression form can forget to trace itself.
 *
 * PATTERN: session-scoped recursive evaluator (grounded on
 * other_examples/26e9d0c5_byrizki-jsoneval-rs__src-rlogic-evaluator-mod.rs.rs
 * and other_examples/11edf48f_marlonsc-mcp-context-browser__crates-mcb-
 * validate-src-engines-expression_engine.rs.rs, both recursive logic-tree
 * evaluators with cache/trace side channels)
 */
use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::expression::{BinaryOp, ExpressionKind, ExpressionNode, NodeId, UnaryOp};
use crate::function_registry::FunctionRegistry;
use crate::trace::{NullTraceSink, TraceRecord, TraceSink};
use crate::value::Value;

/// Per-run evaluation state: cache, trace sink, deadline, fixpoint cap.
/// Not `Clone` — a session belongs to exactly one `run_document` call.
pub struct EvalSession<'a> {
    registry: &'a FunctionRegistry,
    cache: HashMap<NodeId, Value>,
    caching_enabled: bool,
    /// `'static` rather than tied to `'a` — every concrete sink in this
    /// crate owns its storage, and keeping the bound independent of the
    /// registry's borrow lets a caller reclaim the sink via `into_sink`
    /// and keep it alive after the session (and its registry borrow) ends.
    sink: Box<dyn TraceSink>,
    tracing_enabled: bool,
    deadline: Option<Instant>,
    fixpoint_cap: u32,
    depth: usize,
    /// The values that fed the node currently finishing evaluation, set by
    /// `eval_kind`'s arms just before returning and read by `emit_trace`
    /// immediately afterward (§4.4's trace record `inputs` field).
    pending_inputs: Vec<Value>,
}

impl<'a> EvalSession<'a> {
    pub fn new(registry: &'a FunctionRegistry, fixpoint_cap: u32) -> Self {
        EvalSession {
            registry,
            cache: HashMap::new(),
            caching_enabled: true,
            sink: Box::new(NullTraceSink),
            tracing_enabled: false,
            deadline: None,
            fixpoint_cap,
            depth: 0,
            pending_inputs: Vec::new(),
        }
    }

    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    pub fn with_tracing(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.tracing_enabled = true;
        self.sink = sink;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Drop and replace the expression cache. Called when the registry
    /// changes underneath a long-lived engine (§5 shared-resource policy).
    pub fn flush_cache(&mut self) {
        self.cache.clear();
    }

    /// Reclaim the installed sink once evaluation is finished, so a
    /// caller-owned sink's accumulated records outlive this session.
    pub fn into_sink(self) -> Box<dyn TraceSink> {
        self.sink
    }
}

/// Run `scope` with a fresh child scope pushed, popping it afterward on
/// every path — success, error, or early return. This is the structural
/// guarantee behind property 1 (scope balance).
fn scoped<T>(ctx: &mut Context, scope: impl FnOnce(&mut Context) -> Result<T>) -> Result<T> {
    ctx.push_scope();
    let result = scope(ctx);
    ctx.pop_scope()?;
    result
}

/// Whether `node`'s subtree contains zero free variables and zero calls to
/// an impure function — the precondition for caching it at all (§4.4).
fn is_cacheable(node: &ExpressionNode, registry: &FunctionRegistry) -> bool {
    node.free_vars().is_empty() && subtree_is_pure(node, registry)
}

fn subtree_is_pure(node: &ExpressionNode, registry: &FunctionRegistry) -> bool {
    match &node.kind {
        ExpressionKind::Literal(_) | ExpressionKind::Variable(_) => true,
        ExpressionKind::Call { function, arguments } => {
            registry.is_pure(function) && arguments.iter().all(|arg| subtree_is_pure(arg, registry))
        }
        ExpressionKind::Binary { left, right, .. } => {
            subtree_is_pure(left, registry) && subtree_is_pure(right, registry)
        }
        ExpressionKind::Unary { argument, .. } => subtree_is_pure(argument, registry),
        ExpressionKind::Forall(body) | ExpressionKind::Exists(body) => {
            subtree_is_pure(&body.domain, registry) && subtree_is_pure(&body.condition, registry)
        }
        ExpressionKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            subtree_is_pure(condition, registry)
                && subtree_is_pure(then_branch, registry)
                && subtree_is_pure(else_branch, registry)
        }
        ExpressionKind::Fixpoint(body) => {
            subtree_is_pure(&body.expression, registry)
                && body.argument.as_deref().map_or(true, |arg| subtree_is_pure(arg, registry))
        }
    }
}

/// Evaluate `node` in `ctx`, using `session` for caching, tracing,
/// cancellation, and fixpoint bookkeeping.
pub fn eval(node: &ExpressionNode, ctx: &mut Context, session: &mut EvalSession) -> Result<Value> {
    if let Some(deadline) = session.deadline {
        if Instant::now() >= deadline {
            return Err(Error::Cancelled);
        }
    }

    if session.caching_enabled {
        if let Some(cached) = session.cache.get(&node.id) {
            return Ok(cached.clone());
        }
    }

    let depth_before = ctx.depth();
    session.depth += 1;
    session.pending_inputs.clear();
    let started_at = Instant::now();
    let outcome = eval_kind(node, ctx, session);
    let inputs = std::mem::take(&mut session.pending_inputs);
    session.depth -= 1;
    let elapsed = started_at.elapsed();

    if ctx.depth() != depth_before {
        return Err(Error::InternalInvariant(format!(
            "scope depth imbalance after evaluating node at {}: before={}, after={}",
            node.provenance,
            depth_before,
            ctx.depth()
        )));
    }

    if session.tracing_enabled {
        emit_trace(node, ctx, session, inputs, elapsed, &outcome);
    }

    if let Ok(value) = &outcome {
        if session.caching_enabled && is_cacheable(node, session.registry) {
            session.cache.insert(node.id, value.clone());
        }
    }

    outcome
}

fn emit_trace(
    node: &ExpressionNode,
    ctx: &Context,
    session: &mut EvalSession,
    inputs: Vec<Value>,
    elapsed: Duration,
    outcome: &Result<Value>,
) {
    let record = TraceRecord {
        node_id: node.id,
        depth: session.depth,
        context_snapshot: ctx.snapshot(),
        inputs,
        outcome: outcome.clone().map_err(|err| err.to_string()),
        elapsed,
        timestamp: chrono::Utc::now(),
    };
    trace!(node_id = ?record.node_id, depth = record.depth, "expression node evaluated");
    session.sink.record(record);
}

fn eval_kind(node: &ExpressionNode, ctx: &mut Context, session: &mut EvalSession) -> Result<Value> {
    match &node.kind {
        ExpressionKind::Literal(value) => Ok(value.clone()),

        ExpressionKind::Variable(name) => ctx.get(name),

        ExpressionKind::Call { function, arguments } => {
            let mut values = Vec::with_capacity(arguments.len());
            for arg in arguments {
                values.push(eval(arg, ctx, session)?);
            }
            let result = session.registry.call(function, &values);
            session.pending_inputs = values;
            result
        }

        ExpressionKind::Binary { op, left, right } => eval_binary(*op, left, right, ctx, session),

        ExpressionKind::Unary { op, argument } => {
            let value = eval(argument, ctx, session)?;
            let result = match op {
                UnaryOp::Not => Ok(Value::Boolean(!value.as_boolean()?)),
            };
            session.pending_inputs = vec![value];
            result
        }

        ExpressionKind::Forall(body) => {
            let domain = eval(&body.domain, ctx, session)?;
            let elements = domain.as_collection()?.to_vec();
            for element in &elements {
                let holds = scoped(ctx, |ctx| {
                    ctx.bind(body.variable.clone(), element.clone());
                    eval(&body.condition, ctx, session)?.as_boolean()
                })?;
                if !holds {
                    session.pending_inputs = vec![domain];
                    return Ok(Value::Boolean(false));
                }
            }
            session.pending_inputs = vec![domain];
            Ok(Value::Boolean(true))
        }

        ExpressionKind::Exists(body) => {
            let domain = eval(&body.domain, ctx, session)?;
            let elements = domain.as_collection()?.to_vec();
            for element in &elements {
                let holds = scoped(ctx, |ctx| {
                    ctx.bind(body.variable.clone(), element.clone());
                    eval(&body.condition, ctx, session)?.as_boolean()
                })?;
                if holds {
                    session.pending_inputs = vec![domain];
                    return Ok(Value::Boolean(true));
                }
            }
            session.pending_inputs = vec![domain];
            Ok(Value::Boolean(false))
        }

        ExpressionKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let condition_value = eval(condition, ctx, session)?;
            let holds = condition_value.as_boolean()?;
            let result = if holds {
                eval(then_branch, ctx, session)
            } else {
                eval(else_branch, ctx, session)
            };
            session.pending_inputs = vec![condition_value];
            result
        }

        ExpressionKind::Fixpoint(body) => eval_fixpoint(body, ctx, session),
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &ExpressionNode,
    right: &ExpressionNode,
    ctx: &mut Context,
    session: &mut EvalSession,
) -> Result<Value> {
    match op {
        BinaryOp::And => {
            let l = eval(left, ctx, session)?.as_boolean()?;
            if !l {
                session.pending_inputs = vec![Value::Boolean(l)];
                return Ok(Value::Boolean(false));
            }
            let r = eval(right, ctx, session)?.as_boolean()?;
            session.pending_inputs = vec![Value::Boolean(l), Value::Boolean(r)];
            Ok(Value::Boolean(r))
        }
        BinaryOp::Or => {
            let l = eval(left, ctx, session)?.as_boolean()?;
            if l {
                session.pending_inputs = vec![Value::Boolean(l)];
                return Ok(Value::Boolean(true));
            }
            let r = eval(right, ctx, session)?.as_boolean()?;
            session.pending_inputs = vec![Value::Boolean(l), Value::Boolean(r)];
            Ok(Value::Boolean(r))
        }
        BinaryOp::Implies => {
            let antecedent = eval(left, ctx, session)?.as_boolean()?;
            if !antecedent {
                session.pending_inputs = vec![Value::Boolean(antecedent)];
                return Ok(Value::Boolean(true));
            }
            let consequent = eval(right, ctx, session)?.as_boolean()?;
            session.pending_inputs = vec![Value::Boolean(antecedent), Value::Boolean(consequent)];
            Ok(Value::Boolean(consequent))
        }
        BinaryOp::Equals => {
            let l = eval(left, ctx, session)?;
            let r = eval(right, ctx, session)?;
            let equal = l == r;
            session.pending_inputs = vec![l, r];
            Ok(Value::Boolean(equal))
        }
        BinaryOp::LessThan => compare(left, right, ctx, session, |o| o.is_lt()),
        BinaryOp::LessEqual => compare(left, right, ctx, session, |o| o.is_le()),
        BinaryOp::GreaterThan => compare(left, right, ctx, session, |o| o.is_gt()),
        BinaryOp::GreaterEqual => compare(left, right, ctx, session, |o| o.is_ge()),
    }
}

fn compare(
    left: &ExpressionNode,
    right: &ExpressionNode,
    ctx: &mut Context,
    session: &mut EvalSession,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value> {
    let l = eval(left, ctx, session)?;
    let r = eval(right, ctx, session)?;
    let ordering = l.compare(&r)?;
    session.pending_inputs = vec![l, r];
    Ok(Value::Boolean(accept(ordering)))
}

/// Iterates `x_{n+1} = expression[variable := x_n]` until structural
/// equality convergence or `fixpoint_cap` is reached (§4.4).
fn eval_fixpoint(
    body: &crate::expression::FixpointBody,
    ctx: &mut Context,
    session: &mut EvalSession,
) -> Result<Value> {
    let mut current = match &body.argument {
        Some(seed) => eval(seed, ctx, session)?,
        None => Value::Null,
    };
    let seed = current.clone();
    for _ in 0..session.fixpoint_cap {
        let next = scoped(ctx, |ctx| {
            ctx.bind(body.variable.clone(), current.clone());
            eval(&body.expression, ctx, session)
        })?;
        if next == current {
            session.pending_inputs = vec![seed];
            return Ok(next);
        }
        current = next;
    }
    session.pending_inputs = vec![seed];
    Err(Error::NonTermination(session.fixpoint_cap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExpressionKind, FixpointBody, Provenance, QuantifierBody};
    use crate::function_registry::FunctionRegistry;

    fn lit(v: Value) -> ExpressionNode {
        ExpressionNode::new(ExpressionKind::Literal(v), Provenance::unknown())
    }

    fn var(name: &str) -> ExpressionNode {
        ExpressionNode::new(ExpressionKind::Variable(name.to_string()), Provenance::unknown())
    }

    fn session(registry: &FunctionRegistry) -> EvalSession<'_> {
        EvalSession::new(registry, 1024)
    }

    #[test]
    fn scope_balance_holds_even_when_the_body_errors() {
        let registry = FunctionRegistry::with_builtins();
        let mut ctx = Context::new();
        let mut sess = session(&registry);
        let body = QuantifierBody {
            variable: "x".to_string(),
            domain: Box::new(lit(Value::Collection(vec![Value::Integer(1)]))),
            condition: Box::new(lit(Value::Integer(1))), // not a Boolean: triggers TypeMismatch
        };
        let node = ExpressionNode::new(ExpressionKind::Forall(body), Provenance::unknown());
        let depth_before = ctx.depth();
        let result = eval(&node, &mut ctx, &mut sess);
        assert!(result.is_err());
        assert_eq!(ctx.depth(), depth_before);
    }

    #[test]
    fn and_short_circuits_left_to_right() {
        let registry = FunctionRegistry::with_builtins();
        let mut ctx = Context::new();
        let mut sess = session(&registry);
        let right = ExpressionNode::new(
            ExpressionKind::Variable("never_bound".to_string()),
            Provenance::unknown(),
        );
        let node = ExpressionNode::new(
            ExpressionKind::Binary {
                op: BinaryOp::And,
                left: Box::new(lit(Value::Boolean(false))),
                right: Box::new(right),
            },
            Provenance::unknown(),
        );
        assert_eq!(eval(&node, &mut ctx, &mut sess).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn forall_and_exists_empty_domain_laws() {
        let registry = FunctionRegistry::with_builtins();
        let mut ctx = Context::new();
        let mut sess = session(&registry);
        let empty_body = |variable: &str| QuantifierBody {
            variable: variable.to_string(),
            domain: Box::new(lit(Value::Collection(vec![]))),
            condition: Box::new(lit(Value::Boolean(false))),
        };
        let forall_node = ExpressionNode::new(ExpressionKind::Forall(empty_body("x")), Provenance::unknown());
        assert_eq!(eval(&forall_node, &mut ctx, &mut sess).unwrap(), Value::Boolean(true));

        let exists_node = ExpressionNode::new(ExpressionKind::Exists(empty_body("x")), Provenance::unknown());
        assert_eq!(eval(&exists_node, &mut ctx, &mut sess).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn forall_early_terminates_on_first_false() {
        let registry = FunctionRegistry::with_builtins();
        let mut ctx = Context::new();
        let mut sess = session(&registry);
        // x < 10, domain [1, 2, 15, 3, 4]; 15 makes it false, 3 and 4 never evaluated.
        let body = QuantifierBody {
            variable: "x".to_string(),
            domain: Box::new(lit(Value::Collection(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(15),
                Value::Integer(3),
                Value::Integer(4),
            ]))),
            condition: Box::new(ExpressionNode::new(
                ExpressionKind::Binary {
                    op: BinaryOp::LessThan,
                    left: Box::new(var("x")),
                    right: Box::new(lit(Value::Integer(10))),
                },
                Provenance::unknown(),
            )),
        };
        let node = ExpressionNode::new(ExpressionKind::Forall(body), Provenance::unknown());
        assert_eq!(eval(&node, &mut ctx, &mut sess).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn fixpoint_of_a_constant_converges_in_one_step() {
        let registry = FunctionRegistry::with_builtins();
        let mut ctx = Context::new();
        let mut sess = session(&registry);
        let body = FixpointBody {
            variable: "x".to_string(),
            expression: Box::new(lit(Value::Integer(42))),
            argument: Some(Box::new(lit(Value::Integer(0)))),
        };
        let node = ExpressionNode::new(ExpressionKind::Fixpoint(body), Provenance::unknown());
        assert_eq!(eval(&node, &mut ctx, &mut sess).unwrap(), Value::Integer(42));
    }

    #[test]
    fn fixpoint_that_never_converges_is_non_termination() {
        let registry = FunctionRegistry::with_builtins();
        let mut ctx = Context::new();
        let mut sess = EvalSession::new(&registry, 4);
        // x + 1 never converges.
        let body = FixpointBody {
            variable: "x".to_string(),
            expression: Box::new(ExpressionNode::new(
                ExpressionKind::Call {
                    function: "math.add".to_string(),
                    arguments: vec![var("x"), lit(Value::Integer(1))],
                },
                Provenance::unknown(),
            )),
            argument: Some(Box::new(lit(Value::Integer(0)))),
        };
        let node = ExpressionNode::new(ExpressionKind::Fixpoint(body), Provenance::unknown());
        let err = eval(&node, &mut ctx, &mut sess).unwrap_err();
        assert!(matches!(err, Error::NonTermination(4)));
    }

    #[test]
    fn cache_does_not_leak_across_distinct_free_variable_bindings() {
        let registry = FunctionRegistry::with_builtins();
        let mut sess = session(&registry);
        let less_than_ten = ExpressionNode::new(
            ExpressionKind::Binary {
                op: BinaryOp::LessThan,
                left: Box::new(var("x")),
                right: Box::new(lit(Value::Integer(10))),
            },
            Provenance::unknown(),
        );
        let mut ctx1 = Context::new();
        ctx1.bind("x", Value::Integer(1));
        assert_eq!(eval(&less_than_ten, &mut ctx1, &mut sess).unwrap(), Value::Boolean(true));

        let mut ctx2 = Context::new();
        ctx2.bind("x", Value::Integer(15));
        assert_eq!(eval(&less_than_ten, &mut ctx2, &mut sess).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn unresolved_variable_is_a_name_error_not_null() {
        let registry = FunctionRegistry::with_builtins();
        let mut ctx = Context::new();
        let mut sess = session(&registry);
        let err = eval(&var("missing"), &mut ctx, &mut sess).unwrap_err();
        assert!(matches!(err, Error::NameError(_)));
    }

    #[test]
    fn tracing_records_inputs_and_a_context_snapshot() {
        use crate::trace::{TraceRecord, TraceSink};
        use std::cell::RefCell;
        use std::rc::Rc;

        #[derive(Debug)]
        struct SharedSink(Rc<RefCell<Vec<TraceRecord>>>);
        impl TraceSink for SharedSink {
            fn record(&mut self, record: TraceRecord) {
                self.0.borrow_mut().push(record);
            }
        }

        let records = Rc::new(RefCell::new(Vec::new()));
        let registry = FunctionRegistry::with_builtins();
        let mut ctx = Context::new();
        ctx.bind("ten", Value::Integer(10));
        let mut sess =
            EvalSession::new(&registry, 1024).with_tracing(Box::new(SharedSink(records.clone())));

        let node = ExpressionNode::new(
            ExpressionKind::Binary {
                op: BinaryOp::LessThan,
                left: Box::new(lit(Value::Integer(3))),
                right: Box::new(var("ten")),
            },
            Provenance::unknown(),
        );
        eval(&node, &mut ctx, &mut sess).unwrap();

        let records = records.borrow();
        let top_level = records
            .iter()
            .find(|r| r.node_id == node.id)
            .expect("the binary node itself was traced");
        assert_eq!(top_level.inputs, vec![Value::Integer(3), Value::Integer(10)]);
        let snapshot = top_level.context_snapshot.as_object().unwrap();
        assert_eq!(snapshot.get("ten"), Some(&Value::Integer(10)));
    }
}
