//! Integration tests for the ten universal properties of §8.

use akao_logic_core::expression::{BinaryOp, ExpressionKind, ExpressionNode, FixpointBody, Provenance, QuantifierBody};
use akao_logic_core::function_registry::{Arity, FunctionRegistry, Purity};
use akao_logic_core::{Context, Engine, EngineConfig, Error, Value};

fn lit(v: Value) -> ExpressionNode {
    ExpressionNode::new(ExpressionKind::Literal(v), Provenance::unknown())
}

fn var(name: &str) -> ExpressionNode {
    ExpressionNode::new(ExpressionKind::Variable(name.to_string()), Provenance::unknown())
}

fn rule_yaml(id: &str, logic: &str) -> String {
    format!(
        r#"
metadata:
  id: akao:rule:properties:{id}
  name: property test
  description: a rule exercising one universal property
logic: {logic}
self_validation: {{literal: true}}
unit_tests: []
"#
    )
}

#[test]
fn property_1_scope_balance_holds_across_success_and_error() {
    use akao_logic_core::evaluator::{eval, EvalSession};

    let registry = FunctionRegistry::with_builtins();
    let mut ctx = Context::new();
    let mut session = EvalSession::new(&registry, 1024);

    let ok_node = lit(Value::Boolean(true));
    let depth_before = ctx.depth();
    eval(&ok_node, &mut ctx, &mut session).unwrap();
    assert_eq!(ctx.depth(), depth_before);

    let body = QuantifierBody {
        variable: "x".to_string(),
        domain: Box::new(lit(Value::Collection(vec![Value::Integer(1)]))),
        condition: Box::new(lit(Value::Integer(99))), // not Boolean -> TypeMismatch
    };
    let err_node = ExpressionNode::new(ExpressionKind::Forall(body), Provenance::unknown());
    let depth_before = ctx.depth();
    assert!(eval(&err_node, &mut ctx, &mut session).is_err());
    assert_eq!(ctx.depth(), depth_before);
}

#[test]
fn property_2_and_short_circuits_so_the_right_operand_is_never_evaluated() {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_handler = Arc::clone(&calls);

    let mut registry = FunctionRegistry::with_builtins();
    registry.register(
        "test.count_call",
        Arity::Exact(0),
        Purity::Pure,
        Arc::new(move |_args: &[Value], _reg: &FunctionRegistry| {
            calls_for_handler.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(Value::Boolean(true))
        }),
    );

    let node = ExpressionNode::new(
        ExpressionKind::Binary {
            op: BinaryOp::And,
            left: Box::new(lit(Value::Boolean(false))),
            right: Box::new(ExpressionNode::new(
                ExpressionKind::Call {
                    function: "test.count_call".to_string(),
                    arguments: vec![],
                },
                Provenance::unknown(),
            )),
        },
        Provenance::unknown(),
    );

    use akao_logic_core::evaluator::{eval, EvalSession};
    let mut ctx = Context::new();
    let mut session = EvalSession::new(&registry, 1024);
    assert_eq!(eval(&node, &mut ctx, &mut session).unwrap(), Value::Boolean(false));
    assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
}

#[test]
fn property_3_empty_domain_laws() {
    let mut engine = Engine::with_builtins(EngineConfig::default());
    let forall_doc = engine
        .load_document_str(
            &rule_yaml(
                "v3a",
                "{forall: {variable: x, domain: {literal: []}, condition: {literal: true}}}",
            ),
            "forall-empty",
        )
        .unwrap();
    assert_eq!(
        engine.run(&forall_doc, &Context::new()).primary.unwrap(),
        Value::Boolean(true)
    );

    let exists_doc = engine
        .load_document_str(
            &rule_yaml(
                "v3b",
                "{exists: {variable: x, domain: {literal: []}, condition: {literal: true}}}",
            ),
            "exists-empty",
        )
        .unwrap();
    assert_eq!(
        engine.run(&exists_doc, &Context::new()).primary.unwrap(),
        Value::Boolean(false)
    );
}

#[test]
fn property_4_forall_invokes_the_predicate_for_exactly_k_elements_in_order() {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    let seen_count = Arc::new(AtomicUsize::new(0));
    let seen_for_handler = Arc::clone(&seen_count);

    let mut registry = FunctionRegistry::with_builtins();
    registry.register(
        "test.less_than_ten_observed",
        Arity::Exact(1),
        Purity::Pure,
        Arc::new(move |args: &[Value], _reg: &FunctionRegistry| {
            seen_for_handler.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(Value::Boolean(args[0].as_integer()? < 10))
        }),
    );

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
            ExpressionKind::Call {
                function: "test.less_than_ten_observed".to_string(),
                arguments: vec![var("x")],
            },
            Provenance::unknown(),
        )),
    };
    let node = ExpressionNode::new(ExpressionKind::Forall(body), Provenance::unknown());

    use akao_logic_core::evaluator::{eval, EvalSession};
    let mut ctx = Context::new();
    let mut session = EvalSession::new(&registry, 1024);
    assert_eq!(eval(&node, &mut ctx, &mut session).unwrap(), Value::Boolean(false));
    assert_eq!(seen_count.load(AtomicOrdering::SeqCst), 3);
}

#[test]
fn property_5_cache_soundness_concrete_case() {
    use akao_logic_core::evaluator::{eval, EvalSession};

    let registry = FunctionRegistry::with_builtins();
    let mut session = EvalSession::new(&registry, 1024);
    let less_than_ten = ExpressionNode::new(
        ExpressionKind::Binary {
            op: BinaryOp::LessThan,
            left: Box::new(var("x")),
            right: Box::new(lit(Value::Integer(10))),
        },
        Provenance::unknown(),
    );

    let mut ctx_one = Context::new();
    ctx_one.bind("x", Value::Integer(1));
    assert_eq!(eval(&less_than_ten, &mut ctx_one, &mut session).unwrap(), Value::Boolean(true));

    let mut ctx_fifteen = Context::new();
    ctx_fifteen.bind("x", Value::Integer(15));
    assert_eq!(
        eval(&less_than_ten, &mut ctx_fifteen, &mut session).unwrap(),
        Value::Boolean(false)
    );
}

#[test]
fn property_6_literal_round_trips_through_the_document_loader() {
    let yaml = rule_yaml(
        "v6",
        "{literal: {a: 1, b: [true, false, null], c: \"text\"}}",
    );
    let mut engine = Engine::with_builtins(EngineConfig::default());
    let doc = engine.load_document_str(&yaml, "round-trip").unwrap();
    let outcome = engine.run(&doc, &Context::new());
    let result = outcome.primary.unwrap();
    let obj = result.as_object().unwrap();
    assert_eq!(obj.get("a"), Some(&Value::Integer(1)));
    assert_eq!(
        obj.get("b"),
        Some(&Value::Collection(vec![Value::Boolean(true), Value::Boolean(false), Value::Null]))
    );
    assert_eq!(obj.get("c"), Some(&Value::String("text".to_string())));
}

#[test]
fn property_7_every_well_formed_document_self_checks_true() {
    let yaml = rule_yaml("v7", "{literal: true}").replace(
        "self_validation: {literal: true}",
        "self_validation: {function: has_field, arguments: [{var: this_rule}, {literal: logic}]}",
    );
    let mut engine = Engine::with_builtins(EngineConfig::default());
    let doc = engine.load_document_str(&yaml, "self-check").unwrap();
    let outcome = engine.run(&doc, &Context::new());
    assert_eq!(outcome.self_check, Value::Boolean(true));
}

#[test]
fn property_8_running_the_same_document_twice_is_deterministic() {
    let yaml = rule_yaml(
        "v8",
        "{forall: {variable: x, domain: {literal: [1, 2, 3]}, condition: {operator: less_than, left: {var: x}, right: {literal: 10}}}}",
    );
    let mut engine = Engine::with_builtins(EngineConfig::default());
    let doc = engine.load_document_str(&yaml, "determinism").unwrap();
    let first = engine.run(&doc, &Context::new());
    let second = engine.run(&doc, &Context::new());
    assert_eq!(first.primary.ok(), second.primary.ok());
    assert_eq!(first.self_check, second.self_check);
    assert_eq!(first.violations, second.violations);
}

#[test]
fn property_9_fixpoint_of_a_literal_converges_within_two_iterations() {
    let body = FixpointBody {
        variable: "x".to_string(),
        expression: Box::new(lit(Value::Integer(7))),
        argument: Some(Box::new(lit(Value::Integer(0)))),
    };
    let node = ExpressionNode::new(ExpressionKind::Fixpoint(body), Provenance::unknown());

    use akao_logic_core::evaluator::{eval, EvalSession};
    let registry = FunctionRegistry::with_builtins();
    let mut ctx = Context::new();
    let mut session = EvalSession::new(&registry, 2);
    assert_eq!(eval(&node, &mut ctx, &mut session).unwrap(), Value::Integer(7));
}

#[test]
fn property_10_deadline_honouring_cancels_within_bound_and_restores_scope() {
    use akao_logic_core::evaluator::{eval, EvalSession};
    use std::time::{Duration, Instant};

    let registry = FunctionRegistry::with_builtins();
    let mut ctx = Context::new();
    let deadline = Instant::now() - Duration::from_millis(1); // already elapsed
    let mut session = EvalSession::new(&registry, 1024).with_deadline(deadline);

    let depth_before = ctx.depth();
    let err = eval(&lit(Value::Boolean(true)), &mut ctx, &mut session).unwrap_err();
    assert_eq!(err, Error::Cancelled);
    assert_eq!(ctx.depth(), depth_before);
}

#[test]
fn property_10_a_deadline_configured_on_the_engine_cancels_run() {
    let mut config = EngineConfig::default();
    config.deadline_millis = 5;
    let mut engine = Engine::with_builtins(config);
    engine.register_function(
        "stall",
        Purity::Impure,
        std::sync::Arc::new(|_args: &[Value], _registry: &FunctionRegistry| {
            std::thread::sleep(std::time::Duration::from_millis(2));
            Ok(Value::Boolean(true))
        }),
    );
    let yaml = rule_yaml(
        "v10",
        "{forall: {variable: x, domain: {literal: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]}, condition: {function: stall, arguments: [{var: x}]}}}",
    );
    let doc = engine.load_document_str(&yaml, "property-10").unwrap();
    let outcome = engine.run(&doc, &Context::new());
    assert!(matches!(outcome.primary, Err(Error::Cancelled)));
}
