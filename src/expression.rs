/**
 * Expression Node — Parsed Logic-Language AST
 *
 * DESIGN DECISION: One enum variant per grammar form (§4.4) instead of a
 * generic `{key: ..}` map kept around at runtime
 * WHY: design note §9 ("Expression nodes vs. value literals") calls out that
 * a strongly typed sum type avoids, structurally, the original system's
 * confusion between an expression slot and a literal Value — `match` on
 * `ExpressionKind` is exhaustive, so the loader cannot silently drop a form.
 *
 * REASONING CHAIN:
 * 1. Every node carries `Provenance` so a raised error can point at the
 *    document that produced it, independent of where in the tree it sits.
 * 2. `free_vars` is computed structurally off the AST rather than tracked
 *    during evaluation, so the evaluator's caching decision (§4.4 Caching)
 *    is a pure function of the node alone.
 * 3. Binary/unary operators are a closed enum rather than a `String`, so an
 *    unrecognised operator is rejected by the loader, not the evaluator.
 *
 * PATTERN: typed AST node (grounded on sprint_parser's typed Task/Sprint
 * structs, generalized from a fixed document schema to a recursive grammar)
 */
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::value::Value;

/// Where in the source document a node came from, for error messages and
/// trace records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Provenance {
    pub path: String,
    pub line: usize,
    pub column: usize,
}

impl Provenance {
    pub fn new(path: impl Into<String>, line: usize, column: usize) -> Self {
        Provenance {
            path: path.into(),
            line,
            column,
        }
    }

    pub fn unknown() -> Self {
        Provenance::default()
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.column)
    }
}

/// Binary logical/comparison operators (§4.4 "Logical op").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    And,
    Or,
    Implies,
    Equals,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

/// The one unary logical operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
}

/// A bound-variable quantifier body: `{variable, domain, condition}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuantifierBody {
    pub variable: String,
    pub domain: Box<ExpressionNode>,
    pub condition: Box<ExpressionNode>,
}

/// A fixpoint body: `{variable, expression, argument?}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixpointBody {
    pub variable: String,
    pub expression: Box<ExpressionNode>,
    pub argument: Option<Box<ExpressionNode>>,
}

/// The closed grammar of §4.4. Exactly these eight forms — no others.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    Literal(Value),
    Variable(String),
    Call {
        function: String,
        arguments: Vec<ExpressionNode>,
    },
    Binary {
        op: BinaryOp,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
    Unary {
        op: UnaryOp,
        argument: Box<ExpressionNode>,
    },
    Forall(QuantifierBody),
    Exists(QuantifierBody),
    If {
        condition: Box<ExpressionNode>,
        then_branch: Box<ExpressionNode>,
        else_branch: Box<ExpressionNode>,
    },
    Fixpoint(FixpointBody),
}

/// A unique, process-lifetime identity for a parsed node, used as the cache
/// key (§4.4 Caching — "cache key is the node's identity alone").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// A parsed expression-language node: its form, its identity, and the
/// document position it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpressionNode {
    pub id: NodeId,
    pub kind: ExpressionKind,
    pub provenance: Provenance,
}

impl ExpressionNode {
    pub fn new(kind: ExpressionKind, provenance: Provenance) -> Self {
        ExpressionNode {
            id: NodeId::fresh(),
            kind,
            provenance,
        }
    }

    /// All identifiers referenced by `var` anywhere in this subtree that are
    /// not themselves bound by an enclosing `forall`/`exists`/`fixpoint`
    /// within that same subtree. Used by the evaluator to decide cache
    /// eligibility (§4.4): any free variable disqualifies caching outright.
    pub fn free_vars(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        collect_free_vars(self, &mut out);
        out
    }
}

fn collect_free_vars(node: &ExpressionNode, out: &mut HashSet<String>) {
    match &node.kind {
        ExpressionKind::Literal(_) => {}
        ExpressionKind::Variable(name) => {
            out.insert(name.clone());
        }
        ExpressionKind::Call { arguments, .. } => {
            for arg in arguments {
                collect_free_vars(arg, out);
            }
        }
        ExpressionKind::Binary { left, right, .. } => {
            collect_free_vars(left, out);
            collect_free_vars(right, out);
        }
        ExpressionKind::Unary { argument, .. } => {
            collect_free_vars(argument, out);
        }
        ExpressionKind::Forall(body) | ExpressionKind::Exists(body) => {
            collect_free_vars(&body.domain, out);
            let mut inner = HashSet::new();
            collect_free_vars(&body.condition, &mut inner);
            inner.remove(&body.variable);
            out.extend(inner);
        }
        ExpressionKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            collect_free_vars(condition, out);
            collect_free_vars(then_branch, out);
            collect_free_vars(else_branch, out);
        }
        ExpressionKind::Fixpoint(body) => {
            if let Some(arg) = &body.argument {
                collect_free_vars(arg, out);
            }
            let mut inner = HashSet::new();
            collect_free_vars(&body.expression, &mut inner);
            inner.remove(&body.variable);
            out.extend(inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(v: Value) -> ExpressionNode {
        ExpressionNode::new(ExpressionKind::Literal(v), Provenance::unknown())
    }

    fn var(name: &str) -> ExpressionNode {
        ExpressionNode::new(ExpressionKind::Variable(name.to_string()), Provenance::unknown())
    }

    #[test]
    fn literal_has_no_free_variables() {
        assert!(lit(Value::Integer(1)).free_vars().is_empty());
    }

    #[test]
    fn variable_is_its_own_free_variable() {
        let fv = var("x").free_vars();
        assert_eq!(fv, HashSet::from(["x".to_string()]));
    }

    #[test]
    fn quantifier_bound_variable_is_not_free() {
        let body = QuantifierBody {
            variable: "x".to_string(),
            domain: Box::new(lit(Value::Collection(vec![]))),
            condition: Box::new(var("x")),
        };
        let node = ExpressionNode::new(ExpressionKind::Forall(body), Provenance::unknown());
        assert!(node.free_vars().is_empty());
    }

    #[test]
    fn quantifier_condition_can_still_reference_outer_free_variable() {
        let body = QuantifierBody {
            variable: "x".to_string(),
            domain: Box::new(lit(Value::Collection(vec![]))),
            condition: Box::new(var("y")),
        };
        let node = ExpressionNode::new(ExpressionKind::Forall(body), Provenance::unknown());
        assert_eq!(node.free_vars(), HashSet::from(["y".to_string()]));
    }

    #[test]
    fn node_identity_is_unique_per_construction() {
        let a = lit(Value::Integer(1));
        let b = lit(Value::Integer(1));
        assert_ne!(a.id, b.id);
    }
}
