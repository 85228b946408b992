/**
 * Document Loader — YAML Rule/Philosophy Parsing
 *
 * DESIGN DECISION: Two parallel conversions of the same parsed YAML tree —
 * `expr_from_yaml` for expression-slot positions, `value_from_yaml` for
 * everything else — rather than one conversion that guesses a map's role
 * from its shape
 * WHY: §9 design notes calls out that the source system conflated
 * expression nodes and value literals "in spots"; knowing which positions
 * are expression slots *before* looking at a map's shape is what avoids a
 * `{literal: …}` map being accidentally coerced into an Object value.
 *
 * REASONING CHAIN:
 * 1. `EXPRESSION_SLOT_KEYS` enumerates exactly the field names §4.5 lists as
 *    expression slots (`logic`, `condition`, `domain`, `left`, `right`,
 *    `argument`, `arguments`, `then`, `else`, `expression`); every other
 *    field converts through `value_from_yaml`.
 * 2. `Document::raw` (§3.1) is a second, purely structural conversion of the
 *    *entire* document through `value_from_yaml` alone — it never calls
 *    `expr_from_yaml`, so `this_rule`/`this_philosophy` see every field,
 *    including `logic`, as plain nested Object/Collection data.
 * 3. `DocumentLoader` tracks every `metadata.id` it has ever accepted, so a
 *    duplicate id is rejected at load regardless of which file it came
 *    from, per §3's invariant.
 *
 * PATTERN: dual structural/typed conversion (grounded on sprint_parser's
 * YamlParser, generalized from a fixed struct shape to a recursive,
 * slot-aware grammar)
 */
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::expression::{
    BinaryOp, ExpressionKind, ExpressionNode, FixpointBody, Provenance, QuantifierBody, UnaryOp,
};
use crate::value::{Obj, Value};

fn id_pattern() -> Regex {
    Regex::new(r"^akao:(rule|philosophy):[a-zA-Z0-9_]+(:[a-zA-Z0-9_]+)*:v[0-9]+$")
        .expect("static id pattern is valid")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Rule,
    Philosophy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTestCase {
    pub name: String,
    pub setup: Vec<(String, Value)>,
    pub expected: Value,
}

/// A parsed rule or philosophy document (§3 "Document").
#[derive(Debug, Clone)]
pub struct Document {
    pub kind: DocumentKind,
    pub metadata: Metadata,
    /// `logic` for rules, `formal_logic.statement` for philosophies.
    pub logic: ExpressionNode,
    /// `self_validation` for rules, `self_proof` for philosophies.
    pub self_check: ExpressionNode,
    pub unit_tests: Vec<UnitTestCase>,
    /// The whole document as a purely structural Value tree (§3.1) — what
    /// `this_rule`/`this_philosophy` are bound to, distinct from `logic`
    /// above which stays a typed `ExpressionNode`.
    pub raw: Value,
}

impl Document {
    /// The well-known context name this document binds itself under.
    pub fn self_binding_name(&self) -> &'static str {
        match self.kind {
            DocumentKind::Rule => "this_rule",
            DocumentKind::Philosophy => "this_philosophy",
        }
    }
}

/// Loads documents, rejecting a `metadata.id` already seen by this loader
/// (§3 — "duplicates rejected at load").
#[derive(Debug, Default)]
pub struct DocumentLoader {
    seen_ids: HashSet<String>,
}

impl DocumentLoader {
    pub fn new() -> Self {
        DocumentLoader::default()
    }

    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<Document> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        self.load_str(&contents, &path.display().to_string())
    }

    pub fn load_str(&mut self, yaml: &str, source: &str) -> Result<Document> {
        let parsed: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let mapping = parsed
            .as_mapping()
            .ok_or_else(|| Error::DocumentMalformed(format!("{source}: document root is not a mapping")))?;

        let metadata = parse_metadata(mapping, source)?;
        if !self.seen_ids.insert(metadata.id.clone()) {
            return Err(Error::DocumentMalformed(format!(
                "duplicate document id: {}",
                metadata.id
            )));
        }

        let kind = classify(&metadata.id, source)?;
        let logic = match kind {
            DocumentKind::Rule => expr_from_yaml(require_field(mapping, "logic", source)?, source)?,
            DocumentKind::Philosophy => {
                let formal_logic = require_field(mapping, "formal_logic", source)?;
                let formal_mapping = formal_logic.as_mapping().ok_or_else(|| {
                    Error::DocumentMalformed(format!("{source}: formal_logic is not a mapping"))
                })?;
                expr_from_yaml(require_field(formal_mapping, "statement", source)?, source)?
            }
        };

        let self_check_key = match kind {
            DocumentKind::Rule => "self_validation",
            DocumentKind::Philosophy => "self_proof",
        };
        let self_check = expr_from_yaml(require_field(mapping, self_check_key, source)?, source)?;

        let unit_tests = match mapping.get("unit_tests") {
            Some(value) => parse_unit_tests(value, source)?,
            None => Vec::new(),
        };

        let raw = value_from_yaml(&parsed, source)?;

        debug!(id = %metadata.id, kind = ?kind, "document loaded");

        Ok(Document {
            kind,
            metadata,
            logic,
            self_check,
            unit_tests,
            raw,
        })
    }
}

fn classify(id: &str, source: &str) -> Result<DocumentKind> {
    if id.starts_with("akao:rule:") {
        Ok(DocumentKind::Rule)
    } else if id.starts_with("akao:philosophy:") {
        Ok(DocumentKind::Philosophy)
    } else {
        Err(Error::DocumentMalformed(format!(
            "{source}: metadata.id does not identify a rule or philosophy: {id}"
        )))
    }
}

fn parse_metadata(mapping: &serde_yaml::Mapping, source: &str) -> Result<Metadata> {
    let metadata_value = require_field(mapping, "metadata", source)?;
    let metadata_mapping = metadata_value
        .as_mapping()
        .ok_or_else(|| Error::DocumentMalformed(format!("{source}: metadata is not a mapping")))?;

    let id = require_str_field(metadata_mapping, "id", source)?;
    if !id_pattern().is_match(&id) {
        return Err(Error::DocumentMalformed(format!(
            "{source}: metadata.id '{id}' does not match akao:(rule|philosophy):<category>(:<sub>)*:v<int>"
        )));
    }
    let name = require_str_field(metadata_mapping, "name", source)?;
    let description = require_str_field(metadata_mapping, "description", source)?;

    Ok(Metadata { id, name, description })
}

fn require_field<'a>(mapping: &'a serde_yaml::Mapping, key: &str, source: &str) -> Result<&'a serde_yaml::Value> {
    mapping
        .get(key)
        .ok_or_else(|| Error::DocumentMalformed(format!("{source}: missing required field '{key}'")))
}

fn require_str_field(mapping: &serde_yaml::Mapping, key: &str, source: &str) -> Result<String> {
    require_field(mapping, key, source)?
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| Error::DocumentMalformed(format!("{source}: field '{key}' is not a string")))
}

fn parse_unit_tests(value: &serde_yaml::Value, source: &str) -> Result<Vec<UnitTestCase>> {
    let sequence = value
        .as_sequence()
        .ok_or_else(|| Error::DocumentMalformed(format!("{source}: unit_tests is not a sequence")))?;
    sequence.iter().map(|entry| parse_unit_test(entry, source)).collect()
}

fn parse_unit_test(value: &serde_yaml::Value, source: &str) -> Result<UnitTestCase> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| Error::DocumentMalformed(format!("{source}: unit test entry is not a mapping")))?;
    let name = require_str_field(mapping, "name", source)?;
    let setup_value = require_field(mapping, "setup", source)?;
    let setup_mapping = setup_value
        .as_mapping()
        .ok_or_else(|| Error::DocumentMalformed(format!("{source}: unit test '{name}' setup is not a mapping")))?;
    let mut setup = Vec::with_capacity(setup_mapping.len());
    for (k, v) in setup_mapping {
        let key = k
            .as_str()
            .ok_or_else(|| Error::DocumentMalformed(format!("{source}: unit test '{name}' has a non-string setup key")))?
            .to_string();
        setup.push((key, value_from_yaml(v, source)?));
    }
    let expected = value_from_yaml(require_field(mapping, "expected", source)?, source)?;
    Ok(UnitTestCase { name, setup, expected })
}

/// Converts any YAML value to a runtime `Value`, never consulting
/// expression-slot awareness — used both for ordinary literal positions and
/// for `Document::raw` (§3.1).
fn value_from_yaml(value: &serde_yaml::Value, source: &str) -> Result<Value> {
    match value {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Integer(i))
            } else {
                Ok(Value::String(n.to_string()))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => {
            let items = seq
                .iter()
                .map(|item| value_from_yaml(item, source))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Collection(items))
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut obj = Obj::new();
            for (k, v) in mapping {
                let key = k.as_str().ok_or_else(|| {
                    Error::DocumentMalformed(format!("{source}: object has a non-string key"))
                })?;
                obj.insert(key.to_string(), value_from_yaml(v, source)?);
            }
            Ok(Value::Object(obj))
        }
        serde_yaml::Value::Tagged(tagged) => value_from_yaml(&tagged.value, source),
    }
}

/// Parses a YAML value found at an expression-slot position (§4.5) into a
/// typed `ExpressionNode`. Unrecognised shapes are `DocumentMalformed`.
fn expr_from_yaml(value: &serde_yaml::Value, source: &str) -> Result<ExpressionNode> {
    let provenance = Provenance::new(source, 0, 0);
    let mapping = value
        .as_mapping()
        .ok_or_else(|| Error::DocumentMalformed(format!("{source}: expression is not a mapping")))?;

    if let Some(literal) = mapping.get("literal") {
        return Ok(ExpressionNode::new(
            ExpressionKind::Literal(value_from_yaml(literal, source)?),
            provenance,
        ));
    }

    if let Some(name) = mapping.get("var") {
        let name = name
            .as_str()
            .ok_or_else(|| Error::DocumentMalformed(format!("{source}: var is not a string")))?;
        return Ok(ExpressionNode::new(
            ExpressionKind::Variable(name.to_string()),
            provenance,
        ));
    }

    if let Some(function) = mapping.get("function") {
        let function = function
            .as_str()
            .ok_or_else(|| Error::DocumentMalformed(format!("{source}: function is not a string")))?
            .to_string();
        let arguments = if let Some(single) = mapping.get("argument") {
            vec![expr_from_yaml(single, source)?]
        } else if let Some(many) = mapping.get("arguments") {
            let seq = many
                .as_sequence()
                .ok_or_else(|| Error::DocumentMalformed(format!("{source}: arguments is not a sequence")))?;
            seq.iter().map(|a| expr_from_yaml(a, source)).collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        return Ok(ExpressionNode::new(
            ExpressionKind::Call { function, arguments },
            provenance,
        ));
    }

    if let Some(operator) = mapping.get("operator") {
        let operator = operator
            .as_str()
            .ok_or_else(|| Error::DocumentMalformed(format!("{source}: operator is not a string")))?;
        if operator == "not" {
            let argument = require_field(mapping, "argument", source)?;
            return Ok(ExpressionNode::new(
                ExpressionKind::Unary {
                    op: UnaryOp::Not,
                    argument: Box::new(expr_from_yaml(argument, source)?),
                },
                provenance,
            ));
        }
        let op = binary_op_from_str(operator, source)?;
        let left = expr_from_yaml(require_field(mapping, "left", source)?, source)?;
        let right = expr_from_yaml(require_field(mapping, "right", source)?, source)?;
        return Ok(ExpressionNode::new(
            ExpressionKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            provenance,
        ));
    }

    if let Some(forall) = mapping.get("forall") {
        return Ok(ExpressionNode::new(
            ExpressionKind::Forall(quantifier_body_from_yaml(forall, source)?),
            provenance,
        ));
    }

    if let Some(exists) = mapping.get("exists") {
        return Ok(ExpressionNode::new(
            ExpressionKind::Exists(quantifier_body_from_yaml(exists, source)?),
            provenance,
        ));
    }

    if mapping.contains_key("if") {
        let condition = expr_from_yaml(require_field(mapping, "if", source)?, source)?;
        let then_branch = expr_from_yaml(require_field(mapping, "then", source)?, source)?;
        let else_branch = expr_from_yaml(require_field(mapping, "else", source)?, source)?;
        return Ok(ExpressionNode::new(
            ExpressionKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            provenance,
        ));
    }

    if let Some(fixpoint) = mapping.get("fixpoint") {
        return Ok(ExpressionNode::new(
            ExpressionKind::Fixpoint(fixpoint_body_from_yaml(fixpoint, source)?),
            provenance,
        ));
    }

    Err(Error::DocumentMalformed(format!(
        "{source}: unrecognised expression form with keys {:?}",
        mapping.keys().filter_map(|k| k.as_str()).collect::<Vec<_>>()
    )))
}

fn binary_op_from_str(op: &str, source: &str) -> Result<BinaryOp> {
    match op {
        "and" => Ok(BinaryOp::And),
        "or" => Ok(BinaryOp::Or),
        "implies" => Ok(BinaryOp::Implies),
        "equals" => Ok(BinaryOp::Equals),
        "less_than" => Ok(BinaryOp::LessThan),
        "less_equal" => Ok(BinaryOp::LessEqual),
        "greater_than" => Ok(BinaryOp::GreaterThan),
        "greater_equal" => Ok(BinaryOp::GreaterEqual),
        other => Err(Error::DocumentMalformed(format!(
            "{source}: unknown operator '{other}'"
        ))),
    }
}

fn quantifier_body_from_yaml(value: &serde_yaml::Value, source: &str) -> Result<QuantifierBody> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| Error::DocumentMalformed(format!("{source}: quantifier body is not a mapping")))?;
    let variable = require_str_field(mapping, "variable", source)?;
    let domain = expr_from_yaml(require_field(mapping, "domain", source)?, source)?;
    let condition = expr_from_yaml(require_field(mapping, "condition", source)?, source)?;
    Ok(QuantifierBody {
        variable,
        domain: Box::new(domain),
        condition: Box::new(condition),
    })
}

fn fixpoint_body_from_yaml(value: &serde_yaml::Value, source: &str) -> Result<FixpointBody> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| Error::DocumentMalformed(format!("{source}: fixpoint body is not a mapping")))?;
    let variable = require_str_field(mapping, "variable", source)?;
    let expression = expr_from_yaml(require_field(mapping, "expression", source)?, source)?;
    let argument = match mapping.get("argument") {
        Some(arg) => Some(Box::new(expr_from_yaml(arg, source)?)),
        None => None,
    };
    Ok(FixpointBody {
        variable,
        expression: Box::new(expression),
        argument,
    })
}
