/**
 * Trace — Observational Evaluation Recording
 *
 * DESIGN DECISION: A `TraceSink` trait with a no-op default, rather than a
 * `bool` flag threaded through every evaluator call
 * WHY: §4.4 requires tracing to be "strictly observational" — a trait object
 * lets the evaluator call `sink.record(..)` unconditionally while a no-op
 * sink compiles it away to nothing, keeping the hot evaluation path free of
 * branch-on-flag checks in the common (untraced) case.
 *
 * PATTERN: sink trait object (grounded on aetherlight-core's IPC transport
 * trait boundary, generalized from message transport to trace emission)
 */
use chrono::{DateTime, Utc};

use crate::expression::NodeId;
use crate::value::Value;

/// One node's evaluation, captured after the fact. `outcome` is `Err`'s
/// display text rather than `Error` itself, so tracing never needs to clone
/// or depend on the full error type's shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub node_id: NodeId,
    pub depth: usize,
    /// Flattened view of every bound variable visible to this node, taken at
    /// the moment it finished evaluating (§4.4).
    pub context_snapshot: Value,
    pub inputs: Vec<Value>,
    pub outcome: Result<Value, String>,
    pub elapsed: std::time::Duration,
    pub timestamp: DateTime<Utc>,
}

/// Receives trace records as evaluation proceeds. Implementations must not
/// influence evaluation outcomes — tracing is a side channel only.
pub trait TraceSink: std::fmt::Debug {
    fn record(&mut self, record: TraceRecord);
}

/// Discards every record. Installed by default so untraced evaluation pays
/// no cost beyond a vtable call.
#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn record(&mut self, _record: TraceRecord) {}
}

/// Accumulates every record in arrival order — the sink integration tests
/// and the executor's violation re-run (§4.6) use to inspect what happened.
#[derive(Debug, Default)]
pub struct VecTraceSink {
    pub records: Vec<TraceRecord>,
}

impl VecTraceSink {
    pub fn new() -> Self {
        VecTraceSink::default()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl TraceSink for VecTraceSink {
    fn record(&mut self, record: TraceRecord) {
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExpressionKind, ExpressionNode, Provenance};

    fn sample_record() -> TraceRecord {
        let node = ExpressionNode::new(ExpressionKind::Literal(Value::Null), Provenance::unknown());
        TraceRecord {
            node_id: node.id,
            depth: 0,
            context_snapshot: Value::Object(crate::value::Obj::new()),
            inputs: vec![],
            outcome: Ok(Value::Boolean(true)),
            elapsed: std::time::Duration::from_millis(1),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn null_sink_discards_records() {
        let mut sink = NullTraceSink;
        sink.record(sample_record());
    }

    #[test]
    fn vec_sink_accumulates_in_order() {
        let mut sink = VecTraceSink::new();
        sink.record(sample_record());
        sink.record(sample_record());
        assert_eq!(sink.records.len(), 2);
    }

    #[test]
    fn vec_sink_clear_empties_records() {
        let mut sink = VecTraceSink::new();
        sink.record(sample_record());
        sink.clear();
        assert!(sink.records.is_empty());
    }
}
