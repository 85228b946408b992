//! Loads a rule document from a path given on the command line, runs it
//! against an empty context, and prints the resulting outcome.

use std::env;

use akao_logic_core::{Context, Engine, EngineConfig};

fn main() {
    let path = env::args().nth(1).expect("usage: run_rule <path-to-rule.yaml>");

    let mut engine = Engine::with_builtins(EngineConfig::default());
    let doc = engine.load_document(&path).expect("failed to load document");
    let outcome = engine.run(&doc, &Context::new());

    println!("document: {}", doc.metadata.id);
    println!("primary: {:?}", outcome.primary);
    println!("self_check: {:?} ({:?})", outcome.self_check, outcome.self_check_reason);
    for unit in &outcome.unit_results {
        println!("unit_test {}: pass={}", unit.name, unit.pass);
    }
    for violation in &outcome.violations {
        println!("violation: {} = {}", violation.variable, violation.element);
    }
}
