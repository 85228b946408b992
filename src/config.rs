/**
 * Engine Configuration
 *
 * DESIGN DECISION: A single flat `EngineConfig` loaded from TOML with
 * `Default` supplying every value, rather than a layered
 * defaults-then-file-then-env resolver
 * WHY: §0 scopes "packaging, configuration loading, templates" for the
 * surrounding product out as an outer concern, but the engine's own
 * tunables (fixpoint cap, caching, tracing, deadline) are not that outer
 * concern — they are parameters of the interpreter itself. A flat struct
 * with sane defaults is the right amount of ceremony for four knobs; the
 * teacher's layered `ConfigLevel` resolution is overkill here because there
 * is no multi-tenant/multi-environment override problem to solve.
 *
 * PATTERN: defaults-plus-TOML config struct (grounded on aetherlight-core's
 * ConfigLoader idiom, narrowed from its multi-tier resolution to a single
 * `Default` + `from_toml` pair)
 */
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Tunables for one `Engine` instance. Every field has a sane default so a
/// host application can load only the overrides it cares about.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Iteration cap for `fixpoint` before `Error::NonTermination` (§4.4,
    /// default 1024).
    pub fixpoint_cap: u32,

    /// Whether the expression cache is enabled at construction. Can still
    /// be toggled later via `Engine::enable_caching`.
    pub caching_enabled: bool,

    /// Whether tracing is enabled at construction. Can still be toggled
    /// later via `Engine::enable_tracing`.
    pub tracing_enabled: bool,

    /// Per-evaluation deadline in milliseconds; `None`-equivalent is
    /// `0`, meaning no deadline (TOML has no native `Option`, so a zero
    /// value is the documented "disabled" sentinel).
    pub deadline_millis: u64,
}

impl EngineConfig {
    /// The per-evaluation deadline this config implies, or `None` if
    /// disabled (`deadline_millis == 0`).
    pub fn deadline(&self) -> Option<Duration> {
        if self.deadline_millis == 0 {
            None
        } else {
            Some(Duration::from_millis(self.deadline_millis))
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|err| Error::DocumentMalformed(format!("invalid engine configuration: {err}")))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            fixpoint_cap: 1024,
            caching_enabled: true,
            tracing_enabled: false,
            deadline_millis: 0,
        }
    }
}
