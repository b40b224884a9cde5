//! The result of one pipeline run.

use std::fmt::Write as _;
use std::time::Duration;

use crate::{catalog::PassKind, cleanup::CleanupStats, events::EventLog};

/// One dispatched stage position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRecord {
    /// The stage at this position.
    pub kind: PassKind,
    /// The resolved toggle the stage was dispatched with.
    pub enabled: bool,
    /// Whether the stage reported changing the unit.
    pub changed: bool,
}

/// Everything a run produced besides the mutated unit itself.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Every dispatched stage position, in execution order. The sequence
    /// of positions is identical for every toggle configuration.
    pub stages: Vec<StageRecord>,
    /// Events recorded by stages and by cleanup.
    pub events: EventLog,
    /// What scaffold cleanup removed.
    pub cleanup: CleanupStats,
    /// The seed the run's PRNG was initialized with.
    pub seed: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl PipelineReport {
    /// The sequence of stage positions executed.
    #[must_use]
    pub fn executed_order(&self) -> Vec<PassKind> {
        self.stages.iter().map(|s| s.kind).collect()
    }

    /// The record for one stage, if it was dispatched.
    #[must_use]
    pub fn stage(&self, kind: PassKind) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    /// Human-readable run summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "pipeline run: seed {:#x}, {} stages, {:?}",
            self.seed,
            self.stages.len(),
            self.elapsed
        );
        for stage in &self.stages {
            let state = match (stage.enabled, stage.changed) {
                (false, _) => "off",
                (true, true) => "active",
                (true, false) => "active (no change)",
            };
            let _ = writeln!(out, "  {:<24} {}", stage.kind.name(), state);
        }
        let _ = writeln!(
            out,
            "  cleanup: {} references, {} declarations removed",
            self.cleanup.references_removed, self.cleanup.declarations_removed
        );
        out
    }
}
