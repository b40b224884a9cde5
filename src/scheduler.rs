//! Pipeline execution.
//!
//! The scheduler consumes the catalog's serialized order and an immutable
//! [`ResolvedConfig`], then drives the registered handlers over one
//! compilation unit, start to finish, single-threaded. Every catalog
//! position is dispatched on every run: a stage's resolved toggle is handed
//! to its handler rather than used to skip the invocation, so the sequence
//! of positions never varies — only each stage's observable effect does.
//!
//! Consecutive function-scope stages sharing a function filter are executed
//! as one function-major sweep: for each function in the sweep's snapshot,
//! the whole group runs back-to-back before the next function is visited.
//! With the current catalog that groups split → bogus-control-flow →
//! flattening → substitution, while call-site obfuscation and indirect
//! branching each form a sweep of their own.
//!
//! Each sweep captures a [`FunctionSnapshot`] of the unit's contents at the
//! moment the sweep begins. Functions synthesized earlier in the run are
//! therefore included — indirect branching deliberately covers helper
//! functions created by prior stages — while functions synthesized inside a
//! sweep are only visited by later ones.
//!
//! There is no error recovery: the first failing handler aborts the run.
//! Scaffold cleanup always runs last, whatever the toggle configuration.

use std::time::Instant;

use crate::{
    catalog::{self, FunctionFilter, PassDescriptor, PassKind, PassScope},
    cleanup,
    config::ResolvedConfig,
    events::EventKind,
    ir::CompilationUnit,
    pass::{PassContext, PassRegistry},
    report::{PipelineReport, StageRecord},
    Error, Result,
};

/// The set of function names present in the unit at one point in time.
///
/// Captured by reference to the unit's current contents at the start of a
/// function-scope sweep; the sweep then iterates these names only. A name
/// no longer present at dispatch time is skipped.
#[derive(Debug, Clone)]
pub struct FunctionSnapshot {
    names: Vec<String>,
}

impl FunctionSnapshot {
    /// Captures the names of all functions matching the filter.
    #[must_use]
    pub fn capture(unit: &CompilationUnit, filter: FunctionFilter) -> Self {
        let names = unit
            .functions()
            .iter()
            .filter(|f| match filter {
                FunctionFilter::DefinedOnly => f.is_definition(),
                FunctionFilter::All => true,
            })
            .map(|f| f.name().to_string())
            .collect();
        Self { names }
    }

    /// The captured names, in unit order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Executes the fixed pipeline over one compilation unit per call.
///
/// Holds the handler registry and the resolved configuration for its
/// lifetime; the unit is exclusively borrowed for the duration of each
/// [`run`](Self::run).
pub struct Scheduler {
    registry: PassRegistry,
    config: ResolvedConfig,
}

impl Scheduler {
    /// Creates a scheduler from a handler registry and a resolved
    /// configuration.
    #[must_use]
    pub fn new(registry: PassRegistry, config: ResolvedConfig) -> Self {
        Self { registry, config }
    }

    /// The configuration this scheduler runs with.
    #[must_use]
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Runs the whole pipeline over `unit`, mutating it in place.
    ///
    /// Stages execute in the catalog's serialized order; scaffold cleanup
    /// runs last, unconditionally. Returns the run's report: per-stage
    /// records, the event log, cleanup statistics, the seed and timing.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure, attributed to the failing stage.
    /// The unit may be partially transformed in that case; there is no
    /// rollback.
    pub fn run(&self, unit: &mut CompilationUnit) -> Result<PipelineReport> {
        let start = Instant::now();
        let order = catalog::serialized_order()?;
        let mut cx = PassContext::new(self.config.seed);
        let mut stages = Vec::with_capacity(order.len());

        let mut index = 0;
        while index < order.len() {
            let desc = catalog::descriptor(order[index]);
            match desc.scope {
                PassScope::Unit => {
                    stages.push(self.dispatch_unit(desc, unit, &mut cx)?);
                    index += 1;
                }
                PassScope::Function => {
                    let end = sweep_end(&order, index, desc.filter);
                    let records =
                        self.dispatch_sweep(&order[index..end], desc.filter, unit, &mut cx)?;
                    stages.extend(records);
                    index = end;
                }
            }
        }

        cx.set_current(None);
        let cleanup = cleanup::run_marker_cleanup(unit, &mut cx);

        Ok(PipelineReport {
            stages,
            events: cx.into_log(),
            cleanup,
            seed: self.config.seed,
            elapsed: start.elapsed(),
        })
    }

    /// Dispatches one unit-scope stage.
    fn dispatch_unit(
        &self,
        desc: &PassDescriptor,
        unit: &mut CompilationUnit,
        cx: &mut PassContext,
    ) -> Result<StageRecord> {
        let kind = desc.kind;
        let enabled = self.config.toggles.enabled(kind);
        cx.set_current(Some(kind));

        let mut changed = false;
        if let Some(handler) = self.registry.get(kind) {
            changed = handler
                .run_on_unit(unit, enabled, cx)
                .map_err(|e| attribute(kind, e))?;
            if changed {
                cx.record(EventKind::UnitTransformed);
            }
            absorb_synthesized(unit, cx);
        }

        Ok(StageRecord {
            kind,
            enabled,
            changed,
        })
    }

    /// Dispatches one function-major sweep of consecutive function-scope
    /// stages sharing a filter.
    fn dispatch_sweep(
        &self,
        sweep: &[PassKind],
        filter: FunctionFilter,
        unit: &mut CompilationUnit,
        cx: &mut PassContext,
    ) -> Result<Vec<StageRecord>> {
        let snapshot = FunctionSnapshot::capture(unit, filter);

        // One-time unit-level hooks, before any per-function call.
        for &kind in sweep {
            if let Some(handler) = self.registry.get(kind) {
                cx.set_current(Some(kind));
                handler.initialize(unit, cx).map_err(|e| attribute(kind, e))?;
                absorb_synthesized(unit, cx);
            }
        }

        let mut changed = vec![false; sweep.len()];
        for name in snapshot.names() {
            for (slot, &kind) in sweep.iter().enumerate() {
                let Some(handler) = self.registry.get(kind) else {
                    continue;
                };
                let Some(index) = unit.index_of(name) else {
                    continue;
                };
                cx.set_current(Some(kind));
                let enabled = self.config.toggles.enabled(kind);
                let touched = handler
                    .run_on_function(unit.function_at_mut(index), enabled, cx)
                    .map_err(|e| attribute(kind, e))?;
                if touched {
                    changed[slot] = true;
                    cx.record(EventKind::FunctionTransformed {
                        function: name.clone(),
                    });
                }
                absorb_synthesized(unit, cx);
            }
        }

        Ok(sweep
            .iter()
            .zip(changed)
            .map(|(&kind, changed)| StageRecord {
                kind,
                enabled: self.config.toggles.enabled(kind),
                changed,
            })
            .collect())
    }
}

/// Extent of the function-scope sweep starting at `start`: consecutive
/// function-scope stages sharing `filter`.
fn sweep_end(order: &[PassKind], start: usize, filter: FunctionFilter) -> usize {
    let mut end = start + 1;
    while end < order.len() {
        let next = catalog::descriptor(order[end]);
        if next.scope == PassScope::Function && next.filter == filter {
            end += 1;
        } else {
            break;
        }
    }
    end
}

/// Moves functions synthesized during the last dispatch into the unit.
fn absorb_synthesized(unit: &mut CompilationUnit, cx: &mut PassContext) {
    for function in cx.take_synthesized() {
        unit.push(function);
    }
}

/// Attributes a handler error to its stage unless already attributed.
fn attribute(kind: PassKind, error: Error) -> Error {
    match error {
        already @ Error::Stage { .. } => already,
        other => Error::Stage {
            pass: kind.name(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Function;
    use strum::IntoEnumIterator;

    #[test]
    fn test_snapshot_filters_declarations() {
        let mut unit = CompilationUnit::new();
        unit.push(Function::define("a", vec![]));
        unit.push(Function::declare("b"));
        unit.push(Function::define("c", vec![]));

        let defined = FunctionSnapshot::capture(&unit, FunctionFilter::DefinedOnly);
        assert_eq!(defined.names(), ["a", "c"]);

        let all = FunctionSnapshot::capture(&unit, FunctionFilter::All);
        assert_eq!(all.names(), ["a", "b", "c"]);
    }

    #[test]
    fn test_sweep_extents_match_pipeline_shape() {
        let order: Vec<PassKind> = PassKind::iter().collect();

        // Call-site obfuscation stands alone: string encryption follows.
        assert_eq!(
            sweep_end(&order, 1, FunctionFilter::DefinedOnly),
            2,
            "fco sweep"
        );
        // Split, bogus control flow, flattening and substitution fuse.
        assert_eq!(
            sweep_end(&order, 3, FunctionFilter::DefinedOnly),
            7,
            "per-function group"
        );
        // Indirect branching has a different filter and stands alone.
        assert_eq!(sweep_end(&order, 7, FunctionFilter::All), 8);
    }

    #[test]
    fn test_empty_registry_run_is_identity() {
        let mut unit = CompilationUnit::new();
        unit.push(Function::define("main", vec![]));
        let snapshot = unit.clone();

        let config = ResolvedConfig {
            toggles: crate::config::ToggleConfiguration::resolve(
                &crate::config::ObfuscationOptions::default(),
                &crate::config::EnvOverrides::default(),
            ),
            seed: 1,
        };
        let scheduler = Scheduler::new(PassRegistry::new(), config);
        let report = scheduler.run(&mut unit).unwrap();

        assert_eq!(unit, snapshot);
        assert!(report.cleanup.is_noop());
        assert_eq!(report.executed_order(), PassKind::iter().collect::<Vec<_>>());
    }
}
