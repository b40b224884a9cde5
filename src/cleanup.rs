//! End-of-pipeline removal of synthetic scaffolding.
//!
//! Stages may leave declaration-only helper functions behind as obfuscation
//! artifacts. They exist only as scaffolding and must be purged before the
//! pipeline's output is finalized, or later consumers of the unit encounter
//! unresolved synthetic symbols. Cleanup runs last and unconditionally,
//! regardless of toggle configuration, since any enabled stage may have
//! created scaffolding.
//!
//! Two sources identify scaffolding:
//!
//! 1. the [`ScaffoldRegistry`] of handles populated during the run by
//!    [`PassContext::declare_scaffold`](crate::PassContext::declare_scaffold);
//! 2. a scan for declaration-only functions carrying the reserved
//!    [`SCAFFOLD_PREFIX`], which catches scaffolding already present in the
//!    input unit (a previous run that never finished, for instance).
//!
//! For every match, all instructions referencing the declaration are removed
//! first, then the declaration itself is deleted — no dangling references
//! survive. Definitions are never deleted, even when marker-named. The
//! whole operation is idempotent: on an already-clean unit it removes
//! nothing.

use crate::{
    events::EventKind,
    ir::CompilationUnit,
    pass::PassContext,
};

/// Reserved name prefix identifying synthetic scaffolding declarations.
pub const SCAFFOLD_PREFIX: &str = "__obf_stub_";

/// Handles to scaffolding declarations created during a run.
///
/// Populated by the stages that create scaffolding, so cleanup does not
/// have to rely on name matching for anything created in-run.
#[derive(Debug, Clone, Default)]
pub struct ScaffoldRegistry {
    names: Vec<String>,
}

impl ScaffoldRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one scaffold handle.
    pub fn register(&mut self, name: String) {
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    /// All registered handles, in registration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns `true` if the handle is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Returns `true` if no handles are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// What cleanup removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Instructions deleted because they referenced a scaffold declaration.
    pub references_removed: usize,
    /// Scaffold declarations deleted from the unit.
    pub declarations_removed: usize,
}

impl CleanupStats {
    /// Returns `true` if cleanup removed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.references_removed == 0 && self.declarations_removed == 0
    }
}

/// Removes all scaffolding declarations and every reference to them.
///
/// Candidates come from the run's scaffold registry plus a defensive scan
/// for marker-named declarations already in the unit. References are
/// stripped before the declaration is deleted.
pub fn run_marker_cleanup(unit: &mut CompilationUnit, cx: &mut PassContext) -> CleanupStats {
    let mut candidates: Vec<String> = cx.scaffolds().names().to_vec();
    for function in unit.functions() {
        if function.is_declaration()
            && function.name().starts_with(SCAFFOLD_PREFIX)
            && !candidates.iter().any(|n| n == function.name())
        {
            candidates.push(function.name().to_string());
        }
    }

    let mut stats = CleanupStats::default();
    for name in candidates {
        // A registered handle may have been turned into a definition by a
        // later stage; definitions are never deleted.
        match unit.function(&name) {
            Some(f) if f.is_declaration() => {}
            _ => continue,
        }

        for function in unit.functions_mut() {
            let owner = function.name().to_string();
            let Some(body) = function.body_mut() else {
                continue;
            };
            let before = body.len();
            body.retain(|inst| !inst.references(&name));
            let removed = before - body.len();
            stats.references_removed += removed;
            for _ in 0..removed {
                cx.record(EventKind::ReferenceRemoved {
                    from: owner.clone(),
                    to: name.clone(),
                });
            }
        }

        unit.remove(&name);
        stats.declarations_removed += 1;
        cx.record(EventKind::ScaffoldRemoved { function: name });
    }

    stats
}
