//! The fixed catalog of transformation stages and their serialization.
//!
//! The hosting pass infrastructure offers no way to express inter-pass
//! dependencies, so the ordering lives here, declared explicitly: every
//! stage carries a static rank plus the set of stages it must run after.
//! [`serialized_order`] computes the schedule by topological sort over the
//! declared edges, with rank as the deterministic tie-break. For the current
//! stage set the result is exactly rank order; the sort exists so the
//! ordering rationale is machine-checked rather than comment-documented.
//!
//! # Ordering rationale
//!
//! Later stages assume structural properties left by earlier ones:
//!
//! 1. **AntiClassDump** rewrites unit-wide identity metadata; nothing
//!    downstream depends on it, so it goes first.
//! 2. **FunctionCallObfuscate** rewrites call sites before any
//!    control-flow-shape transform runs.
//! 3. **StringEncryption** runs early so later stages never observe
//!    plaintext literal data.
//! 4. **BasicBlockSplit** increases block granularity, giving later passes
//!    finer-grained insertion points.
//! 5. **BogusControlFlow** inserts its edges before flattening so the
//!    dispatcher incorporates them.
//! 6. **Flattening** must precede substitution: substitution rewrites
//!    individual instructions and must not reason about pre-flattened shape.
//! 7. **Substitution** closes the per-function group.
//! 8. **IndirectBranch** runs over a snapshot of all functions, including
//!    ones synthesized by earlier stages.
//! 9. **FunctionWrapper** changes call sites and signatures, invalidating
//!    per-instruction assumptions, so it runs last among transformations.
//!
//! Toggles gate a stage's effect, never its position.

use strum::{EnumCount, EnumIter};

use crate::Result;

/// Identifies one transformation stage in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter)]
pub enum PassKind {
    /// Rewrites unit-wide identity/reflection metadata.
    AntiClassDump,
    /// Rewrites call sites inside defined functions.
    FunctionCallObfuscate,
    /// Encrypts string literal data across the whole unit.
    StringEncryption,
    /// Splits basic blocks to increase granularity.
    BasicBlockSplit,
    /// Inserts bogus control-flow edges guarded by opaque predicates.
    BogusControlFlow,
    /// Flattens control flow into a dispatcher loop.
    Flattening,
    /// Substitutes individual instructions with equivalent sequences.
    Substitution,
    /// Replaces direct branches with indirect ones.
    IndirectBranch,
    /// Wraps functions behind generated trampolines. Known to be unreliable
    /// in its interaction with other stages; toggleable but its correctness
    /// is not guaranteed.
    FunctionWrapper,
}

impl PassKind {
    /// Short name used in events, errors and reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PassKind::AntiClassDump => "anti-class-dump",
            PassKind::FunctionCallObfuscate => "function-call-obfuscate",
            PassKind::StringEncryption => "string-encryption",
            PassKind::BasicBlockSplit => "basic-block-split",
            PassKind::BogusControlFlow => "bogus-control-flow",
            PassKind::Flattening => "flattening",
            PassKind::Substitution => "substitution",
            PassKind::IndirectBranch => "indirect-branch",
            PassKind::FunctionWrapper => "function-wrapper",
        }
    }

    /// Static position of this stage in the pipeline, independent of
    /// toggle values.
    #[must_use]
    pub fn rank(&self) -> usize {
        *self as usize
    }
}

/// Whether a stage sees the whole unit or one function at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassScope {
    /// One entry-point call receiving the whole compilation unit.
    Unit,
    /// One entry-point call per function.
    Function,
}

/// Which functions a function-scope stage is dispatched over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionFilter {
    /// Defined functions only; declarations are skipped.
    DefinedOnly,
    /// Every function in the snapshot, declarations included.
    All,
}

/// Static description of one stage: identity, scope, position and the
/// stages it must run after.
#[derive(Debug, Clone, Copy)]
pub struct PassDescriptor {
    /// Which stage this describes.
    pub kind: PassKind,
    /// Unit-scope or function-scope dispatch.
    pub scope: PassScope,
    /// Function set for function-scope stages (ignored for unit scope).
    pub filter: FunctionFilter,
    /// Stages that must precede this one.
    pub runs_after: &'static [PassKind],
}

/// The fixed catalog, in rank order.
pub static CATALOG: [PassDescriptor; PassKind::COUNT] = [
    PassDescriptor {
        kind: PassKind::AntiClassDump,
        scope: PassScope::Unit,
        filter: FunctionFilter::All,
        runs_after: &[],
    },
    PassDescriptor {
        kind: PassKind::FunctionCallObfuscate,
        scope: PassScope::Function,
        filter: FunctionFilter::DefinedOnly,
        runs_after: &[PassKind::AntiClassDump],
    },
    PassDescriptor {
        kind: PassKind::StringEncryption,
        scope: PassScope::Unit,
        filter: FunctionFilter::All,
        runs_after: &[PassKind::FunctionCallObfuscate],
    },
    PassDescriptor {
        kind: PassKind::BasicBlockSplit,
        scope: PassScope::Function,
        filter: FunctionFilter::DefinedOnly,
        runs_after: &[PassKind::StringEncryption],
    },
    PassDescriptor {
        kind: PassKind::BogusControlFlow,
        scope: PassScope::Function,
        filter: FunctionFilter::DefinedOnly,
        runs_after: &[PassKind::BasicBlockSplit],
    },
    PassDescriptor {
        kind: PassKind::Flattening,
        scope: PassScope::Function,
        filter: FunctionFilter::DefinedOnly,
        runs_after: &[PassKind::BogusControlFlow],
    },
    PassDescriptor {
        kind: PassKind::Substitution,
        scope: PassScope::Function,
        filter: FunctionFilter::DefinedOnly,
        runs_after: &[PassKind::Flattening],
    },
    PassDescriptor {
        kind: PassKind::IndirectBranch,
        scope: PassScope::Function,
        filter: FunctionFilter::All,
        runs_after: &[PassKind::Substitution],
    },
    PassDescriptor {
        kind: PassKind::FunctionWrapper,
        scope: PassScope::Unit,
        filter: FunctionFilter::All,
        runs_after: &[PassKind::IndirectBranch],
    },
];

/// Looks up the descriptor for a stage.
#[must_use]
pub fn descriptor(kind: PassKind) -> &'static PassDescriptor {
    &CATALOG[kind.rank()]
}

/// Computes the serialized stage order by topological sort over the
/// declared `runs_after` edges.
///
/// The sort is deterministic: among ready stages the lowest rank is taken
/// first. For the current catalog the output equals rank order exactly; the
/// sort keeps that fact checked as the catalog evolves.
///
/// # Errors
///
/// Returns [`Error::OrderingCycle`](crate::Error::OrderingCycle) if the
/// declared dependencies contain a cycle.
pub fn serialized_order() -> Result<Vec<PassKind>> {
    let mut indegree = [0usize; PassKind::COUNT];
    for desc in &CATALOG {
        indegree[desc.kind.rank()] = desc.runs_after.len();
    }

    let mut order = Vec::with_capacity(PassKind::COUNT);
    let mut placed = [false; PassKind::COUNT];

    while order.len() < PassKind::COUNT {
        // Lowest-rank ready stage first keeps the sort deterministic.
        let next = CATALOG
            .iter()
            .find(|d| !placed[d.kind.rank()] && indegree[d.kind.rank()] == 0);
        let Some(next) = next else {
            let stuck = CATALOG
                .iter()
                .find(|d| !placed[d.kind.rank()])
                .map(|d| d.kind.name())
                .unwrap_or("unknown");
            return Err(crate::Error::OrderingCycle(stuck));
        };

        placed[next.kind.rank()] = true;
        order.push(next.kind);

        for desc in &CATALOG {
            if !placed[desc.kind.rank()] && desc.runs_after.contains(&next.kind) {
                indegree[desc.kind.rank()] -= 1;
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_serialized_order_matches_rank_order() {
        let order = serialized_order().unwrap();
        let expected: Vec<PassKind> = PassKind::iter().collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_catalog_is_rank_indexed() {
        for (index, desc) in CATALOG.iter().enumerate() {
            assert_eq!(desc.kind.rank(), index);
        }
    }

    #[test]
    fn test_dependencies_point_backwards() {
        for desc in &CATALOG {
            for dep in desc.runs_after {
                assert!(
                    dep.rank() < desc.kind.rank(),
                    "{} depends on later stage {}",
                    desc.kind.name(),
                    dep.name()
                );
            }
        }
    }

    #[test]
    fn test_scopes_match_pipeline_shape() {
        assert_eq!(descriptor(PassKind::AntiClassDump).scope, PassScope::Unit);
        assert_eq!(
            descriptor(PassKind::StringEncryption).scope,
            PassScope::Unit
        );
        assert_eq!(descriptor(PassKind::FunctionWrapper).scope, PassScope::Unit);
        assert_eq!(
            descriptor(PassKind::IndirectBranch).filter,
            FunctionFilter::All
        );
        assert_eq!(
            descriptor(PassKind::FunctionCallObfuscate).filter,
            FunctionFilter::DefinedOnly
        );
    }
}
