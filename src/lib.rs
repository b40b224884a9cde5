//! Obfuscation pass pipeline core.
//!
//! `shroud` sequences a fixed catalog of independent code-transformation
//! stages over a compilation unit's intermediate representation. The
//! hosting pass infrastructure has no way to express inter-pass
//! dependencies, so this crate owns the ordering contract: it resolves
//! which stages are enabled from overlapping configuration sources, runs
//! the stages in a dependency-safe total order with unit-scope and
//! function-scope dispatch, and unconditionally purges synthetic
//! scaffolding at the end of every run.
//!
//! The transformations themselves (flattening, bogus control flow,
//! substitution, ...) are external collaborators: the host registers a
//! handler per stage through a [`PassRegistry`]. An unregistered or
//! disabled stage is the identity transform but still occupies its
//! position in the sequence.
//!
//! # Pipeline
//!
//! ```text
//! resolve options + env snapshot ──► ResolvedConfig (toggles, seed)
//!                                          │
//!                                          ▼
//!  anti-class-dump            (unit)
//!  function-call-obfuscate    (per defined function, init hook first)
//!  string-encryption          (unit)
//!  split ► bogus-cf ► flatten ► substitute   (grouped per defined function)
//!  indirect-branch            (per function, snapshot incl. synthesized)
//!  function-wrapper           (unit)
//!  scaffold cleanup           (always)
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use shroud::{
//!     CompilationUnit, EnvOverrides, ObfuscationOptions, PassRegistry, ResolvedConfig,
//!     Scheduler,
//! };
//!
//! let options = ObfuscationOptions::new().with_all(true).with_seed(42);
//! let config = ResolvedConfig::resolve(&options, &EnvOverrides::from_env());
//!
//! let registry = PassRegistry::new(); // host registers its handlers here
//! let scheduler = Scheduler::new(registry, config);
//!
//! let mut unit = CompilationUnit::new();
//! let report = scheduler.run(&mut unit)?;
//! println!("{}", report.summary());
//! # Ok::<(), shroud::Error>(())
//! ```
//!
//! The run either completes or the first stage failure aborts it; there is
//! no rollback and no semantic validation of the transformed unit.

#![warn(missing_docs)]

mod catalog;
mod cleanup;
mod config;
mod error;
mod events;
mod ir;
mod pass;
mod report;
mod scheduler;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

pub use catalog::{
    descriptor, serialized_order, FunctionFilter, PassDescriptor, PassKind, PassScope, CATALOG,
};
pub use cleanup::{run_marker_cleanup, CleanupStats, ScaffoldRegistry, SCAFFOLD_PREFIX};
pub use config::{
    EnvOverrides, ObfuscationOptions, ResolvedConfig, ToggleConfiguration, SEED_SENTINEL,
};
pub use error::Error;
pub use events::{Event, EventKind, EventLog};
pub use ir::{CompilationUnit, Function, Instruction};
pub use pass::{PassContext, PassRegistry, TransformPass};
pub use report::{PipelineReport, StageRecord};
pub use scheduler::{FunctionSnapshot, Scheduler};
