use thiserror::Error;

/// The generic Error type, covering all errors this library can return.
///
/// The scheduler itself performs no error recovery: a failing stage aborts
/// the whole run and the error propagates to the caller unchanged. The
/// variants here exist so that stage handlers and the ordering machinery
/// have a shared vocabulary for reporting those hard failures.
#[derive(Error, Debug)]
pub enum Error {
    /// The declared pass dependencies contain a cycle.
    ///
    /// The pass catalog carries explicit `runs_after` edges; serialization
    /// performs a topological sort over them. A cycle means the catalog
    /// definition itself is inconsistent and no valid schedule exists.
    #[error("dependency cycle in pass catalog involving '{0}'")]
    OrderingCycle(&'static str),

    /// A transformation stage failed while processing the unit.
    ///
    /// Stages are trusted to either complete or fail hard; this variant
    /// carries the failing stage's name and its own description of what
    /// went wrong.
    #[error("stage '{pass}' failed: {message}")]
    Stage {
        /// Name of the stage that failed.
        pass: &'static str,
        /// The stage's own description of the failure.
        message: String,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
