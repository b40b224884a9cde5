//! The stage handler contract and the registry that holds handlers.
//!
//! Transformation internals live outside this crate. The host registers one
//! handler per stage it wants active; the scheduler dispatches every
//! catalog position in order regardless, handing each handler its resolved
//! enablement flag. A disabled stage (or an unregistered slot) behaves as
//! the identity transform but still occupies its position — no reordering
//! ever results from toggling.
//!
//! Handlers are stateless registry entries selected by stage kind, not
//! per-invocation heap objects: a handler is borrowed for the duration of
//! one dispatch and nothing of it is retained across stage boundaries.

use rand::{rngs::StdRng, SeedableRng};
use strum::EnumCount;

use crate::{
    catalog::PassKind,
    cleanup::{ScaffoldRegistry, SCAFFOLD_PREFIX},
    events::{EventKind, EventLog},
    ir::{CompilationUnit, Function},
    Result,
};

/// A transformation stage handler.
///
/// A handler exposes a unit-scope entry point and/or a function-scope entry
/// point; the catalog decides which one the scheduler calls. Function-scope
/// handlers may additionally use [`initialize`](TransformPass::initialize)
/// as a one-time unit-level hook invoked before the first per-function
/// call.
///
/// `enabled` carries the stage's resolved toggle. Honoring it is the
/// handler's own responsibility: when `false` the handler must leave its
/// input untouched and return `Ok(false)`.
pub trait TransformPass {
    /// Handler name for errors and diagnostics.
    fn name(&self) -> &'static str;

    /// One-time unit-level hook for function-scope stages, invoked before
    /// the first per-function call. Called regardless of the toggle.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails; the run aborts.
    fn initialize(&self, _unit: &mut CompilationUnit, _cx: &mut PassContext) -> Result<()> {
        Ok(())
    }

    /// Unit-scope entry point. Returns `true` if the unit was changed.
    ///
    /// # Errors
    ///
    /// Returns an error on any fatal condition inside the stage; the run
    /// aborts.
    fn run_on_unit(
        &self,
        _unit: &mut CompilationUnit,
        _enabled: bool,
        _cx: &mut PassContext,
    ) -> Result<bool> {
        Ok(false)
    }

    /// Function-scope entry point. Returns `true` if the function was
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns an error on any fatal condition inside the stage; the run
    /// aborts.
    fn run_on_function(
        &self,
        _function: &mut Function,
        _enabled: bool,
        _cx: &mut PassContext,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Registry of stage handlers, one optional slot per catalog position.
///
/// An empty slot is the identity transform for that position.
#[derive(Default)]
pub struct PassRegistry {
    slots: [Option<Box<dyn TransformPass>>; PassKind::COUNT],
}

impl PassRegistry {
    /// Creates an empty registry; every stage is the identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for one stage, replacing any previous one.
    pub fn register(&mut self, kind: PassKind, handler: Box<dyn TransformPass>) {
        self.slots[kind.rank()] = Some(handler);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with_pass(mut self, kind: PassKind, handler: Box<dyn TransformPass>) -> Self {
        self.register(kind, handler);
        self
    }

    /// The handler for one stage, if registered.
    #[must_use]
    pub fn get(&self, kind: PassKind) -> Option<&dyn TransformPass> {
        self.slots[kind.rank()].as_deref()
    }
}

/// Per-run state handed to every handler invocation.
///
/// Carries the run's PRNG (created once from the resolved seed, never
/// reseeded), the event log, the scaffold registry and a buffer for
/// functions synthesized mid-dispatch. The scheduler drains the buffer into
/// the unit after each dispatch returns, which is what makes synthesized
/// functions visible to later stages.
pub struct PassContext {
    rng: StdRng,
    events: EventLog,
    scaffolds: ScaffoldRegistry,
    synthesized: Vec<Function>,
    current_pass: Option<PassKind>,
}

impl PassContext {
    /// Creates the context for one run, seeding the PRNG from the resolved
    /// seed. The scheduler builds one per run; standalone construction is
    /// only needed to drive
    /// [`run_marker_cleanup`](crate::run_marker_cleanup) outside a run.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            events: EventLog::new(),
            scaffolds: ScaffoldRegistry::new(),
            synthesized: Vec::new(),
            current_pass: None,
        }
    }

    /// The run's PRNG. Shared by all randomized stages; read-only seeding.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Records an event attributed to the currently dispatched stage.
    pub fn record(&mut self, kind: EventKind) {
        self.events.record(self.current_pass, kind);
    }

    /// Buffers a synthesized function for insertion into the unit.
    ///
    /// The function joins the unit when the current dispatch returns, so it
    /// is visible to every later stage (including snapshot-taking ones) but
    /// not re-visited by the stage that created it.
    pub fn synthesize(&mut self, function: Function) {
        self.record(EventKind::FunctionSynthesized {
            function: function.name().to_string(),
        });
        self.synthesized.push(function);
    }

    /// Creates a scaffolding declaration and registers it for end-of-run
    /// cleanup. Returns the reserved marker name, which the caller may
    /// reference from emitted instructions.
    ///
    /// The tag must be unique within the run; the reserved prefix is
    /// applied automatically.
    pub fn declare_scaffold(&mut self, tag: &str) -> String {
        let name = format!("{SCAFFOLD_PREFIX}{tag}");
        self.record(EventKind::ScaffoldRegistered {
            function: name.clone(),
        });
        self.scaffolds.register(name.clone());
        self.synthesized.push(Function::declare(name.clone()));
        name
    }

    /// Marks which stage is being dispatched; events are attributed to it.
    pub(crate) fn set_current(&mut self, pass: Option<PassKind>) {
        self.current_pass = pass;
    }

    /// Drains the synthesized-function buffer.
    pub(crate) fn take_synthesized(&mut self) -> Vec<Function> {
        std::mem::take(&mut self.synthesized)
    }

    /// The scaffold handles registered so far.
    pub(crate) fn scaffolds(&self) -> &ScaffoldRegistry {
        &self.scaffolds
    }

    /// Consumes the context, yielding the event log.
    pub(crate) fn into_log(self) -> EventLog {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl TransformPass for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }
    }

    #[test]
    fn test_empty_registry_has_no_handlers() {
        let registry = PassRegistry::new();
        assert!(registry.get(PassKind::Flattening).is_none());
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = PassRegistry::new().with_pass(PassKind::Substitution, Box::new(Noop));
        assert!(registry.get(PassKind::Substitution).is_some());
        assert!(registry.get(PassKind::Flattening).is_none());
    }

    #[test]
    fn test_declare_scaffold_applies_marker_prefix() {
        let mut cx = PassContext::new(7);
        let name = cx.declare_scaffold("fco_0");
        assert!(name.starts_with(SCAFFOLD_PREFIX));

        let synthesized = cx.take_synthesized();
        assert_eq!(synthesized.len(), 1);
        assert!(synthesized[0].is_declaration());
        assert_eq!(synthesized[0].name(), name);
        assert!(cx.scaffolds().contains(&name));
    }

    #[test]
    fn test_default_trait_methods_are_identity() {
        let mut unit = CompilationUnit::new();
        let mut function = Function::define("f", vec![]);
        let mut cx = PassContext::new(0);
        let pass = Noop;

        assert!(!pass.run_on_unit(&mut unit, true, &mut cx).unwrap());
        assert!(!pass.run_on_function(&mut function, true, &mut cx).unwrap());
        assert!(pass.initialize(&mut unit, &mut cx).is_ok());
    }
}
