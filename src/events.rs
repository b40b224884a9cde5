//! Event recording for pipeline runs.
//!
//! Stages and the cleanup phase record what they did into an [`EventLog`]
//! carried by the pass context; the log is returned to the caller inside
//! the pipeline report. This is the crate's observability surface: no
//! logging framework, just structured domain events.

use crate::catalog::PassKind;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A unit-scope stage changed the unit.
    UnitTransformed,
    /// A function-scope stage changed one function.
    FunctionTransformed {
        /// Name of the transformed function.
        function: String,
    },
    /// A stage synthesized a new function into the unit.
    FunctionSynthesized {
        /// Name of the new function.
        function: String,
    },
    /// A stage registered a scaffolding declaration for end-of-run cleanup.
    ScaffoldRegistered {
        /// Name of the scaffold declaration.
        function: String,
    },
    /// Cleanup removed an instruction referencing a scaffold declaration.
    ReferenceRemoved {
        /// Function the instruction lived in.
        from: String,
        /// The scaffold declaration it referenced.
        to: String,
    },
    /// Cleanup deleted a scaffold declaration.
    ScaffoldRemoved {
        /// Name of the deleted declaration.
        function: String,
    },
}

/// One recorded event, attributed to the stage that was dispatched when it
/// was recorded (`None` for cleanup, which is not a catalog stage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// The stage active when the event was recorded.
    pub pass: Option<PassKind>,
    /// What happened.
    pub kind: EventKind,
}

/// Ordered log of everything a run did.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn record(&mut self, pass: Option<PassKind>, kind: EventKind) {
        self.events.push(Event { pass, kind });
    }

    /// All events, in recording order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Appends all events from `other`, preserving their order.
    pub fn merge(&mut self, other: EventLog) {
        self.events.extend(other.events);
    }

    /// Events recorded while the given stage was active.
    pub fn for_pass(&self, pass: PassKind) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.pass == Some(pass))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_filter() {
        let mut log = EventLog::new();
        log.record(Some(PassKind::Flattening), EventKind::UnitTransformed);
        log.record(
            None,
            EventKind::ScaffoldRemoved {
                function: "__obf_stub_0".to_string(),
            },
        );

        assert_eq!(log.len(), 2);
        assert_eq!(log.for_pass(PassKind::Flattening).count(), 1);
        assert_eq!(log.for_pass(PassKind::Substitution).count(), 0);
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut first = EventLog::new();
        first.record(Some(PassKind::StringEncryption), EventKind::UnitTransformed);
        let mut second = EventLog::new();
        second.record(
            Some(PassKind::Substitution),
            EventKind::FunctionTransformed {
                function: "main".to_string(),
            },
        );

        first.merge(second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.events()[1].pass, Some(PassKind::Substitution));
    }
}
