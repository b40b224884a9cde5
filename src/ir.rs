//! Minimal intermediate representation the pipeline operates on.
//!
//! The scheduler treats function bodies as opaque beyond one structural
//! question: does an instruction reference a named function? That single
//! capability is what end-of-pipeline scaffold cleanup needs in order to
//! strip dangling uses of synthetic declarations before deleting them.
//!
//! The unit is owned by the host and mutated in place by every stage; the
//! core never copies it. Functions may be synthesized mid-pipeline and must
//! become visible to later stages that iterate the unit's current contents.

/// One instruction inside a function body.
///
/// Only the shapes the core has to reason about are distinguished; anything
/// else is carried as [`Instruction::Opaque`] text and flows through the
/// pipeline untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Direct call to a named function.
    Call {
        /// Name of the called function.
        callee: String,
    },
    /// Takes the address of a named function, as emitted by indirect
    /// branching rewrites.
    FuncAddr {
        /// Name of the referenced function.
        target: String,
    },
    /// Any instruction with no function references.
    Opaque(String),
}

impl Instruction {
    /// Returns `true` if this instruction references the named function.
    #[must_use]
    pub fn references(&self, name: &str) -> bool {
        match self {
            Instruction::Call { callee } => callee == name,
            Instruction::FuncAddr { target } => target == name,
            Instruction::Opaque(_) => false,
        }
    }
}

/// A function inside a [`CompilationUnit`].
///
/// A function is either a definition (it has a body, possibly empty) or a
/// declaration (no body). Declarations matter to the core because synthetic
/// scaffolding left behind by transformation stages is always
/// declaration-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    name: String,
    body: Option<Vec<Instruction>>,
}

impl Function {
    /// Creates a defined function with the given body.
    #[must_use]
    pub fn define(name: impl Into<String>, body: Vec<Instruction>) -> Self {
        Self {
            name: name.into(),
            body: Some(body),
        }
    }

    /// Creates a declaration-only function.
    #[must_use]
    pub fn declare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: None,
        }
    }

    /// The function's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if this function has no body.
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }

    /// Returns `true` if this function has a body.
    #[must_use]
    pub fn is_definition(&self) -> bool {
        self.body.is_some()
    }

    /// The function's body, if it is a definition.
    #[must_use]
    pub fn body(&self) -> Option<&[Instruction]> {
        self.body.as_deref()
    }

    /// Mutable access to the body, if it is a definition.
    pub fn body_mut(&mut self) -> Option<&mut Vec<Instruction>> {
        self.body.as_mut()
    }
}

/// The whole piece of intermediate representation being transformed.
///
/// An ordered collection of functions, analogous to one translated source
/// module. Stages mutate it in place; only scaffold cleanup is permitted to
/// delete functions from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationUnit {
    functions: Vec<Function>,
}

impl CompilationUnit {
    /// Creates an empty unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a function to the unit.
    pub fn push(&mut self, function: Function) {
        self.functions.push(function);
    }

    /// All functions, in unit order.
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Mutable access to all functions.
    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    /// Index of the named function, if present.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.name() == name)
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name() == name)
    }

    /// Looks up a function by name, mutably.
    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name() == name)
    }

    /// Mutable access to the function at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn function_at_mut(&mut self, index: usize) -> &mut Function {
        &mut self.functions[index]
    }

    /// Removes and returns the named function.
    pub fn remove(&mut self, name: &str) -> Option<Function> {
        let index = self.index_of(name)?;
        Some(self.functions.remove(index))
    }

    /// Number of functions in the unit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if the unit contains no functions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_references() {
        let call = Instruction::Call {
            callee: "helper".to_string(),
        };
        let addr = Instruction::FuncAddr {
            target: "helper".to_string(),
        };
        let opaque = Instruction::Opaque("add r0, r1".to_string());

        assert!(call.references("helper"));
        assert!(!call.references("other"));
        assert!(addr.references("helper"));
        assert!(!opaque.references("helper"));
    }

    #[test]
    fn test_declaration_vs_definition() {
        let decl = Function::declare("ext");
        let def = Function::define("main", vec![]);

        assert!(decl.is_declaration());
        assert!(!decl.is_definition());
        assert!(decl.body().is_none());

        assert!(def.is_definition());
        assert_eq!(def.body(), Some(&[][..]));
    }

    #[test]
    fn test_unit_lookup_and_remove() {
        let mut unit = CompilationUnit::new();
        unit.push(Function::define("a", vec![]));
        unit.push(Function::declare("b"));

        assert_eq!(unit.len(), 2);
        assert_eq!(unit.index_of("b"), Some(1));
        assert!(unit.function("a").is_some());

        let removed = unit.remove("a").unwrap();
        assert_eq!(removed.name(), "a");
        assert_eq!(unit.len(), 1);
        assert!(unit.index_of("a").is_none());
    }
}
