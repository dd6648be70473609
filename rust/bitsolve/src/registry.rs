//! Declared symbolic variables.

use std::collections::HashMap;

use bitsolve_engine::Engine;
use tracing::debug;

use crate::compiler::CompileError;

/// A declared variable and the engine term standing for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicVariable<T> {
    pub name: String,
    pub bit_width: u32,
    pub term: T,
}

/// Name → variable bindings plus the session's literal width.
///
/// Bindings are last-write-wins.  Every declaration is kept (in declaration
/// order) even after its name is rebound, since terms built from the older
/// binding still refer to it.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    variables: Vec<SymbolicVariable<T>>,
    bindings: HashMap<String, usize>,
    default_width: u32,
}

impl<T: Clone> Registry<T> {
    pub fn new(initial_width: u32) -> Self {
        Self {
            variables: Vec::new(),
            bindings: HashMap::new(),
            default_width: initial_width,
        }
    }

    /// Declare `name` as a `bit_width`-bit bitvector in `engine`.
    ///
    /// Overwrites any earlier binding of `name` and raises the default width
    /// to at least `bit_width`.
    pub fn declare<E>(
        &mut self,
        engine: &mut E,
        name: &str,
        bit_width: u32,
    ) -> Result<&SymbolicVariable<T>, CompileError>
    where
        E: Engine<Term = T>,
    {
        let sort = engine.bitvector_sort(bit_width)?;
        let term = engine.declare_symbol(name, sort)?;

        let index = self.variables.len();
        self.variables.push(SymbolicVariable {
            name: name.to_string(),
            bit_width,
            term,
        });
        if let Some(previous) = self.bindings.insert(name.to_string(), index) {
            debug!(
                name,
                previous_width = self.variables[previous].bit_width,
                bit_width,
                "redeclaration overwrites earlier binding"
            );
        }
        self.default_width = self.default_width.max(bit_width);
        debug!(name, bit_width, default_width = self.default_width, "declared variable");
        Ok(&self.variables[index])
    }

    /// Term currently bound to `name`.
    pub fn resolve(&self, name: &str) -> Result<T, CompileError> {
        self.lookup(name)
            .map(|v| v.term.clone())
            .ok_or_else(|| CompileError::UnboundVariable(name.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Option<&SymbolicVariable<T>> {
        self.bindings.get(name).map(|i| &self.variables[*i])
    }

    pub fn default_width(&self) -> u32 {
        self.default_width
    }

    /// Number of declarations made, including overwritten ones.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// All declarations in the order they were made.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolicVariable<T>> {
        self.variables.iter()
    }
}
