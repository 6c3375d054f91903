//! The interface to whatever turns [Module]s into running code.

use crate::{module::Module, result::Result};

/// A function made available by an [ExecutionBackend].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    /// Address of the machine code, if the backend has one.
    pub address: usize,
    /// Number of `f64` parameters.
    pub arity: usize,
}

/// Compiles modules incrementally. Every submitted module stays live,
/// and its definitions callable, until its handle is revoked.
pub trait ExecutionBackend {
    /// Identifies a submitted module.
    type Handle;

    /// Verify, optimize and compile `unit`, binding its definitions.
    /// A definition replaces any earlier one of the same name. Names the
    /// unit only declares may be defined by a later submission.
    fn submit(&mut self, unit: Module) -> Result<Self::Handle>;

    /// Find a currently callable function. It fails if `name`, or anything
    /// it calls, is not defined.
    fn lookup(&self, name: &str) -> Result<Symbol>;

    /// Call a function that takes and returns doubles.
    fn call(&self, name: &str, args: &[f64]) -> Result<f64>;

    /// Remove what was submitted with `handle`. Its definitions are no longer
    /// callable, unless a later submission replaced them.
    fn revoke(&mut self, handle: Self::Handle) -> Result<()>;
}
