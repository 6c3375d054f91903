//! A [Module] is the unit of compilation handed to an execution backend.

use std::fmt;

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::function::Function;

new_key_type! {
    /// A function within a [Module].
    pub struct FuncId;
}

/// A named collection of function declarations and definitions.
#[derive(Clone, Debug)]
pub struct Module {
    name: String,
    functions: SlotMap<FuncId, Function>,
    symbols: FxHashMap<String, FuncId>,
    order: Vec<FuncId>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Module {
            name: name.to_string(),
            functions: SlotMap::with_key(),
            symbols: FxHashMap::default(),
            order: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up a function by name.
    pub fn get_function(&self, name: &str) -> Option<FuncId> {
        self.symbols.get(name).copied()
    }

    /// Declare `name`, or return the existing function of that name.
    pub fn declare_function(&mut self, name: &str, params: &[String]) -> FuncId {
        if let Some(id) = self.get_function(name) {
            return id;
        }
        let id = self.functions.insert(Function::new(name, params));
        self.symbols.insert(name.to_string(), id);
        self.order.push(id);
        id
    }

    /// Remove a function entirely. Calls to it elsewhere in the module dangle.
    pub fn erase_function(&mut self, id: FuncId) {
        if let Some(func) = self.functions.remove(id) {
            self.symbols.remove(func.name());
            self.order.retain(|f| *f != id);
        }
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.functions[id]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id]
    }

    pub fn contains(&self, id: FuncId) -> bool {
        self.functions.contains_key(id)
    }

    /// Functions in the order they were first declared.
    pub fn functions(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.order.iter().copied()
    }

    /// Functions that have a body.
    pub fn definitions(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.functions()
            .filter(|id| !self.functions[*id].is_declaration())
    }

    /// The module as text.
    pub fn dump(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "; ModuleID = '{}'", self.name)?;
        for id in self.functions() {
            write!(f, "\n\n{}", id.disp(self))?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::Module;

    #[test]
    fn declare_is_idempotent_and_erase_forgets() {
        let mut module = Module::new("m");
        let params = vec!["x".to_string()];
        let foo = module.declare_function("foo", &params);
        assert_eq!(module.declare_function("foo", &[]), foo);
        assert_eq!(module.func(foo).arity(), 1);
        assert!(module.func(foo).is_declaration());

        module.erase_function(foo);
        assert!(module.get_function("foo").is_none());
        assert!(module.is_empty());
        assert_ne!(module.declare_function("foo", &[]), foo);
    }
}
