//! Global symbol bindings of the JIT.
//!
//! Compiled code never calls another function directly. It loads the callee's
//! address from a slot owned by this table, so a name can be rebound to a new
//! definition, or unbound, without touching its callers.
//!
//! Callers may be compiled before their callees are. Such a name has a slot
//! but no binding, and whatever reaches it cannot be run until it is bound.

use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::host;

/// Identifies a unit submitted to the JIT.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnitHandle(pub(crate) usize);

/// Where the code bound to a name lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
    Host,
    Unit(UnitHandle),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub address: usize,
    pub arity: usize,
    pub owner: Owner,
    /// Names the bound code calls.
    pub callees: Vec<String>,
}

/// Holds the code address of a name. The arity is that of the first
/// reference, which every later binding and caller must agree with.
struct Slot {
    address: Box<AtomicUsize>,
    arity: usize,
}

extern "C" fn unbound() -> f64 {
    log::error!("call to a function that is no longer defined");
    f64::NAN
}

fn unbound_address() -> usize {
    let stub: extern "C" fn() -> f64 = unbound;
    stub as usize
}

pub struct SymbolTable {
    // Slot addresses are boxed so they stay fixed. They are never freed
    // while the table lives, as compiled code may still refer to them.
    slots: FxHashMap<String, Slot>,
    bindings: FxHashMap<String, Binding>,
}

impl SymbolTable {
    /// A table with every host function bound.
    pub fn new() -> Self {
        let mut table = SymbolTable {
            slots: FxHashMap::default(),
            bindings: FxHashMap::default(),
        };
        for h in host::host_functions() {
            table.bind(
                h.name,
                Binding {
                    address: h.func.address(),
                    arity: h.func.arity(),
                    owner: Owner::Host,
                    callees: vec![],
                },
            );
        }
        table
    }

    /// Address of the slot holding the code address of `name`. A new slot
    /// takes `arity`.
    pub fn slot_address(&mut self, name: &str, arity: usize) -> usize {
        let slot = self.slots.entry(name.to_string()).or_insert_with(|| Slot {
            address: Box::new(AtomicUsize::new(unbound_address())),
            arity,
        });
        &*slot.address as *const AtomicUsize as usize
    }

    /// The arity `name` was first referenced or bound with.
    pub fn arity(&self, name: &str) -> Option<usize> {
        self.slots.get(name).map(|slot| slot.arity)
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Bind `name`, returning what it was bound to before.
    pub fn bind(&mut self, name: &str, binding: Binding) -> Option<Binding> {
        self.slot_address(name, binding.arity);
        if let Some(slot) = self.slots.get(name) {
            slot.address.store(binding.address, Ordering::Release);
        }
        self.bindings.insert(name.to_string(), binding)
    }

    /// The first unbound name that calls from `name` can reach, if any.
    pub fn unresolved(&self, name: &str) -> Option<String> {
        let mut seen = FxHashSet::default();
        let mut stack = vec![name];
        while let Some(name) = stack.pop() {
            if !seen.insert(name) {
                continue;
            }
            match self.bindings.get(name) {
                Some(binding) => stack.extend(binding.callees.iter().rev().map(String::as_str)),
                None => return Some(name.to_string()),
            }
        }
        None
    }

    /// Unbind every name bound to code of `unit`. Returns the names.
    pub fn unbind_unit(&mut self, unit: UnitHandle) -> Vec<String> {
        let names: Vec<_> = self
            .bindings
            .iter()
            .filter(|(_, b)| b.owner == Owner::Unit(unit))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &names {
            self.bindings.remove(name);
            if let Some(slot) = self.slots.get(name) {
                slot.address.store(unbound_address(), Ordering::Release);
            }
        }
        names
    }

    /// Is any name still bound to code of `unit`?
    pub fn owns_any(&self, unit: UnitHandle) -> bool {
        self.bindings
            .values()
            .any(|b| b.owner == Owner::Unit(unit))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
