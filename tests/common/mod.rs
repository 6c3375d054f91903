#![allow(dead_code)]

use kaleidoscope::{
    backend::{ExecutionBackend, Symbol},
    backend_err,
    basic_block::Block,
    instruction::{BinaryOp, FloatCC, Inst, InstKind},
    link_err,
    location::Location,
    module::{FuncId, Module},
    result::Result,
    session::{Outcome, Session},
    value::Value,
};
use rustc_hash::{FxHashMap, FxHashSet};

/// Initialize the logger for tests
pub fn init_env_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const MAX_CALL_DEPTH: usize = 256;

fn binary(op: BinaryOp, lhs: f64, rhs: f64) -> f64 {
    match op {
        BinaryOp::FAdd => lhs + rhs,
        BinaryOp::FSub => lhs - rhs,
        BinaryOp::FMul => lhs * rhs,
    }
}

fn fcmp(cc: FloatCC, lhs: f64, rhs: f64) -> bool {
    let unordered = lhs.is_nan() || rhs.is_nan();
    match cc {
        FloatCC::Ult => unordered || lhs < rhs,
        FloatCC::One => !unordered && lhs != rhs,
    }
}

/// An [ExecutionBackend] that interprets the IR it is given.
/// It keeps every submitted unit's text and counts calls to `count(x)`,
/// a host function that returns its argument.
#[derive(Default)]
pub struct Interpreter {
    units: FxHashMap<usize, Module>,
    bindings: FxHashMap<String, (usize, FuncId)>,
    next_unit: usize,
    /// Text of every unit submitted, in order.
    pub submitted: Vec<String>,
    pub count_calls: std::cell::Cell<usize>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_units(&self) -> usize {
        self.units.len()
    }

    fn is_host(name: &str) -> bool {
        name == "count"
    }

    fn arity(&self, name: &str) -> Option<usize> {
        if Self::is_host(name) {
            return Some(1);
        }
        let &(unit, func) = self.bindings.get(name)?;
        Some(self.units[&unit].func(func).arity())
    }

    /// The first name reachable from `name` that nothing defines.
    fn unresolved(&self, name: &str) -> Option<String> {
        let mut seen = FxHashSet::default();
        let mut stack = vec![name.to_string()];
        while let Some(name) = stack.pop() {
            if Self::is_host(&name) || !seen.insert(name.clone()) {
                continue;
            }
            let Some(&(unit, id)) = self.bindings.get(&name) else {
                return Some(name);
            };
            let module = &self.units[&unit];
            let func = module.func(id);
            for &block in func.blocks() {
                for &inst in &func.block(block).insts {
                    if let InstKind::Call { callee, .. } = &func.inst(inst).kind {
                        stack.push(module.func(*callee).name().to_string());
                    }
                }
            }
        }
        None
    }

    fn call_by_name(&self, name: &str, args: &[f64], depth: usize) -> Result<f64> {
        if Self::is_host(name) {
            self.count_calls.set(self.count_calls.get() + 1);
            return Ok(args[0]);
        }
        let Some(&(unit, func)) = self.bindings.get(name) else {
            return link_err!(Location::Unknown, "symbol {} is not bound", name);
        };
        if depth > MAX_CALL_DEPTH {
            return backend_err!(Location::Unknown, "call depth exceeded in {}", name);
        }
        self.eval(&self.units[&unit], func, args, depth + 1)
    }

    fn eval(&self, module: &Module, id: FuncId, args: &[f64], depth: usize) -> Result<f64> {
        let func = module.func(id);
        let mut values: FxHashMap<Inst, f64> = FxHashMap::default();
        let get = |values: &FxHashMap<Inst, f64>, v: Value| -> f64 {
            match v {
                Value::Param(idx) => args[idx],
                Value::Inst(inst) => values[&inst],
                Value::Const(_) => v
                    .as_f64()
                    .unwrap_or_else(|| if v.as_bool() == Some(true) { 1.0 } else { 0.0 }),
            }
        };

        let Some(mut block) = func.entry_block() else {
            return backend_err!(Location::Unknown, "{} has no body", func.name());
        };
        let mut prev: Option<Block> = None;
        loop {
            let insts = func.block(block).insts.clone();
            // Phis read their inputs all at once, on entry to the block.
            let mut phi_values = vec![];
            for &inst in &insts {
                if let InstKind::Phi { incoming } = &func.inst(inst).kind {
                    let (v, _) = incoming
                        .iter()
                        .find(|(_, b)| Some(*b) == prev)
                        .expect("phi without incoming value for predecessor");
                    phi_values.push((inst, get(&values, *v)));
                }
            }
            values.extend(phi_values);

            for inst in insts {
                let value = match &func.inst(inst).kind {
                    InstKind::Phi { .. } => continue,
                    InstKind::Binary { op, lhs, rhs } => {
                        binary(*op, get(&values, *lhs), get(&values, *rhs))
                    }
                    InstKind::FCmp { cc, lhs, rhs } => {
                        if fcmp(*cc, get(&values, *lhs), get(&values, *rhs)) {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    InstKind::UIToFP { arg } => get(&values, *arg),
                    InstKind::Call { callee, args } => {
                        let args: Vec<_> = args.iter().map(|a| get(&values, *a)).collect();
                        self.call_by_name(module.func(*callee).name(), &args, depth)?
                    }
                    InstKind::Br { dest } => {
                        prev = Some(block);
                        block = *dest;
                        break;
                    }
                    InstKind::CondBr {
                        cond,
                        then_dest,
                        else_dest,
                    } => {
                        prev = Some(block);
                        block = if get(&values, *cond) != 0.0 {
                            *then_dest
                        } else {
                            *else_dest
                        };
                        break;
                    }
                    InstKind::Ret { value } => return Ok(get(&values, *value)),
                };
                values.insert(inst, value);
            }
        }
    }
}

impl ExecutionBackend for Interpreter {
    type Handle = usize;

    fn submit(&mut self, unit: Module) -> Result<usize> {
        // Names nothing defines yet are reported by `lookup`.
        for id in unit.functions() {
            let func = unit.func(id);
            match self.arity(func.name()) {
                Some(arity) if arity != func.arity() => {
                    return link_err!(
                        Location::Unknown,
                        "symbol {} takes {} arguments, but is used with {}",
                        func.name(),
                        arity,
                        func.arity()
                    );
                }
                _ => (),
            }
        }

        let handle = self.next_unit;
        self.next_unit += 1;
        for id in unit.definitions() {
            self.bindings
                .insert(unit.func(id).name().to_string(), (handle, id));
        }
        self.submitted.push(unit.dump());
        self.units.insert(handle, unit);
        Ok(handle)
    }

    fn lookup(&self, name: &str) -> Result<Symbol> {
        let Some(&(unit, func)) = self.bindings.get(name) else {
            return link_err!(Location::Unknown, "symbol {} is not bound", name);
        };
        if let Some(missing) = self.unresolved(name) {
            return link_err!(Location::Unknown, "symbol {} is not defined", missing);
        }
        Ok(Symbol {
            name: name.to_string(),
            address: 0,
            arity: self.units[&unit].func(func).arity(),
        })
    }

    fn call(&self, name: &str, args: &[f64]) -> Result<f64> {
        let symbol = self.lookup(name)?;
        if symbol.arity != args.len() {
            return backend_err!(
                Location::Unknown,
                "{} takes {} arguments, got {}",
                name,
                symbol.arity,
                args.len()
            );
        }
        self.call_by_name(name, args, 0)
    }

    fn revoke(&mut self, handle: usize) -> Result<()> {
        self.bindings.retain(|_, (unit, _)| *unit != handle);
        self.units.remove(&handle);
        Ok(())
    }
}

/// A session over an [Interpreter].
pub fn interp_session() -> Session<Interpreter> {
    Session::new(Interpreter::new())
}

/// Run `src`, expecting every item to succeed, and return the evaluated values.
pub fn eval_all(session: &mut Session<Interpreter>, src: &str) -> Vec<f64> {
    session
        .run_source(src)
        .into_iter()
        .filter_map(|outcome| match outcome {
            Ok(Outcome::Evaluated { value, .. }) => Some(value),
            Ok(_) => None,
            Err(err) => panic!("unexpected error: {}", err),
        })
        .collect()
}
