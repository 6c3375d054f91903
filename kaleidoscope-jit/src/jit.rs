//! An [ExecutionBackend] that compiles units to machine code with Cranelift.
//!
//! Every submitted unit gets its own [JITModule], so that its code can be
//! freed independently of the others. Definitions are reached only through
//! the slots of the [SymbolTable]: binding a name stores the address of its
//! code in the slot, and compiled callers load from the slot on every call.
//!
//! Linking is lazy. A unit may call names that nothing defines yet, and
//! [lookup](ExecutionBackend::lookup) fails with [LinkErr::Undefined] for as
//! long as any of them is reachable from the name looked up.

use std::mem;

use cranelift_codegen::{
    ir::UserFuncName,
    isa::{CallConv, OwnedTargetIsa},
    settings::{self, Configurable},
    verifier::verify_function,
    Context,
};
use cranelift_frontend::FunctionBuilderContext;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module as _};
use kaleidoscope::{
    backend::{ExecutionBackend, Symbol},
    backend_err, backend_error,
    instruction::InstKind,
    link_err,
    location::Location,
    module::{FuncId, Module},
    result::Result,
    verify_err,
};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{
    lower,
    symbols::{Binding, Owner, SymbolTable, UnitHandle},
};

#[derive(Debug, Error)]
pub enum LinkErr {
    #[error("symbol {0} is not defined")]
    Undefined(String),
    #[error("symbol {name} takes {expected} arguments, but is used with {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("symbol {0} is not bound")]
    Unbound(String),
}

/// Code generation settings of a [CraneliftJit].
#[derive(Clone, Copy, Debug)]
pub struct JitConfig {
    /// Let Cranelift optimize the machine code.
    pub optimize: bool,
    /// Run Cranelift's IR verifier on every lowered function.
    pub verify: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        JitConfig {
            optimize: true,
            verify: true,
        }
    }
}

pub struct CraneliftJit {
    config: JitConfig,
    isa: OwnedTargetIsa,
    symbols: SymbolTable,
    units: FxHashMap<UnitHandle, JITModule>,
    next_unit: usize,
    fb_ctx: FunctionBuilderContext,
}

/// Build an ISA for the host machine.
fn host_isa(config: JitConfig) -> Result<OwnedTargetIsa> {
    let mut flag_builder = settings::builder();
    let flags = [
        ("opt_level", if config.optimize { "speed" } else { "none" }),
        // Verification runs in define_unit, where its errors keep their kind.
        ("enable_verifier", "false"),
    ];
    for (name, value) in flags {
        flag_builder
            .set(name, value)
            .map_err(|e| backend_error!(Location::Unknown, "{}", e))?;
    }
    let isa_builder = cranelift_native::builder()
        .map_err(|e| backend_error!(Location::Unknown, "host machine is not supported: {}", e))?;
    isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(|e| backend_error!(Location::Unknown, "{}", e))
}

impl CraneliftJit {
    pub fn new() -> Result<Self> {
        Self::with_config(JitConfig::default())
    }

    pub fn with_config(config: JitConfig) -> Result<Self> {
        let isa = host_isa(config)?;
        log::info!("compiling for {}", isa.triple());
        Ok(CraneliftJit {
            config,
            isa,
            symbols: SymbolTable::new(),
            units: FxHashMap::default(),
            next_unit: 0,
            fb_ctx: FunctionBuilderContext::new(),
        })
    }

    /// Number of units whose code is still in memory.
    pub fn live_units(&self) -> usize {
        self.units.len()
    }

    fn call_conv(&self) -> CallConv {
        self.isa.default_call_conv()
    }

    /// Check that every function `unit` declares or defines agrees on arity
    /// with the name's slot, if it has one. Names nothing defines yet are
    /// left for [lookup](ExecutionBackend::lookup) to report.
    fn link_check(&self, unit: &Module) -> Result<()> {
        for id in unit.functions() {
            let func = unit.func(id);
            match self.symbols.arity(func.name()) {
                Some(expected) if expected != func.arity() => {
                    return link_err!(
                        Location::Unknown,
                        LinkErr::ArityMismatch {
                            name: func.name().to_string(),
                            expected,
                            found: func.arity(),
                        }
                    );
                }
                Some(_) => (),
                None if func.is_declaration() => {
                    log::debug!("{} is declared but not defined yet", func.name());
                }
                None => (),
            }
        }
        Ok(())
    }

    /// Compile every definition of `unit` into `jit`, returning the
    /// addresses of their code.
    fn define_unit(&mut self, jit: &mut JITModule, unit: &Module) -> Result<Vec<(FuncId, usize)>> {
        let call_conv = self.call_conv();
        let pointer_type = self.isa.pointer_type();
        let mut ctx: Context = jit.make_context();
        let mut defined = vec![];

        for id in unit.definitions() {
            let func = unit.func(id);
            let sig = lower::signature(call_conv, func.arity());
            let clif_id = jit
                .declare_function(func.name(), Linkage::Export, &sig)
                .map_err(|e| backend_error!(Location::Unknown, "{}", e))?;
            ctx.func.signature = sig;
            ctx.func.name = UserFuncName::user(0, clif_id.as_u32());

            lower::lower_function(
                unit,
                id,
                &mut ctx.func,
                &mut self.fb_ctx,
                &mut self.symbols,
                pointer_type,
            )?;
            log::trace!("lowered @{}:\n{}", func.name(), ctx.func.display());
            if self.config.verify {
                verify_function(&ctx.func, &*self.isa)
                    .or_else(|errors| verify_err!(Location::Unknown, "@{}: {}", func.name(), errors))?;
            }

            jit.define_function(clif_id, &mut ctx)
                .map_err(|e| backend_error!(Location::Unknown, "compiling @{}: {}", func.name(), e))?;
            jit.clear_context(&mut ctx);
            defined.push((id, clif_id));
        }

        jit.finalize_definitions()
            .map_err(|e| backend_error!(Location::Unknown, "{}", e))?;
        Ok(defined
            .into_iter()
            .map(|(id, clif_id)| (id, jit.get_finalized_function(clif_id) as usize))
            .collect())
    }

    /// Release the code of `unit`.
    fn free_unit(&mut self, unit: UnitHandle) {
        if let Some(jit) = self.units.remove(&unit) {
            log::info!("freeing the code of unit {}", unit.0);
            // SAFETY: no slot points into this unit's code any more, and
            // compiled code is only ever reached through slots.
            unsafe { jit.free_memory() };
        }
    }
}

impl ExecutionBackend for CraneliftJit {
    type Handle = UnitHandle;

    fn submit(&mut self, unit: Module) -> Result<UnitHandle> {
        self.link_check(&unit)?;

        let handle = UnitHandle(self.next_unit);
        self.next_unit += 1;
        let builder = JITBuilder::with_isa(self.isa.clone(), cranelift_module::default_libcall_names());
        let mut jit = JITModule::new(builder);
        let defined = match self.define_unit(&mut jit, &unit) {
            Ok(defined) => defined,
            Err(err) => {
                // SAFETY: nothing was bound to code of this module.
                unsafe { jit.free_memory() };
                return Err(err);
            }
        };
        self.units.insert(handle, jit);

        let mut displaced = vec![];
        for (id, address) in defined {
            let func = unit.func(id);
            let binding = Binding {
                address,
                arity: func.arity(),
                owner: Owner::Unit(handle),
                callees: callees(&unit, id),
            };
            if let Some(Binding {
                owner: Owner::Unit(old),
                ..
            }) = self.symbols.bind(func.name(), binding)
            {
                displaced.push(old);
            }
        }
        for old in displaced {
            if !self.symbols.owns_any(old) {
                self.free_unit(old);
            }
        }
        log::info!(
            "submitted unit {} of {} definition(s)",
            handle.0,
            unit.definitions().count()
        );
        Ok(handle)
    }

    fn lookup(&self, name: &str) -> Result<Symbol> {
        let Some(binding) = self.symbols.binding(name) else {
            return link_err!(Location::Unknown, LinkErr::Unbound(name.to_string()));
        };
        if let Some(missing) = self.symbols.unresolved(name) {
            return link_err!(Location::Unknown, LinkErr::Undefined(missing));
        }
        Ok(Symbol {
            name: name.to_string(),
            address: binding.address,
            arity: binding.arity,
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
        let code = symbol.address as *const u8;
        // SAFETY: `code` is bound to `name`, so it is live code taking
        // `symbol.arity` doubles and returning a double, with the host's
        // default calling convention.
        let value = unsafe {
            match *args {
                [] => mem::transmute::<*const u8, extern "C" fn() -> f64>(code)(),
                [a] => mem::transmute::<*const u8, extern "C" fn(f64) -> f64>(code)(a),
                [a, b] => mem::transmute::<*const u8, extern "C" fn(f64, f64) -> f64>(code)(a, b),
                [a, b, c] => {
                    mem::transmute::<*const u8, extern "C" fn(f64, f64, f64) -> f64>(code)(a, b, c)
                }
                [a, b, c, d] => mem::transmute::<
                    *const u8,
                    extern "C" fn(f64, f64, f64, f64) -> f64,
                >(code)(a, b, c, d),
                [a, b, c, d, e] => mem::transmute::<
                    *const u8,
                    extern "C" fn(f64, f64, f64, f64, f64) -> f64,
                >(code)(a, b, c, d, e),
                [a, b, c, d, e, f] => mem::transmute::<
                    *const u8,
                    extern "C" fn(f64, f64, f64, f64, f64, f64) -> f64,
                >(code)(a, b, c, d, e, f),
                _ => {
                    return backend_err!(
                        Location::Unknown,
                        "cannot call {} with {} arguments from the host",
                        name,
                        args.len()
                    )
                }
            }
        };
        Ok(value)
    }

    fn revoke(&mut self, handle: UnitHandle) -> Result<()> {
        let unbound = self.symbols.unbind_unit(handle);
        log::info!("revoking unit {}, unbinding {:?}", handle.0, unbound);
        self.free_unit(handle);
        Ok(())
    }
}

/// Names called from the definition `id`, without duplicates.
fn callees(unit: &Module, id: FuncId) -> Vec<String> {
    let func = unit.func(id);
    let mut names: Vec<String> = vec![];
    for &block in func.blocks() {
        for &inst in &func.block(block).insts {
            if let InstKind::Call { callee, .. } = &func.inst(inst).kind {
                let name = unit.func(*callee).name();
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
    }
    names
}

impl Drop for CraneliftJit {
    fn drop(&mut self) {
        for (_, jit) in self.units.drain() {
            // SAFETY: the symbol table, and with it every way of reaching
            // this code, goes away with `self`.
            unsafe { jit.free_memory() };
        }
    }
}
