//! Translate the AST into SSA IR.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{
    ast::{Expr, Function, Prototype},
    basic_block::Block,
    codegen_err, codegen_error,
    inserter::Inserter,
    instruction::{FloatCC, Inst},
    location::Location,
    module::{FuncId, Module},
    result::Result,
    value::Value,
};

#[derive(Debug, Error)]
pub enum CodegenErr {
    #[error("unknown variable name {0}")]
    UnknownVariable(String),
    #[error("Unknown function referenced: {0}")]
    UnknownFunction(String),
    #[error("Incorrect # arguments passed to {callee}: expected {expected}, got {found}")]
    IncorrectArgCount {
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("invalid binary operator {0}")]
    InvalidBinaryOperator(char),
    #[error("Function cannot be redefined: {0}")]
    Redefinition(String),
    #[error("{name} takes {found} parameters but its declaration takes {expected}")]
    SignatureMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// The last seen signature of every function, across all modules of a session.
#[derive(Clone, Debug, Default)]
pub struct PrototypeRegistry {
    protos: FxHashMap<String, Prototype>,
}

impl PrototypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `proto`, replacing any earlier signature of the same name.
    pub fn insert(&mut self, proto: Prototype) {
        self.protos.insert(proto.name.clone(), proto);
    }

    /// Put back a signature saved with [get](Self::get), or forget `name`
    /// if there was none.
    pub fn restore(&mut self, name: &str, previous: Option<Prototype>) {
        match previous {
            Some(proto) => self.insert(proto),
            None => {
                self.protos.remove(name);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Prototype> {
        self.protos.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.protos.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.protos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protos.is_empty()
    }
}

/// Generates code for one function (or prototype) at a time into a [Module].
pub struct CodeGen<'a> {
    module: &'a mut Module,
    protos: &'a mut PrototypeRegistry,
    inserter: Inserter,
    named_values: FxHashMap<String, Value>,
    loc: Location,
}

impl<'a> CodeGen<'a> {
    pub fn new(module: &'a mut Module, protos: &'a mut PrototypeRegistry) -> Self {
        CodeGen {
            module,
            protos,
            inserter: Inserter::new(),
            named_values: FxHashMap::default(),
            loc: Location::Unknown,
        }
    }

    /// Find `name` in the module, or declare it from its registered prototype.
    pub fn get_function(&mut self, name: &str) -> Option<FuncId> {
        if let Some(id) = self.module.get_function(name) {
            return Some(id);
        }
        let proto = self.protos.get(name)?;
        Some(self.module.declare_function(&proto.name, &proto.params))
    }

    /// Declare `proto` in the module and record it in the registry.
    /// A function of the same name already in the module must agree on arity.
    pub fn codegen_prototype(&mut self, proto: &Prototype) -> Result<FuncId> {
        self.loc = proto.loc;
        if let Some(id) = self.module.get_function(&proto.name) {
            let declared_arity = self.module.func(id).arity();
            if declared_arity != proto.arity() {
                return codegen_err!(
                    self.loc,
                    CodegenErr::SignatureMismatch {
                        name: proto.name.clone(),
                        expected: declared_arity,
                        found: proto.arity(),
                    }
                );
            }
        }
        let id = self.module.declare_function(&proto.name, &proto.params);
        self.protos.insert(proto.clone());
        Ok(id)
    }

    /// Generate a definition of `function`. On failure, nothing of it is left
    /// in the module, except for a declaration that existed before, and the
    /// registry keeps the signature it had.
    pub fn codegen_function(&mut self, function: &Function) -> Result<FuncId> {
        let proto = &function.proto;
        self.loc = proto.loc;
        let previous = self.protos.get(&proto.name).cloned();
        self.protos.insert(proto.clone());
        let result = self.codegen_definition(function);
        if result.is_err() {
            self.protos.restore(&proto.name, previous);
        }
        result
    }

    fn codegen_definition(&mut self, function: &Function) -> Result<FuncId> {
        let proto = &function.proto;
        let existed = self.module.get_function(&proto.name).is_some();
        let Some(func) = self.get_function(&proto.name) else {
            return codegen_err!(self.loc, CodegenErr::UnknownFunction(proto.name.clone()));
        };

        if !self.module.func(func).is_declaration() {
            return codegen_err!(self.loc, CodegenErr::Redefinition(proto.name.clone()));
        }
        let declared_arity = self.module.func(func).arity();
        if declared_arity != proto.arity() {
            return codegen_err!(
                self.loc,
                CodegenErr::SignatureMismatch {
                    name: proto.name.clone(),
                    expected: declared_arity,
                    found: proto.arity(),
                }
            );
        }
        // The definition names the parameters, not an earlier extern.
        let declared_params = self.module.func(func).params().to_vec();
        self.module.func_mut(func).set_params(&proto.params);

        match self.codegen_body(func, function) {
            Ok(()) => Ok(func),
            Err(err) => {
                if existed {
                    let func = self.module.func_mut(func);
                    func.clear_body();
                    func.set_params(&declared_params);
                } else {
                    self.module.erase_function(func);
                }
                self.inserter = Inserter::new();
                Err(err)
            }
        }
    }

    fn codegen_body(&mut self, func: FuncId, function: &Function) -> Result<()> {
        let entry = self.inserter.create_block(self.module, func, "entry");
        self.inserter.append_block(self.module, func, entry);
        self.inserter.position_at_end(func, entry);

        self.named_values.clear();
        for (idx, param) in function.proto.params.iter().enumerate() {
            if self
                .named_values
                .insert(param.clone(), Value::Param(idx))
                .is_some()
            {
                log::warn!(
                    "{}: parameter {} of {} shadows an earlier one",
                    self.loc,
                    param,
                    function.proto.name
                );
            }
        }

        let ret = self.codegen_expr(&function.body)?;
        self.inserter.build_ret(self.module, ret);
        self.inserter = Inserter::new();

        log::debug!("generated:\n{}", func.disp(self.module));
        Ok(())
    }

    pub fn codegen_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::double(*n)),
            Expr::Variable(name) => match self.named_values.get(name) {
                Some(v) => Ok(*v),
                None => codegen_err!(self.loc, CodegenErr::UnknownVariable(name.clone())),
            },
            Expr::Binary { op, lhs, rhs } => {
                let l = self.codegen_expr(lhs)?;
                let r = self.codegen_expr(rhs)?;
                let m = &mut *self.module;
                Ok(match op {
                    '+' => self.inserter.build_fadd(m, l, r, "addtmp"),
                    '-' => self.inserter.build_fsub(m, l, r, "subtmp"),
                    '*' => self.inserter.build_fmul(m, l, r, "multmp"),
                    '<' => {
                        let cmp = self.inserter.build_fcmp(m, FloatCC::Ult, l, r, "cmptmp");
                        self.inserter.build_uitofp(m, cmp, "booltmp")
                    }
                    _ => {
                        return codegen_err!(self.loc, CodegenErr::InvalidBinaryOperator(*op));
                    }
                })
            }
            Expr::Call { callee, args } => {
                let Some(callee_id) = self.get_function(callee) else {
                    return codegen_err!(self.loc, CodegenErr::UnknownFunction(callee.clone()));
                };
                let expected = self.module.func(callee_id).arity();
                if expected != args.len() {
                    return codegen_err!(
                        self.loc,
                        CodegenErr::IncorrectArgCount {
                            callee: callee.clone(),
                            expected,
                            found: args.len(),
                        }
                    );
                }
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.codegen_expr(arg)?);
                }
                Ok(self
                    .inserter
                    .build_call(self.module, callee_id, arg_values, "calltmp"))
            }
            Expr::If { cond, then, else_ } => self.codegen_if(cond, then, else_),
            Expr::For {
                var,
                start,
                end,
                step,
                body,
            } => self.codegen_for(var, start, end, step.as_deref(), body),
        }
    }

    fn current_func(&self) -> Result<FuncId> {
        self.inserter
            .insertion_func()
            .ok_or_else(|| codegen_error!(self.loc, "no function is being generated"))
    }

    fn current_block(&self) -> Result<Block> {
        self.inserter
            .insertion_block()
            .ok_or_else(|| codegen_error!(self.loc, "no block is being generated"))
    }

    fn codegen_if(&mut self, cond: &Expr, then: &Expr, else_: &Expr) -> Result<Value> {
        let cond = self.codegen_expr(cond)?;
        let cond =
            self.inserter
                .build_fcmp(self.module, FloatCC::One, cond, Value::double(0.0), "ifcond");

        let func = self.current_func()?;
        let then_bb = self.inserter.create_block(self.module, func, "then");
        self.inserter.append_block(self.module, func, then_bb);
        let else_bb = self.inserter.create_block(self.module, func, "else");
        let merge_bb = self.inserter.create_block(self.module, func, "ifcont");
        self.inserter
            .build_cond_br(self.module, cond, then_bb, else_bb);

        self.inserter.position_at_end(func, then_bb);
        let then_v = self.codegen_expr(then)?;
        self.inserter.build_br(self.module, merge_bb);
        // Generating the arm may have moved us to another block.
        let then_end = self.current_block()?;

        self.inserter.append_block(self.module, func, else_bb);
        self.inserter.position_at_end(func, else_bb);
        let else_v = self.codegen_expr(else_)?;
        self.inserter.build_br(self.module, merge_bb);
        let else_end = self.current_block()?;

        self.inserter.append_block(self.module, func, merge_bb);
        self.inserter.position_at_end(func, merge_bb);
        let phi = self.inserter.build_phi(
            self.module,
            vec![(then_v, then_end), (else_v, else_end)],
            "iftmp",
        );
        Ok(Value::Inst(phi))
    }

    fn codegen_for(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &Expr,
    ) -> Result<Value> {
        let start = self.codegen_expr(start)?;

        let func = self.current_func()?;
        let preheader = self.current_block()?;
        let loop_bb = self.inserter.create_block(self.module, func, "loop");
        self.inserter.append_block(self.module, func, loop_bb);
        self.inserter.build_br(self.module, loop_bb);

        self.inserter.position_at_end(func, loop_bb);
        let phi = self
            .inserter
            .build_phi(self.module, vec![(start, preheader)], var);
        let shadowed = self.named_values.insert(var.to_string(), Value::Inst(phi));

        let result = self.codegen_loop_tail(func, loop_bb, phi, end, step, body);

        match shadowed {
            Some(old) => self.named_values.insert(var.to_string(), old),
            None => self.named_values.remove(var),
        };
        result?;
        Ok(Value::double(0.0))
    }

    fn codegen_loop_tail(
        &mut self,
        func: FuncId,
        loop_bb: Block,
        phi: Inst,
        end: &Expr,
        step: Option<&Expr>,
        body: &Expr,
    ) -> Result<()> {
        // The body's value is discarded.
        self.codegen_expr(body)?;

        let step = match step {
            Some(step) => self.codegen_expr(step)?,
            None => Value::double(1.0),
        };
        let next = self
            .inserter
            .build_fadd(self.module, Value::Inst(phi), step, "nextvar");

        let end = self.codegen_expr(end)?;
        let end =
            self.inserter
                .build_fcmp(self.module, FloatCC::One, end, Value::double(0.0), "loopcond");

        let loop_end = self.current_block()?;
        let after_bb = self.inserter.create_block(self.module, func, "afterloop");
        self.inserter.append_block(self.module, func, after_bb);
        self.inserter
            .build_cond_br(self.module, end, loop_bb, after_bb);
        self.inserter.add_incoming(self.module, phi, next, loop_end);
        self.inserter.position_at_end(func, after_bb);
        Ok(())
    }
}
