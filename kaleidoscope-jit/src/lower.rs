//! Lowering of IR functions to Cranelift IR.
//!
//! Phis become block parameters, and branches pass the incoming values
//! as block arguments. Blocks are lowered in layout order, in which code
//! generation places every definition before its uses. Calls load the
//! callee's address from its [SymbolTable] slot and call indirectly.

use cranelift_codegen::{
    ir::{self as clif, condcodes, types, AbiParam, InstBuilder, MemFlags},
    isa::CallConv,
};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use kaleidoscope::{
    backend_err, backend_error,
    basic_block::Block,
    function::Function,
    instruction::{BinaryOp, FloatCC, Inst, InstKind},
    location::Location,
    module::{FuncId, Module},
    result::Result,
    value::{Constant, Value},
};
use rustc_hash::FxHashMap;

use crate::symbols::SymbolTable;

/// The signature of a Kaleidoscope function taking `arity` doubles.
pub fn signature(call_conv: CallConv, arity: usize) -> clif::Signature {
    let mut sig = clif::Signature::new(call_conv);
    sig.params
        .extend(std::iter::repeat(AbiParam::new(types::F64)).take(arity));
    sig.returns.push(AbiParam::new(types::F64));
    sig
}

/// Lower the definition `id` of `module` into `clif_func`, whose signature
/// must already be set.
pub fn lower_function(
    module: &Module,
    id: FuncId,
    clif_func: &mut clif::Function,
    fb_ctx: &mut FunctionBuilderContext,
    symbols: &mut SymbolTable,
    pointer_type: clif::Type,
) -> Result<()> {
    let call_conv = clif_func.signature.call_conv;
    let mut lowering = FunctionLowering {
        module,
        func: module.func(id),
        builder: FunctionBuilder::new(clif_func, fb_ctx),
        symbols,
        pointer_type,
        call_conv,
        blocks: FxHashMap::default(),
        values: FxHashMap::default(),
        params: vec![],
        signatures: FxHashMap::default(),
    };
    lowering.lower()?;
    lowering.builder.seal_all_blocks();
    lowering.builder.finalize();
    Ok(())
}

struct FunctionLowering<'a> {
    module: &'a Module,
    func: &'a Function,
    builder: FunctionBuilder<'a>,
    symbols: &'a mut SymbolTable,
    pointer_type: clif::Type,
    call_conv: CallConv,
    blocks: FxHashMap<Block, clif::Block>,
    values: FxHashMap<Inst, clif::Value>,
    params: Vec<clif::Value>,
    // Imported call signatures, by arity.
    signatures: FxHashMap<usize, clif::SigRef>,
}

impl FunctionLowering<'_> {
    fn lower(&mut self) -> Result<()> {
        let func = self.func;
        let Some(entry) = func.entry_block() else {
            return backend_err!(Location::Unknown, "@{} has no body to compile", func.name());
        };
        for &block in func.blocks() {
            let clif_block = self.builder.create_block();
            if block == entry {
                self.builder
                    .append_block_params_for_function_params(clif_block);
            }
            for _ in func.phis(block) {
                self.builder.append_block_param(clif_block, types::F64);
            }
            self.blocks.insert(block, clif_block);
        }

        for &block in func.blocks() {
            let clif_block = self.blocks[&block];
            self.builder.switch_to_block(clif_block);
            let params = self.builder.block_params(clif_block).to_vec();
            if block == entry {
                self.params = params;
            } else {
                self.values.extend(func.phis(block).into_iter().zip(params));
            }
            for &inst in &func.block(block).insts {
                self.lower_inst(block, inst)?;
            }
        }
        Ok(())
    }

    fn lower_inst(&mut self, block: Block, inst: Inst) -> Result<()> {
        let func = self.func;
        let result = match &func.inst(inst).kind {
            InstKind::Phi { .. } => return Ok(()),
            InstKind::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = (self.value(*lhs)?, self.value(*rhs)?);
                let ins = self.builder.ins();
                match op {
                    BinaryOp::FAdd => ins.fadd(lhs, rhs),
                    BinaryOp::FSub => ins.fsub(lhs, rhs),
                    BinaryOp::FMul => ins.fmul(lhs, rhs),
                }
            }
            InstKind::FCmp { cc, lhs, rhs } => {
                let (lhs, rhs) = (self.value(*lhs)?, self.value(*rhs)?);
                let cc = match cc {
                    FloatCC::Ult => condcodes::FloatCC::UnorderedOrLessThan,
                    FloatCC::One => condcodes::FloatCC::OrderedNotEqual,
                };
                self.builder.ins().fcmp(cc, lhs, rhs)
            }
            InstKind::UIToFP { arg } => {
                let arg = self.value(*arg)?;
                let wide = self.builder.ins().uextend(types::I64, arg);
                self.builder.ins().fcvt_from_uint(types::F64, wide)
            }
            InstKind::Call { callee, args } => self.lower_call(*callee, args)?,
            InstKind::Br { dest } => {
                let args = self.branch_args(block, *dest)?;
                let dest = self.block(*dest)?;
                self.builder.ins().jump(dest, &args);
                return Ok(());
            }
            InstKind::CondBr {
                cond,
                then_dest,
                else_dest,
            } => {
                let cond = self.value(*cond)?;
                let then_args = self.branch_args(block, *then_dest)?;
                let else_args = self.branch_args(block, *else_dest)?;
                let (then_dest, else_dest) = (self.block(*then_dest)?, self.block(*else_dest)?);
                self.builder
                    .ins()
                    .brif(cond, then_dest, &then_args, else_dest, &else_args);
                return Ok(());
            }
            InstKind::Ret { value } => {
                let value = self.value(*value)?;
                self.builder.ins().return_(&[value]);
                return Ok(());
            }
        };
        self.values.insert(inst, result);
        Ok(())
    }

    fn lower_call(&mut self, callee: FuncId, args: &[Value]) -> Result<clif::Value> {
        if !self.module.contains(callee) {
            return backend_err!(
                Location::Unknown,
                "@{} calls a function outside its module",
                self.func.name()
            );
        }
        let slot = self.symbols.slot_address(self.module.func(callee).name(), args.len());
        let sig_ref = match self.signatures.get(&args.len()) {
            Some(sig_ref) => *sig_ref,
            None => {
                let sig_ref = self
                    .builder
                    .import_signature(signature(self.call_conv, args.len()));
                self.signatures.insert(args.len(), sig_ref);
                sig_ref
            }
        };
        let arg_values = args
            .iter()
            .map(|arg| self.value(*arg))
            .collect::<Result<Vec<_>>>()?;

        let slot = self.builder.ins().iconst(self.pointer_type, slot as i64);
        let target = self
            .builder
            .ins()
            .load(self.pointer_type, MemFlags::trusted(), slot, 0);
        let call = self.builder.ins().call_indirect(sig_ref, target, &arg_values);
        Ok(self.builder.inst_results(call)[0])
    }

    /// Values passed from `from` to the phis of `dest`.
    fn branch_args(&mut self, from: Block, dest: Block) -> Result<Vec<clif::Value>> {
        let func = self.func;
        func.phis(dest)
            .into_iter()
            .map(|phi| {
                let InstKind::Phi { incoming } = &func.inst(phi).kind else {
                    unreachable!("phis() only returns phis");
                };
                match incoming.iter().find(|(_, pred)| *pred == from) {
                    Some((value, _)) => self.value(*value),
                    None => backend_err!(
                        Location::Unknown,
                        "@{}: phi without a value for its predecessor",
                        func.name()
                    ),
                }
            })
            .collect()
    }

    fn block(&self, block: Block) -> Result<clif::Block> {
        self.blocks.get(&block).copied().ok_or_else(|| {
            backend_error!(
                Location::Unknown,
                "@{}: branch to a block outside the layout",
                self.func.name()
            )
        })
    }

    fn value(&mut self, value: Value) -> Result<clif::Value> {
        let lowered = match value {
            Value::Param(idx) => self.params.get(idx).copied(),
            Value::Inst(inst) => self.values.get(&inst).copied(),
            Value::Const(Constant::Double(d)) => Some(self.builder.ins().f64const(f64::from(d))),
            Value::Const(Constant::Bool(b)) => Some(self.builder.ins().iconst(types::I8, i64::from(b))),
        };
        lowered.ok_or_else(|| {
            backend_error!(
                Location::Unknown,
                "@{}: use of a value that has not been lowered",
                self.func.name()
            )
        })
    }
}
