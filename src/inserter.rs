//! A utility for inserting instructions at the end of a block.
//! Similar in spirit to LLVM's IRBuilder.

use crate::{
    basic_block::Block,
    instruction::{BinaryOp, FloatCC, Inst, InstKind},
    module::{FuncId, Module},
    value::Value,
};

/// Where an [Inserter] places new instructions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InsertionPoint {
    #[default]
    Unset,
    AtBlockEnd(FuncId, Block),
}

/// Appends instructions at its [InsertionPoint]. It does not borrow the
/// [Module]; every operation takes the module it works on.
#[derive(Clone, Copy, Debug, Default)]
pub struct Inserter {
    point: InsertionPoint,
}

impl Inserter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_insertion_point(&mut self, point: InsertionPoint) {
        self.point = point;
    }

    pub fn get_insertion_point(&self) -> InsertionPoint {
        self.point
    }

    pub fn position_at_end(&mut self, func: FuncId, block: Block) {
        self.point = InsertionPoint::AtBlockEnd(func, block);
    }

    /// The block new instructions go into.
    pub fn insertion_block(&self) -> Option<Block> {
        match self.point {
            InsertionPoint::AtBlockEnd(_, block) => Some(block),
            InsertionPoint::Unset => None,
        }
    }

    /// The function new instructions go into.
    pub fn insertion_func(&self) -> Option<FuncId> {
        match self.point {
            InsertionPoint::AtBlockEnd(func, _) => Some(func),
            InsertionPoint::Unset => None,
        }
    }

    /// Create a block in `func` without placing it in the layout yet.
    pub fn create_block(&self, module: &mut Module, func: FuncId, label: &str) -> Block {
        module.func_mut(func).create_block(label)
    }

    /// Place `block` at the end of the layout of `func`.
    pub fn append_block(&self, module: &mut Module, func: FuncId, block: Block) {
        module.func_mut(func).append_block(block);
    }

    /// Append an instruction at the insertion point.
    ///
    /// # Panics
    /// If the insertion point is [InsertionPoint::Unset].
    pub fn append_inst(&mut self, module: &mut Module, kind: InstKind, name: &str) -> Inst {
        let InsertionPoint::AtBlockEnd(func, block) = self.point else {
            panic!("Insertion point not set");
        };
        module.func_mut(func).append_inst(block, kind, name)
    }

    pub fn build_binary(
        &mut self,
        module: &mut Module,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> Value {
        Value::Inst(self.append_inst(module, InstKind::Binary { op, lhs, rhs }, name))
    }

    pub fn build_fadd(&mut self, module: &mut Module, lhs: Value, rhs: Value, name: &str) -> Value {
        self.build_binary(module, BinaryOp::FAdd, lhs, rhs, name)
    }

    pub fn build_fsub(&mut self, module: &mut Module, lhs: Value, rhs: Value, name: &str) -> Value {
        self.build_binary(module, BinaryOp::FSub, lhs, rhs, name)
    }

    pub fn build_fmul(&mut self, module: &mut Module, lhs: Value, rhs: Value, name: &str) -> Value {
        self.build_binary(module, BinaryOp::FMul, lhs, rhs, name)
    }

    pub fn build_fcmp(
        &mut self,
        module: &mut Module,
        cc: FloatCC,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> Value {
        Value::Inst(self.append_inst(module, InstKind::FCmp { cc, lhs, rhs }, name))
    }

    pub fn build_uitofp(&mut self, module: &mut Module, arg: Value, name: &str) -> Value {
        Value::Inst(self.append_inst(module, InstKind::UIToFP { arg }, name))
    }

    pub fn build_call(
        &mut self,
        module: &mut Module,
        callee: FuncId,
        args: Vec<Value>,
        name: &str,
    ) -> Value {
        Value::Inst(self.append_inst(module, InstKind::Call { callee, args }, name))
    }

    /// A phi whose incoming list may be completed with [Self::add_incoming].
    pub fn build_phi(
        &mut self,
        module: &mut Module,
        incoming: Vec<(Value, Block)>,
        name: &str,
    ) -> Inst {
        self.append_inst(module, InstKind::Phi { incoming }, name)
    }

    /// Add an incoming `(value, pred)` pair to `phi`, in the function being built.
    pub fn add_incoming(&self, module: &mut Module, phi: Inst, value: Value, pred: Block) {
        let Some(func) = self.insertion_func() else {
            return;
        };
        if let InstKind::Phi { incoming } = &mut module.func_mut(func).inst_mut(phi).kind {
            incoming.push((value, pred));
        }
    }

    pub fn build_br(&mut self, module: &mut Module, dest: Block) -> Inst {
        self.append_inst(module, InstKind::Br { dest }, "")
    }

    pub fn build_cond_br(
        &mut self,
        module: &mut Module,
        cond: Value,
        then_dest: Block,
        else_dest: Block,
    ) -> Inst {
        let kind = InstKind::CondBr {
            cond,
            then_dest,
            else_dest,
        };
        self.append_inst(module, kind, "")
    }

    pub fn build_ret(&mut self, module: &mut Module, value: Value) -> Inst {
        self.append_inst(module, InstKind::Ret { value }, "")
    }
}
