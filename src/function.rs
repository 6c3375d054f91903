//! Functions: a signature and, for definitions, a body of basic blocks.

use slotmap::SlotMap;

use crate::{
    basic_block::{Block, BlockData},
    instruction::{Inst, InstData, InstKind},
    value::{Type, Value},
};

/// A function taking and returning doubles. Without blocks, it is a declaration.
#[derive(Clone, Debug)]
pub struct Function {
    name: String,
    params: Vec<String>,
    blocks: SlotMap<Block, BlockData>,
    insts: SlotMap<Inst, InstData>,
    // Blocks in program order. Blocks created but not yet placed are absent.
    layout: Vec<Block>,
}

impl Function {
    pub fn new(name: &str, params: &[String]) -> Self {
        Function {
            name: name.to_string(),
            params: params.to_vec(),
            blocks: SlotMap::with_key(),
            insts: SlotMap::with_key(),
            layout: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn set_params(&mut self, params: &[String]) {
        self.params = params.to_vec();
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_declaration(&self) -> bool {
        self.layout.is_empty()
    }

    /// The first block in layout order.
    pub fn entry_block(&self) -> Option<Block> {
        self.layout.first().copied()
    }

    /// Blocks in layout order.
    pub fn blocks(&self) -> &[Block] {
        &self.layout
    }

    pub fn block(&self, block: Block) -> &BlockData {
        &self.blocks[block]
    }

    pub fn inst(&self, inst: Inst) -> &InstData {
        &self.insts[inst]
    }

    pub fn inst_mut(&mut self, inst: Inst) -> &mut InstData {
        &mut self.insts[inst]
    }

    /// Create a block that is not yet placed in the layout.
    pub fn create_block(&mut self, label: &str) -> Block {
        self.blocks.insert(BlockData::new(label))
    }

    /// Place `block` at the end of the layout.
    pub fn append_block(&mut self, block: Block) {
        if !self.layout.contains(&block) {
            self.layout.push(block);
        }
    }

    /// Append a new instruction at the end of `block`.
    pub fn append_inst(&mut self, block: Block, kind: InstKind, name: &str) -> Inst {
        let inst = self.insts.insert(InstData {
            kind,
            name: name.to_string(),
            block,
        });
        self.blocks[block].insts.push(inst);
        inst
    }

    /// Drop the body, leaving a declaration.
    pub fn clear_body(&mut self) {
        self.blocks.clear();
        self.insts.clear();
        self.layout.clear();
    }

    /// The leading phi instructions of `block`.
    pub fn phis(&self, block: Block) -> Vec<Inst> {
        self.blocks[block]
            .insts
            .iter()
            .copied()
            .take_while(|i| self.insts[*i].kind.is_phi())
            .collect()
    }

    /// Type of `value`, or [None] if it does not denote a value of this function.
    pub fn value_type(&self, value: Value) -> Option<Type> {
        match value {
            Value::Param(idx) => (idx < self.params.len()).then_some(Type::Double),
            Value::Inst(inst) => self.insts.get(inst).and_then(|d| d.kind.result_type()),
            Value::Const(c) => Some(c.get_type()),
        }
    }
}
