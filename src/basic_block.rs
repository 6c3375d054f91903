//! A basic block: a straight-line list of instructions ending in a terminator.

use slotmap::new_key_type;

use crate::instruction::Inst;

new_key_type! {
    /// A basic block within a [Function](crate::function::Function).
    pub struct Block;
}

#[derive(Clone, Debug, Default)]
pub struct BlockData {
    /// Printed labels are derived from this, made unique per function.
    pub label: String,
    pub insts: Vec<Inst>,
}

impl BlockData {
    pub fn new(label: &str) -> Self {
        BlockData {
            label: label.to_string(),
            insts: vec![],
        }
    }
}
