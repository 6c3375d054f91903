//! Instructions: the kinds of operations a [Function](crate::function::Function) computes.

use std::fmt;

use slotmap::new_key_type;

use crate::{
    basic_block::Block,
    module::FuncId,
    value::{Type, Value},
};

new_key_type! {
    /// An instruction within a [Function](crate::function::Function).
    pub struct Inst;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    FAdd,
    FSub,
    FMul,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::FAdd => write!(f, "fadd"),
            BinaryOp::FSub => write!(f, "fsub"),
            BinaryOp::FMul => write!(f, "fmul"),
        }
    }
}

/// Floating point comparison predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatCC {
    /// Unordered or less than.
    Ult,
    /// Ordered and not equal.
    One,
}

impl fmt::Display for FloatCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloatCC::Ult => write!(f, "ult"),
            FloatCC::One => write!(f, "one"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InstKind {
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    FCmp {
        cc: FloatCC,
        lhs: Value,
        rhs: Value,
    },
    /// Convert an `i1` to `0.0` or `1.0`.
    UIToFP {
        arg: Value,
    },
    Call {
        callee: FuncId,
        args: Vec<Value>,
    },
    Phi {
        incoming: Vec<(Value, Block)>,
    },
    Br {
        dest: Block,
    },
    CondBr {
        cond: Value,
        then_dest: Block,
        else_dest: Block,
    },
    Ret {
        value: Value,
    },
}

impl InstKind {
    pub fn is_phi(&self) -> bool {
        matches!(self, InstKind::Phi { .. })
    }

    /// Type of the value this produces, if any.
    pub fn result_type(&self) -> Option<Type> {
        match self {
            InstKind::Binary { .. }
            | InstKind::UIToFP { .. }
            | InstKind::Call { .. }
            | InstKind::Phi { .. } => Some(Type::Double),
            InstKind::FCmp { .. } => Some(Type::Bool),
            InstKind::Br { .. } | InstKind::CondBr { .. } | InstKind::Ret { .. } => None,
        }
    }
}

/// An instruction along with its name hint and parent block.
#[derive(Clone, Debug)]
pub struct InstData {
    pub kind: InstKind,
    /// Printed names are derived from this, made unique per function.
    pub name: String,
    pub block: Block,
}
