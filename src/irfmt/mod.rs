//! Textual IR, in the style of LLVM assembly.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    basic_block::Block,
    function::Function,
    instruction::{Inst, InstKind},
    module::{FuncId, Module},
    value::{Type, Value},
};

const INDENT: &str = "  ";

/// Unique printed names for the values and blocks of one function.
/// Name hints that collide get a numeric suffix. Empty hints are numbered.
struct Namer {
    params: Vec<String>,
    insts: FxHashMap<Inst, String>,
    blocks: FxHashMap<Block, String>,
}

impl Namer {
    fn new(func: &Function) -> Self {
        let mut used = FxHashSet::default();
        let mut suffixes: FxHashMap<String, usize> = FxHashMap::default();
        let mut unnamed = 0;
        let mut unique = |hint: &str| -> String {
            if hint.is_empty() {
                let name = unnamed.to_string();
                unnamed += 1;
                used.insert(name.clone());
                return name;
            }
            let mut name = hint.to_string();
            while used.contains(&name) {
                let suffix = suffixes.entry(hint.to_string()).or_insert(0);
                *suffix += 1;
                name = format!("{}{}", hint, suffix);
            }
            used.insert(name.clone());
            name
        };

        let params = func.params().iter().map(|p| unique(p)).collect();
        let mut insts = FxHashMap::default();
        let mut blocks = FxHashMap::default();
        for &block in func.blocks() {
            blocks.insert(block, unique(&func.block(block).label));
            for &inst in &func.block(block).insts {
                let data = func.inst(inst);
                if data.kind.result_type().is_some() {
                    insts.insert(inst, unique(&data.name));
                }
            }
        }
        Namer {
            params,
            insts,
            blocks,
        }
    }

    fn value(&self, value: Value) -> String {
        match value {
            Value::Param(idx) => match self.params.get(idx) {
                Some(name) => format!("%{}", name),
                None => "%<badref>".to_string(),
            },
            Value::Inst(inst) => match self.insts.get(&inst) {
                Some(name) => format!("%{}", name),
                None => "%<badref>".to_string(),
            },
            Value::Const(c) => c.to_string(),
        }
    }

    fn label(&self, block: Block) -> &str {
        self.blocks.get(&block).map_or("<badref>", String::as_str)
    }

    fn block(&self, block: Block) -> String {
        format!("%{}", self.label(block))
    }
}

fn fmt_inst(
    func: &Function,
    namer: &Namer,
    inst: Inst,
    ctx: &Module,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let kind = &func.inst(inst).kind;
    if kind.result_type().is_some() {
        write!(f, "{} = ", namer.value(Value::Inst(inst)))?;
    }
    let typed = |v: Value| {
        let ty = func.value_type(v).unwrap_or(Type::Double);
        format!("{} {}", ty, namer.value(v))
    };
    match kind {
        InstKind::Binary { op, lhs, rhs } => {
            write!(f, "{} double {}, {}", op, namer.value(*lhs), namer.value(*rhs))
        }
        InstKind::FCmp { cc, lhs, rhs } => {
            write!(
                f,
                "fcmp {} double {}, {}",
                cc,
                namer.value(*lhs),
                namer.value(*rhs)
            )
        }
        InstKind::UIToFP { arg } => write!(f, "uitofp {} to double", typed(*arg)),
        InstKind::Call { callee, args } => {
            let callee = if ctx.contains(*callee) {
                ctx.func(*callee).name()
            } else {
                "<badref>"
            };
            let args: Vec<_> = args.iter().map(|a| typed(*a)).collect();
            write!(f, "call double @{}({})", callee, args.join(", "))
        }
        InstKind::Phi { incoming } => {
            let incoming: Vec<_> = incoming
                .iter()
                .map(|(v, b)| format!("[ {}, {} ]", namer.value(*v), namer.block(*b)))
                .collect();
            write!(f, "phi double {}", incoming.join(", "))
        }
        InstKind::Br { dest } => write!(f, "br label {}", namer.block(*dest)),
        InstKind::CondBr {
            cond,
            then_dest,
            else_dest,
        } => write!(
            f,
            "br {}, label {}, label {}",
            typed(*cond),
            namer.block(*then_dest),
            namer.block(*else_dest)
        ),
        InstKind::Ret { value } => write!(f, "ret {}", typed(*value)),
    }
}

/// Prints a function of a [Module], as returned by [FuncId::disp].
pub struct FunctionDisplay<'a> {
    id: FuncId,
    ctx: &'a Module,
}

impl FuncId {
    /// A [Display](fmt::Display)able view of this function in `ctx`.
    pub fn disp(self, ctx: &Module) -> FunctionDisplay<'_> {
        FunctionDisplay { id: self, ctx }
    }
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.ctx;
        if !ctx.contains(self.id) {
            return write!(f, "<badref>");
        }
        let func = ctx.func(self.id);
        let namer = Namer::new(func);

        if func.is_declaration() {
            let params = vec!["double"; func.arity()];
            return write!(f, "declare double @{}({})", func.name(), params.join(", "));
        }

        let params: Vec<_> = namer.params.iter().map(|p| format!("double %{}", p)).collect();
        write!(f, "define double @{}({}) {{", func.name(), params.join(", "))?;
        for (idx, &block) in func.blocks().iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "\n{}:", namer.label(block))?;
            for &inst in &func.block(block).insts {
                write!(f, "\n{}", INDENT)?;
                fmt_inst(func, &namer, inst, ctx, f)?;
            }
        }
        write!(f, "\n}}")
    }
}
