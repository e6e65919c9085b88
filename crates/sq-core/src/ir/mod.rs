//! Control-flow-graph IR emitted by code generation.

mod builder;
mod printer;

pub use builder::{InsertPoint, IrBuilder, ModuleBuilder};
pub use printer::render_module;

use crate::ast::{BinOp, UnOp};
use crate::id::{BlockId, ClassHandle, FuncId, GlobalId, LocalId};
use crate::types::{SeqKind, Type};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub globals: Vec<Global>,
    pub classes: Vec<ClassDecl>,
    pub functions: Vec<Function>,
    pub sources: Vec<SourceDecl>,
    pub fork_points: Vec<ForkPoint>,
    pub entry: Option<FuncId>,
    /// Global receiving the program arguments as `array[str]`.
    pub args_global: Option<GlobalId>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn class(&self, id: ClassHandle) -> Option<&ClassDecl> {
        self.classes.iter().find(|c| c.id == id)
    }

    /// Every block must end in a terminator and every branch target must exist.
    pub fn verify(&self) -> Result<(), String> {
        for function in &self.functions {
            for block in &function.blocks {
                let Some(terminator) = &block.terminator else {
                    return Err(format!(
                        "{}: block {} has no terminator",
                        function.name, block.id
                    ));
                };
                for target in terminator.successors() {
                    if function.block(target).is_none() {
                        return Err(format!(
                            "{}: block {} branches to missing {}",
                            function.name, block.id, target
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub id: GlobalId,
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub id: ClassHandle,
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDecl {
    pub name: String,
    pub kind: SeqKind,
}

/// Sibling branch entries of a fork. Branches are emitted in sequence but
/// share no state except the upstream values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkPoint {
    pub function: FuncId,
    pub block: BlockId,
    pub branches: Vec<BlockId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub id: FuncId,
    pub name: String,
    pub params: Vec<LocalId>,
    pub ret: Type,
    pub locals: Vec<LocalDecl>,
    pub blocks: Vec<Block>,
    /// Calls return the array of yielded values.
    pub generator: bool,
}

impl Function {
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    pub fn local(&self, id: LocalId) -> Option<&LocalDecl> {
        self.locals.get(id.index())
    }

    pub fn entry_block(&self) -> Option<&Block> {
        self.blocks.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub id: LocalId,
    pub name: Option<String>,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub label: String,
    pub instrs: Vec<Instr>,
    pub terminator: Option<Terminator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Local(LocalId),
    Const(Constant),
}

impl Operand {
    pub fn unit() -> Self {
        Operand::Const(Constant::Unit)
    }

    pub fn int(value: i64) -> Self {
        Operand::Const(Constant::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        Operand::Const(Constant::Bool(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Place {
    Local(LocalId),
    Global(GlobalId),
    Field(Operand, usize),
    Index(Operand, Operand),
    Deref(Operand),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rvalue {
    Use(Operand),
    Load(Place),
    Binary(BinOp, Operand, Operand),
    Unary(UnOp, Operand),
    AddressOf(LocalId),
    Array(Vec<Operand>),
    Record(Vec<Operand>),
    StackAlloc { elem: Type, len: Operand },
    New { class: ClassHandle, fields: Vec<Operand> },
    InstanceOf { value: Operand, class: ClassHandle },
    FuncRef(FuncId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    Direct(FuncId),
    Indirect(Operand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intrinsic {
    Print,
    Len,
    ToStr,
    /// Whether the numbered source has another record.
    SourceHasNext(u32),
    SourceRead(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    Assign {
        dest: LocalId,
        value: Rvalue,
    },
    Store {
        place: Place,
        value: Operand,
    },
    Call {
        dest: Option<LocalId>,
        callee: Callee,
        args: Vec<Operand>,
    },
    Intrinsic {
        dest: Option<LocalId>,
        op: Intrinsic,
        args: Vec<Operand>,
    },
    /// Appends to the generator's result.
    Yield(Operand),
    /// Installs an exception handler; a throw jumps to `handler` after
    /// storing the exception in `exn` and removing the handler.
    PushHandler {
        handler: BlockId,
        exn: LocalId,
    },
    PopHandler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    Goto(BlockId),
    Branch {
        cond: Operand,
        then: BlockId,
        otherwise: BlockId,
    },
    Return(Option<Operand>),
    Throw(Operand),
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Goto(target) => vec![*target],
            Terminator::Branch {
                then, otherwise, ..
            } => vec![*then, *otherwise],
            Terminator::Return(_) | Terminator::Throw(_) | Terminator::Unreachable => Vec::new(),
        }
    }
}
