use super::{Callee, Constant, Function, Instr, Intrinsic, Module, Operand, Place, Rvalue, Terminator};
use itertools::Itertools;
use std::fmt::{self, Write};

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Unit => write!(f, "()"),
            Constant::Bool(value) => write!(f, "{}", value),
            Constant::Int(value) => write!(f, "{}", value),
            Constant::Float(value) => write!(f, "{:?}", value),
            Constant::Str(value) => write!(f, "{:?}", value),
            Constant::Seq(value) => write!(f, "s{:?}", value),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Local(local) => write!(f, "{}", local),
            Operand::Const(constant) => write!(f, "const {}", constant),
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Local(local) => write!(f, "{}", local),
            Place::Global(global) => write!(f, "@{}", global),
            Place::Field(base, index) => write!(f, "({}).{}", base, index),
            Place::Index(base, index) => write!(f, "({})[{}]", base, index),
            Place::Deref(pointer) => write!(f, "*({})", pointer),
        }
    }
}

impl fmt::Display for Rvalue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rvalue::Use(operand) => write!(f, "{}", operand),
            Rvalue::Load(place) => write!(f, "load {}", place),
            Rvalue::Binary(op, lhs, rhs) => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
            Rvalue::Unary(op, operand) => write!(f, "{:?}({})", op, operand),
            Rvalue::AddressOf(local) => write!(f, "&{}", local),
            Rvalue::Array(items) => write!(f, "[{}]", items.iter().join(", ")),
            Rvalue::Record(items) => write!(f, "({})", items.iter().join(", ")),
            Rvalue::StackAlloc { elem, len } => write!(f, "alloca {}[{}]", elem, len),
            Rvalue::New { class, fields } => write!(f, "new {}({})", class, fields.iter().join(", ")),
            Rvalue::InstanceOf { value, class } => write!(f, "{} instanceof {}", value, class),
            Rvalue::FuncRef(function) => write!(f, "fnref {}", function),
        }
    }
}

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intrinsic::Print => write!(f, "print"),
            Intrinsic::Len => write!(f, "len"),
            Intrinsic::ToStr => write!(f, "str"),
            Intrinsic::SourceHasNext(source) => write!(f, "source_has_next#{}", source),
            Intrinsic::SourceRead(source) => write!(f, "source_read#{}", source),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Assign { dest, value } => write!(f, "{} = {}", dest, value),
            Instr::Store { place, value } => write!(f, "store {} <- {}", place, value),
            Instr::Call { dest, callee, args } => {
                let callee = match callee {
                    Callee::Direct(function) => function.to_string(),
                    Callee::Indirect(operand) => format!("*{}", operand),
                };
                match dest {
                    Some(dest) => write!(f, "{} = call {}({})", dest, callee, args.iter().join(", ")),
                    None => write!(f, "call {}({})", callee, args.iter().join(", ")),
                }
            }
            Instr::Intrinsic { dest, op, args } => match dest {
                Some(dest) => write!(f, "{} = {}({})", dest, op, args.iter().join(", ")),
                None => write!(f, "{}({})", op, args.iter().join(", ")),
            },
            Instr::Yield(value) => write!(f, "yield {}", value),
            Instr::PushHandler { handler, exn } => write!(f, "push_handler {} -> {}", handler, exn),
            Instr::PopHandler => write!(f, "pop_handler"),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Goto(target) => write!(f, "goto {}", target),
            Terminator::Branch {
                cond,
                then,
                otherwise,
            } => write!(f, "br {}, {}, {}", cond, then, otherwise),
            Terminator::Return(Some(value)) => write!(f, "return {}", value),
            Terminator::Return(None) => write!(f, "return"),
            Terminator::Throw(value) => write!(f, "throw {}", value),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

fn render_function(out: &mut String, function: &Function) -> fmt::Result {
    let params = function
        .params
        .iter()
        .filter_map(|id| function.local(*id))
        .map(|local| format!("{}: {}", local.id, local.ty))
        .join(", ");
    let kind = if function.generator { "gen" } else { "fn" };
    writeln!(
        out,
        "{} {} {}({}) -> {} {{",
        kind, function.id, function.name, params, function.ret
    )?;
    for local in function.locals.iter().skip(function.params.len()) {
        match &local.name {
            Some(name) => writeln!(out, "    let {}: {} // {}", local.id, local.ty, name)?,
            None => writeln!(out, "    let {}: {}", local.id, local.ty)?,
        }
    }
    for block in &function.blocks {
        writeln!(out, "  {} ({}):", block.id, block.label)?;
        for instr in &block.instrs {
            writeln!(out, "    {}", instr)?;
        }
        match &block.terminator {
            Some(terminator) => writeln!(out, "    {}", terminator)?,
            None => writeln!(out, "    <unterminated>")?,
        }
    }
    writeln!(out, "}}")
}

/// Human-readable listing of a module, used by `compile` text output.
pub fn render_module(module: &Module) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = render_module_into(&mut out, module);
    out
}

fn render_module_into(out: &mut String, module: &Module) -> fmt::Result {
    writeln!(out, "module {}", module.name)?;
    for global in &module.globals {
        writeln!(out, "global @{} {}: {}", global.id, global.name, global.ty)?;
    }
    for class in &module.classes {
        let fields = class
            .fields
            .iter()
            .map(|(name, ty)| format!("{}: {}", name, ty))
            .join(", ");
        writeln!(out, "class {} {} {{ {} }}", class.id, class.name, fields)?;
    }
    for (index, source) in module.sources.iter().enumerate() {
        writeln!(out, "source #{} {:?}: {:?}", index, source.name, source.kind)?;
    }
    for fork in &module.fork_points {
        writeln!(
            out,
            "fork {}:{} -> [{}]",
            fork.function,
            fork.block,
            fork.branches.iter().join(", ")
        )?;
    }
    if let Some(entry) = module.entry {
        writeln!(out, "entry {}", entry)?;
    }
    for function in &module.functions {
        writeln!(out)?;
        render_function(out, function)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::LocalId;
    use crate::ir::{InsertPoint, IrBuilder, ModuleBuilder};
    use crate::types::Type;

    #[test]
    fn renders_function_listing() {
        let mut builder = ModuleBuilder::new("demo");
        let f = builder.create_function("id[int]", &[("x".into(), Type::int())], Type::int(), false);
        let entry = builder.create_block_in(f, "entry");
        builder.set_insertion_point(Some(InsertPoint {
            function: f,
            block: entry,
        }));
        builder.ret(Some(Operand::Local(LocalId(0))));
        let text = render_module(&builder.finish());
        assert!(text.contains("fn f0 id[int](_0: int) -> int {"), "{}", text);
        assert!(text.contains("bb0 (entry):"), "{}", text);
        assert!(text.contains("return _0"), "{}", text);
    }
}
