use crate::ops::{eval_binop, eval_unop};
use crate::source::{PeekableSource, RecordSource};
use crate::value::{render_value, Pointer, Value};
use crate::RuntimeError;
use itertools::Itertools;
use sq_core::id::{BlockId, FuncId, GlobalId, LocalId};
use sq_core::ir::{
    Callee, Function, Instr, Intrinsic, Module, Operand, Place, Rvalue, Terminator,
};
use sq_core::types::SeqKind;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

/// Calls nest on the host stack, so deep recursion is cut off here.
const MAX_CALL_DEPTH: usize = 1024;

enum Unwind {
    Throw(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}

impl From<io::Error> for Unwind {
    fn from(error: io::Error) -> Self {
        Unwind::Error(RuntimeError::Io(error))
    }
}

struct Frame {
    locals: Vec<Value>,
    handlers: Vec<(BlockId, LocalId)>,
    yielded: Vec<Value>,
}

pub struct Vm<'m> {
    module: &'m Module,
    frames: Vec<Frame>,
    globals: HashMap<GlobalId, Value>,
    sources: Vec<PeekableSource>,
    args: Vec<String>,
    out: Box<dyn Write + 'm>,
}

impl<'m> Vm<'m> {
    pub fn new(module: &'m Module) -> Self {
        let globals = module
            .globals
            .iter()
            .map(|global| (global.id, Value::default_for(&global.ty)))
            .collect();
        Self {
            module,
            frames: Vec::new(),
            globals,
            sources: Vec::new(),
            args: Vec::new(),
            out: Box::new(io::stdout()),
        }
    }

    pub fn with_output(mut self, out: impl Write + 'm) -> Self {
        self.out = Box::new(out);
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// One reader per source the module declares, in declaration order.
    pub fn with_sources(mut self, sources: Vec<Box<dyn RecordSource>>) -> Self {
        self.sources = sources.into_iter().map(PeekableSource::new).collect();
        self
    }

    pub fn global(&self, id: GlobalId) -> Option<&Value> {
        self.globals.get(&id)
    }

    pub fn run_main(&mut self) -> Result<Value, RuntimeError> {
        let entry = self
            .module
            .entry
            .ok_or_else(|| RuntimeError::runtime(format!("module `{}` has no entry", self.module.name)))?;
        if self.sources.len() < self.module.sources.len() {
            return Err(RuntimeError::runtime(format!(
                "module declares {} sources but {} were provided",
                self.module.sources.len(),
                self.sources.len()
            )));
        }
        if let Some(global) = self.module.args_global {
            let args = self.args.iter().cloned().map(Value::Str).collect();
            self.globals.insert(global, Value::array(args));
        }
        tracing::debug!("[vm] running {}", self.module.name);
        let result = self.run_function(entry, Vec::new());
        self.out.flush()?;
        result
    }

    pub fn run_function(&mut self, id: FuncId, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match self.call(id, args) {
            Ok(value) => Ok(value),
            Err(Unwind::Error(error)) => Err(error),
            Err(Unwind::Throw(exception)) => Err(RuntimeError::Uncaught {
                class: self.exception_name(&exception),
            }),
        }
    }

    fn exception_name(&self, exception: &Value) -> String {
        match exception {
            Value::Object(object) => {
                let class = object.borrow().class;
                self.module
                    .class(class)
                    .map(|decl| decl.name.clone())
                    .unwrap_or_else(|| class.to_string())
            }
            other => render_value(other, self.module),
        }
    }

    fn call(&mut self, id: FuncId, args: Vec<Value>) -> Result<Value, Unwind> {
        let module = self.module;
        let function = module
            .function(id)
            .ok_or_else(|| RuntimeError::runtime(format!("unknown function {}", id)))?;
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(RuntimeError::runtime(format!(
                "call stack exhausted in `{}`",
                function.name
            ))
            .into());
        }
        if args.len() != function.params.len() {
            return Err(RuntimeError::runtime(format!(
                "`{}` expects {} arguments, got {}",
                function.name,
                function.params.len(),
                args.len()
            ))
            .into());
        }
        tracing::trace!("[vm] call {}", function.name);

        let mut locals: Vec<Value> = function
            .locals
            .iter()
            .map(|local| Value::default_for(&local.ty))
            .collect();
        for (param, arg) in function.params.iter().zip(args) {
            let slot = locals
                .get_mut(param.index())
                .ok_or_else(|| RuntimeError::runtime(format!("unknown parameter {}", param)))?;
            *slot = arg;
        }
        self.frames.push(Frame {
            locals,
            handlers: Vec::new(),
            yielded: Vec::new(),
        });
        let result = self.execute(function);
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| RuntimeError::runtime("frame stack underflow"))?;
        match result {
            Ok(_) if function.generator => Ok(Value::array(frame.yielded)),
            other => other,
        }
    }

    fn execute(&mut self, function: &'m Function) -> Result<Value, Unwind> {
        let mut current = function
            .entry_block()
            .map(|block| block.id)
            .ok_or_else(|| RuntimeError::runtime(format!("`{}` has no blocks", function.name)))?;
        'blocks: loop {
            let block = function.block(current).ok_or_else(|| {
                RuntimeError::runtime(format!("`{}` has no block {}", function.name, current))
            })?;
            for instr in &block.instrs {
                match self.execute_instr(instr) {
                    Ok(()) => {}
                    Err(Unwind::Throw(exception)) => {
                        current = self.catch(exception)?;
                        continue 'blocks;
                    }
                    Err(error) => return Err(error),
                }
            }
            let terminator = block.terminator.as_ref().ok_or_else(|| {
                RuntimeError::runtime(format!("block {} of `{}` is open", current, function.name))
            })?;
            current = match terminator {
                Terminator::Goto(target) => *target,
                Terminator::Branch {
                    cond,
                    then,
                    otherwise,
                } => match self.operand(cond)? {
                    Value::Bool(true) => *then,
                    Value::Bool(false) => *otherwise,
                    other => {
                        return Err(RuntimeError::runtime(format!(
                            "branch on {} value",
                            other.kind()
                        ))
                        .into())
                    }
                },
                Terminator::Return(value) => {
                    return Ok(match value {
                        Some(value) => self.operand(value)?,
                        None => Value::Unit,
                    })
                }
                Terminator::Throw(value) => {
                    let exception = self.operand(value)?;
                    self.catch(exception)?
                }
                Terminator::Unreachable => {
                    return Err(RuntimeError::runtime(format!(
                        "`{}` ended without returning a value",
                        function.name
                    ))
                    .into())
                }
            };
        }
    }

    /// Hands the exception to the innermost handler of the current frame,
    /// or unwinds the frame.
    fn catch(&mut self, exception: Value) -> Result<BlockId, Unwind> {
        let frame = self.frame_mut()?;
        match frame.handlers.pop() {
            Some((handler, slot)) => {
                let local = frame
                    .locals
                    .get_mut(slot.index())
                    .ok_or_else(|| RuntimeError::runtime(format!("unknown local {}", slot)))?;
                *local = exception;
                Ok(handler)
            }
            None => Err(Unwind::Throw(exception)),
        }
    }

    fn execute_instr(&mut self, instr: &Instr) -> Result<(), Unwind> {
        match instr {
            Instr::Assign { dest, value } => {
                let value = self.eval_rvalue(value)?;
                self.set_local(*dest, value)?;
            }
            Instr::Store { place, value } => {
                let value = self.operand(value)?;
                self.store_place(place, value)?;
            }
            Instr::Call { dest, callee, args } => {
                let target = match callee {
                    Callee::Direct(id) => *id,
                    Callee::Indirect(value) => match self.operand(value)? {
                        Value::Func(id) => id,
                        other => {
                            return Err(RuntimeError::runtime(format!(
                                "cannot call a {} value",
                                other.kind()
                            ))
                            .into())
                        }
                    },
                };
                let args = self.operands(args)?;
                let result = self.call(target, args)?;
                if let Some(dest) = dest {
                    self.set_local(*dest, result)?;
                }
            }
            Instr::Intrinsic { dest, op, args } => {
                let args = self.operands(args)?;
                let result = self.exec_intrinsic(*op, args)?;
                if let Some(dest) = dest {
                    self.set_local(*dest, result)?;
                }
            }
            Instr::Yield(value) => {
                let value = self.operand(value)?;
                self.frame_mut()?.yielded.push(value);
            }
            Instr::PushHandler { handler, exn } => {
                self.frame_mut()?.handlers.push((*handler, *exn));
            }
            Instr::PopHandler => {
                self.frame_mut()?
                    .handlers
                    .pop()
                    .ok_or_else(|| RuntimeError::runtime("no exception handler to pop"))?;
            }
        }
        Ok(())
    }

    fn exec_intrinsic(&mut self, op: Intrinsic, args: Vec<Value>) -> Result<Value, Unwind> {
        match op {
            Intrinsic::Print => {
                let line = args
                    .iter()
                    .map(|arg| render_value(arg, self.module))
                    .join(" ");
                writeln!(self.out, "{}", line)?;
                Ok(Value::Unit)
            }
            Intrinsic::Len => match args.first() {
                Some(Value::Array(items)) => Ok(Value::Int(items.borrow().len() as i64)),
                Some(Value::Str(text)) | Some(Value::Seq(text)) => {
                    Ok(Value::Int(text.chars().count() as i64))
                }
                other => Err(RuntimeError::unsupported(format!(
                    "len of {}",
                    other.map(Value::kind).unwrap_or("nothing")
                ))
                .into()),
            },
            Intrinsic::ToStr => {
                let value = args.first().cloned().unwrap_or(Value::Unit);
                Ok(Value::Str(render_value(&value, self.module)))
            }
            Intrinsic::SourceHasNext(index) => {
                let has_next = self.source(index)?.has_next()?;
                Ok(Value::Bool(has_next))
            }
            Intrinsic::SourceRead(index) => {
                let module = self.module;
                let decl = module
                    .sources
                    .get(index as usize)
                    .ok_or_else(|| RuntimeError::runtime(format!("unknown source #{}", index)))?;
                let record = self.source(index)?.next()?.ok_or_else(|| {
                    RuntimeError::runtime(format!("source `{}` is exhausted", decl.name))
                })?;
                Ok(match decl.kind {
                    SeqKind::Str => Value::Str(record),
                    SeqKind::Seq => Value::Seq(record),
                })
            }
        }
    }

    fn source(&mut self, index: u32) -> Result<&mut PeekableSource, RuntimeError> {
        self.sources
            .get_mut(index as usize)
            .ok_or_else(|| RuntimeError::runtime(format!("no reader bound to source #{}", index)))
    }

    fn eval_rvalue(&mut self, rvalue: &Rvalue) -> Result<Value, Unwind> {
        let value = match rvalue {
            Rvalue::Use(value) => self.operand(value)?,
            Rvalue::Load(place) => self.load_place(place)?,
            Rvalue::Binary(op, lhs, rhs) => {
                let lhs = self.operand(lhs)?;
                let rhs = self.operand(rhs)?;
                eval_binop(*op, lhs, rhs)?
            }
            Rvalue::Unary(op, value) => eval_unop(*op, self.operand(value)?)?,
            Rvalue::AddressOf(local) => Value::Ptr(Pointer {
                frame: self.frames.len().saturating_sub(1),
                local: *local,
            }),
            Rvalue::Array(items) => Value::array(self.operands(items)?),
            Rvalue::Record(items) => Value::Record(self.operands(items)?),
            Rvalue::StackAlloc { elem, len } => match self.operand(len)? {
                Value::Int(len) if len >= 0 => {
                    Value::array((0..len).map(|_| Value::default_for(elem)).collect())
                }
                other => {
                    return Err(RuntimeError::runtime(format!(
                        "invalid allocation length {}",
                        render_value(&other, self.module)
                    ))
                    .into())
                }
            },
            Rvalue::New { class, fields } => Value::object(*class, self.operands(fields)?),
            Rvalue::InstanceOf { value, class } => match self.operand(value)? {
                Value::Object(object) => Value::Bool(object.borrow().class == *class),
                _ => Value::Bool(false),
            },
            Rvalue::FuncRef(id) => Value::Func(*id),
        };
        Ok(value)
    }

    fn operand(&self, operand: &Operand) -> Result<Value, RuntimeError> {
        match operand {
            Operand::Local(local) => self.local(*local).cloned(),
            Operand::Const(constant) => Ok(Value::from(constant)),
        }
    }

    fn operands(&self, operands: &[Operand]) -> Result<Vec<Value>, RuntimeError> {
        operands.iter().map(|operand| self.operand(operand)).collect()
    }

    fn frame_mut(&mut self) -> Result<&mut Frame, RuntimeError> {
        self.frames
            .last_mut()
            .ok_or_else(|| RuntimeError::runtime("no active frame"))
    }

    fn local(&self, local: LocalId) -> Result<&Value, RuntimeError> {
        self.frames
            .last()
            .and_then(|frame| frame.locals.get(local.index()))
            .ok_or_else(|| RuntimeError::runtime(format!("unknown local {}", local)))
    }

    fn local_mut(&mut self, frame: usize, local: LocalId) -> Result<&mut Value, RuntimeError> {
        self.frames
            .get_mut(frame)
            .and_then(|frame| frame.locals.get_mut(local.index()))
            .ok_or_else(|| RuntimeError::runtime(format!("dangling pointer to {}", local)))
    }

    fn set_local(&mut self, local: LocalId, value: Value) -> Result<(), RuntimeError> {
        let frame = self.frames.len().saturating_sub(1);
        *self.local_mut(frame, local)? = value;
        Ok(())
    }

    fn load_place(&self, place: &Place) -> Result<Value, RuntimeError> {
        match place {
            Place::Local(local) => self.local(*local).cloned(),
            Place::Global(global) => self
                .globals
                .get(global)
                .cloned()
                .ok_or_else(|| RuntimeError::runtime(format!("unknown global {}", global))),
            Place::Field(base, index) => {
                let field = match self.operand(base)? {
                    Value::Record(items) => items.get(*index).cloned(),
                    Value::Object(object) => object.borrow().fields.get(*index).cloned(),
                    other => {
                        return Err(RuntimeError::unsupported(format!(
                            "field access on {}",
                            other.kind()
                        )))
                    }
                };
                field.ok_or_else(|| RuntimeError::runtime(format!("no field #{}", index)))
            }
            Place::Index(base, index) => {
                let index = self.operand(index)?;
                match self.operand(base)? {
                    Value::Array(items) => {
                        let items = items.borrow();
                        let at = checked_index(&index, items.len())?;
                        Ok(items[at].clone())
                    }
                    Value::Str(text) => Ok(Value::Str(char_at(&text, &index)?)),
                    Value::Seq(text) => Ok(Value::Seq(char_at(&text, &index)?)),
                    other => Err(RuntimeError::unsupported(format!("indexing {}", other.kind()))),
                }
            }
            Place::Deref(pointer) => match self.operand(pointer)? {
                Value::Ptr(pointer) => self
                    .frames
                    .get(pointer.frame)
                    .and_then(|frame| frame.locals.get(pointer.local.index()))
                    .cloned()
                    .ok_or_else(|| RuntimeError::runtime("dangling pointer")),
                other => Err(RuntimeError::unsupported(format!(
                    "dereferencing {}",
                    other.kind()
                ))),
            },
        }
    }

    fn store_place(&mut self, place: &Place, value: Value) -> Result<(), RuntimeError> {
        match place {
            Place::Local(local) => self.set_local(*local, value),
            Place::Global(global) => {
                self.globals.insert(*global, value);
                Ok(())
            }
            Place::Field(Operand::Local(local), index)
                if matches!(self.local(*local), Ok(Value::Record(_))) =>
            {
                let frame = self.frames.len().saturating_sub(1);
                if let Value::Record(items) = self.local_mut(frame, *local)? {
                    let slot = items
                        .get_mut(*index)
                        .ok_or_else(|| RuntimeError::runtime(format!("no field #{}", index)))?;
                    *slot = value;
                }
                Ok(())
            }
            Place::Field(base, index) => match self.operand(base)? {
                Value::Object(object) => {
                    let mut object = object.borrow_mut();
                    let slot = object
                        .fields
                        .get_mut(*index)
                        .ok_or_else(|| RuntimeError::runtime(format!("no field #{}", index)))?;
                    *slot = value;
                    Ok(())
                }
                other => Err(RuntimeError::unsupported(format!(
                    "field store on {}",
                    other.kind()
                ))),
            },
            Place::Index(base, index) => {
                let index = self.operand(index)?;
                match self.operand(base)? {
                    Value::Array(items) => {
                        let mut items = items.borrow_mut();
                        let at = checked_index(&index, items.len())?;
                        items[at] = value;
                        Ok(())
                    }
                    other => Err(RuntimeError::unsupported(format!(
                        "index store on {}",
                        other.kind()
                    ))),
                }
            }
            Place::Deref(pointer) => match self.operand(pointer)? {
                Value::Ptr(pointer) => {
                    *self.local_mut(pointer.frame, pointer.local)? = value;
                    Ok(())
                }
                other => Err(RuntimeError::unsupported(format!(
                    "store through {}",
                    other.kind()
                ))),
            },
        }
    }
}

fn checked_index(index: &Value, len: usize) -> Result<usize, RuntimeError> {
    match index {
        Value::Int(at) if *at >= 0 && (*at as usize) < len => Ok(*at as usize),
        Value::Int(at) => Err(RuntimeError::runtime(format!(
            "index {} out of bounds for length {}",
            at, len
        ))),
        other => Err(RuntimeError::runtime(format!("{} index", other.kind()))),
    }
}

fn char_at(text: &str, index: &Value) -> Result<String, RuntimeError> {
    let at = checked_index(index, text.chars().count())?;
    Ok(text.chars().skip(at).take(1).collect())
}

/// Shared in-memory sink for captured program output.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sq_core::ast::BinOp;
    use sq_core::ir::{Block, Constant, LocalDecl};
    use sq_core::types::Type;

    fn function(
        id: u32,
        name: &str,
        params: Vec<LocalId>,
        locals: Vec<Type>,
        blocks: Vec<Block>,
    ) -> Function {
        Function {
            id: FuncId(id),
            name: name.to_string(),
            params,
            ret: Type::int(),
            locals: locals
                .into_iter()
                .enumerate()
                .map(|(index, ty)| LocalDecl {
                    id: LocalId(index as u32),
                    name: None,
                    ty,
                })
                .collect(),
            blocks,
            generator: false,
        }
    }

    fn block(id: u32, instrs: Vec<Instr>, terminator: Terminator) -> Block {
        Block {
            id: BlockId(id),
            label: format!("bb{}", id),
            instrs,
            terminator: Some(terminator),
        }
    }

    #[test]
    fn runs_arithmetic_in_entry() -> Result<(), RuntimeError> {
        let mut module = Module::new("m");
        module.functions.push(function(
            0,
            "main",
            vec![],
            vec![Type::int()],
            vec![block(
                0,
                vec![Instr::Assign {
                    dest: LocalId(0),
                    value: Rvalue::Binary(BinOp::Mul, Operand::int(6), Operand::int(7)),
                }],
                Terminator::Return(Some(Operand::Local(LocalId(0)))),
            )],
        ));
        module.entry = Some(FuncId(0));
        let result = Vm::new(&module).run_main()?;
        assert!(matches!(result, Value::Int(42)));
        Ok(())
    }

    #[test]
    fn throw_without_handler_is_uncaught() {
        let mut module = Module::new("m");
        module.functions.push(function(
            0,
            "main",
            vec![],
            vec![],
            vec![block(
                0,
                vec![],
                Terminator::Throw(Operand::Const(Constant::Str("boom".into()))),
            )],
        ));
        module.entry = Some(FuncId(0));
        let result = Vm::new(&module).run_main();
        assert!(matches!(result, Err(RuntimeError::Uncaught { class }) if class == "boom"));
    }

    #[test]
    fn throw_in_callee_reaches_caller_handler() -> Result<(), RuntimeError> {
        let mut module = Module::new("m");
        // main: push handler(bb1, _0); call fail(); return 0
        // bb1: return 1
        module.functions.push(function(
            0,
            "main",
            vec![],
            vec![Type::int()],
            vec![
                block(
                    0,
                    vec![
                        Instr::PushHandler {
                            handler: BlockId(1),
                            exn: LocalId(0),
                        },
                        Instr::Call {
                            dest: None,
                            callee: Callee::Direct(FuncId(1)),
                            args: vec![],
                        },
                    ],
                    Terminator::Return(Some(Operand::int(0))),
                ),
                block(1, vec![], Terminator::Return(Some(Operand::int(1)))),
            ],
        ));
        module.functions.push(function(
            1,
            "fail",
            vec![],
            vec![],
            vec![block(0, vec![], Terminator::Throw(Operand::int(9)))],
        ));
        module.entry = Some(FuncId(0));
        let result = Vm::new(&module).run_main()?;
        assert!(matches!(result, Value::Int(1)));
        Ok(())
    }

    #[test]
    fn print_writes_to_the_configured_output() -> Result<(), RuntimeError> {
        let mut module = Module::new("m");
        module.functions.push(function(
            0,
            "main",
            vec![],
            vec![],
            vec![block(
                0,
                vec![Instr::Intrinsic {
                    dest: None,
                    op: Intrinsic::Print,
                    args: vec![Operand::bool(true)],
                }],
                Terminator::Return(None),
            )],
        ));
        module.entry = Some(FuncId(0));
        let out = OutputBuffer::new();
        Vm::new(&module).with_output(out.clone()).run_main()?;
        assert_eq!(out.contents(), "true\n");
        Ok(())
    }
}
