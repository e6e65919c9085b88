use super::{
    Block, ClassDecl, ForkPoint, Function, Global, Instr, LocalDecl, Module, Operand, SourceDecl,
    Terminator,
};
use crate::id::{BlockId, FuncId, GlobalId, LocalId};
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPoint {
    pub function: FuncId,
    pub block: BlockId,
}

/// Emission backend used by code generation. Implementations own the module
/// under construction; callers only hold ids.
pub trait IrBuilder {
    fn create_function(
        &mut self,
        name: &str,
        params: &[(String, Type)],
        ret: Type,
        generator: bool,
    ) -> FuncId;
    fn function_params(&self, function: FuncId) -> Vec<LocalId>;
    fn create_block_in(&mut self, function: FuncId, label: &str) -> BlockId;
    fn insertion_point(&self) -> Option<InsertPoint>;
    fn set_insertion_point(&mut self, point: Option<InsertPoint>);
    fn create_value(&mut self, ty: Type, name: Option<&str>) -> LocalId;
    fn value_type(&self, value: LocalId) -> Type;
    fn append(&mut self, instr: Instr);
    fn terminate(&mut self, terminator: Terminator);
    fn is_terminated(&self) -> bool;
    fn declare_global(&mut self, id: GlobalId, name: &str, ty: Type);
    fn declare_class(&mut self, decl: ClassDecl);
    fn declare_source(&mut self, decl: SourceDecl) -> u32;
    fn record_fork(&mut self, fork: ForkPoint);
    fn set_entry(&mut self, function: FuncId);
    fn set_args_global(&mut self, global: GlobalId);

    fn current_function(&self) -> FuncId {
        match self.insertion_point() {
            Some(point) => point.function,
            None => crate::ice!("no insertion point set"),
        }
    }

    fn current_block(&self) -> BlockId {
        match self.insertion_point() {
            Some(point) => point.block,
            None => crate::ice!("no insertion point set"),
        }
    }

    fn create_block(&mut self, label: &str) -> BlockId {
        let function = self.current_function();
        self.create_block_in(function, label)
    }

    fn position_at_end(&mut self, block: BlockId) {
        let function = self.current_function();
        self.set_insertion_point(Some(InsertPoint { function, block }));
    }

    fn branch(&mut self, target: BlockId) {
        self.terminate(Terminator::Goto(target));
    }

    fn cond_branch(&mut self, cond: Operand, then: BlockId, otherwise: BlockId) {
        self.terminate(Terminator::Branch {
            cond,
            then,
            otherwise,
        });
    }

    fn ret(&mut self, value: Option<Operand>) {
        self.terminate(Terminator::Return(value));
    }
}

/// In-memory [`IrBuilder`] producing a [`Module`].
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    module: Module,
    point: Option<InsertPoint>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: Module::new(name),
            point: None,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    fn function_mut(&mut self, id: FuncId) -> &mut Function {
        match self.module.functions.get_mut(id.index()) {
            Some(function) => function,
            None => crate::ice!("unknown function {}", id),
        }
    }

    fn current_block_mut(&mut self) -> &mut Block {
        let Some(point) = self.point else {
            crate::ice!("no insertion point set");
        };
        let function = self.function_mut(point.function);
        match function.blocks.get_mut(point.block.index()) {
            Some(block) => block,
            None => crate::ice!("unknown block {}", point.block),
        }
    }
}

impl IrBuilder for ModuleBuilder {
    fn create_function(
        &mut self,
        name: &str,
        params: &[(String, Type)],
        ret: Type,
        generator: bool,
    ) -> FuncId {
        let id = FuncId(self.module.functions.len() as u32);
        let locals = params
            .iter()
            .enumerate()
            .map(|(index, (name, ty))| LocalDecl {
                id: LocalId(index as u32),
                name: Some(name.clone()),
                ty: ty.clone(),
            })
            .collect::<Vec<_>>();
        self.module.functions.push(Function {
            id,
            name: name.to_string(),
            params: locals.iter().map(|local| local.id).collect(),
            ret,
            locals,
            blocks: Vec::new(),
            generator,
        });
        tracing::trace!("created function {} ({})", name, id);
        id
    }

    fn function_params(&self, function: FuncId) -> Vec<LocalId> {
        self.module
            .function(function)
            .map(|f| f.params.clone())
            .unwrap_or_default()
    }

    fn create_block_in(&mut self, function: FuncId, label: &str) -> BlockId {
        let function = self.function_mut(function);
        let id = BlockId(function.blocks.len() as u32);
        function.blocks.push(Block {
            id,
            label: label.to_string(),
            instrs: Vec::new(),
            terminator: None,
        });
        id
    }

    fn insertion_point(&self) -> Option<InsertPoint> {
        self.point
    }

    fn set_insertion_point(&mut self, point: Option<InsertPoint>) {
        self.point = point;
    }

    fn create_value(&mut self, ty: Type, name: Option<&str>) -> LocalId {
        let function = self.current_function();
        let function = self.function_mut(function);
        let id = LocalId(function.locals.len() as u32);
        function.locals.push(LocalDecl {
            id,
            name: name.map(str::to_string),
            ty,
        });
        id
    }

    fn value_type(&self, value: LocalId) -> Type {
        let function = self.current_function();
        self.module
            .function(function)
            .and_then(|f| f.local(value))
            .map(|local| local.ty.clone())
            .unwrap_or_else(|| crate::ice!("unknown value {}", value))
    }

    fn append(&mut self, instr: Instr) {
        let block = self.current_block_mut();
        if block.terminator.is_some() {
            crate::ice!("append to terminated block {}", block.id);
        }
        block.instrs.push(instr);
    }

    fn terminate(&mut self, terminator: Terminator) {
        let block = self.current_block_mut();
        if block.terminator.is_some() {
            crate::ice!("block {} terminated twice", block.id);
        }
        block.terminator = Some(terminator);
    }

    fn is_terminated(&self) -> bool {
        let Some(point) = self.point else {
            return false;
        };
        self.module
            .function(point.function)
            .and_then(|f| f.block(point.block))
            .is_some_and(|block| block.terminator.is_some())
    }

    fn declare_global(&mut self, id: GlobalId, name: &str, ty: Type) {
        if self.module.globals.iter().any(|g| g.id == id) {
            return;
        }
        self.module.globals.push(Global {
            id,
            name: name.to_string(),
            ty,
        });
    }

    fn declare_class(&mut self, decl: ClassDecl) {
        if self.module.class(decl.id).is_none() {
            self.module.classes.push(decl);
        }
    }

    fn declare_source(&mut self, decl: SourceDecl) -> u32 {
        self.module.sources.push(decl);
        (self.module.sources.len() - 1) as u32
    }

    fn record_fork(&mut self, fork: ForkPoint) {
        self.module.fork_points.push(fork);
    }

    fn set_entry(&mut self, function: FuncId) {
        self.module.entry = Some(function);
    }

    fn set_args_global(&mut self, global: GlobalId) {
        self.module.args_global = Some(global);
    }
}
