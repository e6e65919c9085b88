//! Canonical tree to control-flow-graph IR.
//!
//! Every realized function is emitted at most once; recursion terminates
//! because the IR id is recorded before the body is generated.

mod context;
mod expr;
mod stmt;

use crate::realize::{Realized, RealizationCache};
use context::FunctionState;
use sq_core::hir;
use sq_core::id::{ClassHandle, FuncHandle, FuncId, GlobalId, TemplateId};
use sq_core::ir::{ClassDecl, InsertPoint, IrBuilder, Operand, Terminator};
use sq_core::types::Type;
use sq_core::Result;
use std::collections::HashMap;

pub struct CodegenVisitor<'a, B: IrBuilder> {
    builder: &'a mut B,
    cache: &'a RealizationCache,
    emitted: HashMap<FuncHandle, FuncId>,
    state: FunctionState,
}

impl<'a, B: IrBuilder> CodegenVisitor<'a, B> {
    pub fn new(builder: &'a mut B, cache: &'a RealizationCache) -> Self {
        Self {
            builder,
            cache,
            emitted: HashMap::new(),
            state: FunctionState::new(false),
        }
    }

    pub fn builder(&mut self) -> &mut B {
        &mut *self.builder
    }

    pub fn emitted(&self, handle: FuncHandle) -> Option<FuncId> {
        self.emitted.get(&handle).copied()
    }

    pub fn declare_globals(&mut self, globals: &[hir::GlobalDecl], args: GlobalId) {
        for global in globals {
            self.builder
                .declare_global(global.id, &global.name, global.ty.clone());
        }
        self.builder.set_args_global(args);
    }

    /// Creates the module entry function and positions the builder in it.
    pub fn begin_entry(&mut self, name: &str) -> FuncId {
        let id = self.builder.create_function(name, &[], Type::Void, false);
        self.builder.set_entry(id);
        let block = self.builder.create_block_in(id, "entry");
        self.builder
            .set_insertion_point(Some(InsertPoint { function: id, block }));
        self.state = FunctionState::new(false);
        id
    }

    pub fn finish_entry(&mut self) {
        if !self.builder.is_terminated() {
            self.builder.ret(None);
        }
    }

    /// Emits a whole program as the body of the entry function `name`.
    pub fn emit_program(&mut self, name: &str, program: &hir::Program, args: GlobalId) -> Result<FuncId> {
        self.declare_globals(&program.globals, args);
        let entry = self.begin_entry(name);
        self.emit_stmts(&program.body)?;
        self.finish_entry();
        self.emit_all_realized()?;
        Ok(entry)
    }

    /// Emits a stage expression at the current insertion point with `input`
    /// bound to `...`.
    pub fn emit_with_input(&mut self, expr: &hir::Expr, input: Operand) -> Result<Operand> {
        self.state.ellipsis.push(input);
        let result = self.emit_expr(expr);
        self.state.ellipsis.pop();
        result
    }

    /// Emits every realized entity that has not been reached yet.
    pub fn emit_all_realized(&mut self) -> Result<()> {
        let cache = self.cache;
        for realized in cache.realized() {
            match realized {
                Realized::Function(handle) => {
                    self.realize_func(*handle)?;
                }
                Realized::Class(handle) => self.declare_class(*handle),
            }
        }
        Ok(())
    }

    pub fn realize_func(&mut self, handle: FuncHandle) -> Result<FuncId> {
        if let Some(id) = self.emitted.get(&handle) {
            return Ok(*id);
        }
        let cache = self.cache;
        let function = cache.function(handle);
        let Some(body) = &function.body else {
            sq_core::ice!("{} emitted before its body was transformed", function.name);
        };
        let ret = function.ret.clone().unwrap_or(Type::Void);
        let params = function
            .params
            .iter()
            .map(|param| (param.name.clone(), param.ty.clone()))
            .collect::<Vec<_>>();
        let id = self
            .builder
            .create_function(&function.name, &params, ret.clone(), function.generator);
        self.emitted.insert(handle, id);

        let saved_point = self.builder.insertion_point();
        let saved_state = std::mem::replace(&mut self.state, FunctionState::new(function.generator));
        let entry = self.builder.create_block_in(id, "entry");
        self.builder
            .set_insertion_point(Some(InsertPoint { function: id, block: entry }));
        for (param, local) in function.params.iter().zip(self.builder.function_params(id)) {
            self.state.bind(param.var, local);
        }
        let result = self.emit_stmts(body);
        if result.is_ok() && !self.builder.is_terminated() {
            if function.generator || ret.is_void() {
                self.builder.ret(None);
            } else {
                self.builder.terminate(Terminator::Unreachable);
            }
        }
        self.state = saved_state;
        self.builder.set_insertion_point(saved_point);
        result?;
        tracing::debug!("[codegen] emitted function {} -> {}", function.name, id);
        Ok(id)
    }

    fn declare_class(&mut self, handle: ClassHandle) {
        let class = self.cache.class(handle);
        self.builder.declare_class(ClassDecl {
            id: handle,
            name: class.name.clone(),
            fields: class.fields.clone(),
        });
    }

    fn emit_template(&mut self, template: TemplateId) -> Result<()> {
        for handle in self.cache.realizations_of(template) {
            self.realize_func(handle)?;
        }
        Ok(())
    }

    fn emit_class_template(&mut self, template: TemplateId) -> Result<()> {
        let cache = self.cache;
        for handle in cache.class_realizations_of(template) {
            self.declare_class(handle);
        }
        let mut methods = cache
            .class_template(template)
            .methods
            .values()
            .copied()
            .collect::<Vec<_>>();
        methods.sort();
        for method in methods {
            self.emit_template(method)?;
        }
        Ok(())
    }
}
