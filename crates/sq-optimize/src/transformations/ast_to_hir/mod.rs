//! Raw syntax tree to canonical tree.
//!
//! Identifiers are resolved against the [`SymbolTable`], generic references
//! are realized through the [`RealizationCache`] and every expression is
//! assigned its type.

mod calls;
mod expr;
mod stmt;
mod types;

pub use types::TypeEnv;

use crate::realize::RealizationCache;
use itertools::Itertools;
use sq_core::ast;
use sq_core::hir;
use sq_core::id::{FuncHandle, GlobalId, IdAllocator, TemplateId, VarId};
use sq_core::span::Span;
use sq_core::symbols::{Binding, SymbolEntry, SymbolTable, Variable};
use sq_core::types::{Type, TypeRegistry};
use sq_core::Result;

/// Nesting limit for realizations in progress. Polymorphic recursion such as
/// `f[T]` calling `f[array[T]]` would otherwise never reach a cached key.
pub const MAX_REALIZATION_DEPTH: usize = 64;

pub const ARGS_GLOBAL: &str = "args";

#[derive(Debug)]
struct FunctionFrame {
    handle: FuncHandle,
    name: String,
    ret: Option<Type>,
    generator: bool,
}

/// Valid targets for `break`/`continue` and `return`/`yield`.
#[derive(Debug)]
struct TargetContext {
    loop_depth: usize,
    function: Option<FunctionFrame>,
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    Function(TemplateId),
    Class(TemplateId),
}

pub struct Transformer {
    pub(crate) registry: TypeRegistry,
    pub(crate) symbols: SymbolTable,
    pub(crate) cache: RealizationCache,
    globals: Vec<hir::GlobalDecl>,
    vars: IdAllocator,
    contexts: Vec<TargetContext>,
    /// Types of the values `...` refers to, innermost last.
    ellipsis: Vec<Type>,
    /// Generic parameters bound for the realization being transformed.
    type_envs: Vec<TypeEnv>,
    depth: usize,
    pending: Vec<Pending>,
    args_global: GlobalId,
}

impl Transformer {
    pub fn new(registry: TypeRegistry) -> Self {
        let mut transformer = Self {
            registry,
            symbols: SymbolTable::new(),
            cache: RealizationCache::new(),
            globals: Vec::new(),
            vars: IdAllocator::new(),
            contexts: vec![TargetContext {
                loop_depth: 0,
                function: None,
            }],
            ellipsis: Vec::new(),
            type_envs: vec![TypeEnv::new()],
            depth: 0,
            pending: Vec::new(),
            args_global: GlobalId(0),
        };
        transformer.args_global = transformer.declare_global(ARGS_GLOBAL, Type::array(Type::str()));
        transformer
    }

    pub fn cache(&self) -> &RealizationCache {
        &self.cache
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn globals(&self) -> &[hir::GlobalDecl] {
        &self.globals
    }

    pub fn args_global(&self) -> GlobalId {
        self.args_global
    }

    pub fn lookup_global(&self, name: &str) -> Option<(GlobalId, Type)> {
        match self.symbols.lookup_root(name) {
            Some(SymbolEntry::Variable(Variable {
                ty,
                binding: Binding::Global(id),
            })) => Some((*id, ty.clone())),
            _ => None,
        }
    }

    /// Declares a module global in the root scope, replacing any previous
    /// root binding of the name.
    pub fn declare_global(&mut self, name: &str, ty: Type) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(hir::GlobalDecl {
            id,
            name: name.to_string(),
            ty: ty.clone(),
        });
        self.symbols.define_root(
            name,
            SymbolEntry::Variable(Variable {
                ty,
                binding: Binding::Global(id),
            }),
        );
        id
    }

    pub fn transform_program(&mut self, program: &ast::Program) -> Result<hir::Program> {
        let body = self.transform_stmts(&program.body)?;
        self.finish_pending()?;
        Ok(hir::Program {
            globals: self.globals.clone(),
            body,
        })
    }

    /// Transforms a stage expression in which `...` denotes a value of type
    /// `input`.
    pub fn transform_with_input(&mut self, expr: &ast::Expr, input: &Type) -> Result<hir::Expr> {
        self.ellipsis.push(input.clone());
        let result = self.scoped(|this| this.transform_expr(expr));
        self.ellipsis.pop();
        let expr = result?;
        self.finish_pending()?;
        Ok(expr)
    }

    /// Like [`Self::transform_with_input`], but with pipe-stage rewriting: an
    /// expression that does not mention `...` is applied to the input.
    pub fn transform_stage(&mut self, stage: &ast::Expr, input: &Type) -> Result<hir::Expr> {
        self.transform_with_input(&expr::pipe_stage_call(stage), input)
    }

    /// Transforms an expression evaluated where no value flows, so `...`
    /// is rejected.
    pub fn transform_without_input(&mut self, expr: &ast::Expr) -> Result<hir::Expr> {
        let expr = self.scoped(|this| this.transform_expr(expr))?;
        self.finish_pending()?;
        Ok(expr)
    }

    /// Realizes every non-generic function and class declared so far so that
    /// bodies never called are still checked and emitted.
    pub fn finish_pending(&mut self) -> Result<()> {
        while let Some(pending) = self.pending.pop() {
            match pending {
                Pending::Function(template) => {
                    let span = self.cache.function_template(template).def.span;
                    self.realize_function(template, Vec::new(), span)?;
                }
                Pending::Class(template) => {
                    let class = self.cache.class_template(template);
                    let handle = self.realize_class(template, Vec::new(), class.def.span)?;
                    let ty = self.cache.class(handle).ty.clone();
                    for method in class.methods.values().copied().sorted() {
                        self.realize_method(method, &ty, class.def.span)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.symbols.push_scope();
        let result = f(self);
        self.symbols.pop_scope();
        result
    }

    pub(crate) fn fresh_var(&mut self) -> VarId {
        self.vars.next()
    }

    /// Binds a new local in the innermost scope.
    pub(crate) fn declare_local(&mut self, name: &str, ty: Type) -> VarId {
        let var = self.fresh_var();
        self.symbols.define(
            name,
            SymbolEntry::Variable(Variable {
                ty,
                binding: Binding::Local(var),
            }),
        );
        var
    }

    /// Root-scope bindings outside any function become globals.
    pub(crate) fn declare_binding(&mut self, name: &str, ty: Type) -> Binding {
        if self.symbols.is_root() && self.current_function().is_none() {
            Binding::Global(self.declare_global(name, ty))
        } else {
            Binding::Local(self.declare_local(name, ty))
        }
    }

    fn context(&self) -> &TargetContext {
        match self.contexts.last() {
            Some(context) => context,
            None => sq_core::ice!("empty target context stack"),
        }
    }

    fn context_mut(&mut self) -> &mut TargetContext {
        match self.contexts.last_mut() {
            Some(context) => context,
            None => sq_core::ice!("empty target context stack"),
        }
    }

    fn current_function(&self) -> Option<&FunctionFrame> {
        self.context().function.as_ref()
    }

    fn current_function_mut(&mut self) -> Option<&mut FunctionFrame> {
        self.context_mut().function.as_mut()
    }

    pub(crate) fn in_loop(&self) -> bool {
        self.context().loop_depth > 0
    }

    pub(crate) fn with_loop<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.context_mut().loop_depth += 1;
        let result = f(self);
        self.context_mut().loop_depth -= 1;
        result
    }

    pub(crate) fn ellipsis_type(&self) -> Option<&Type> {
        self.ellipsis.last()
    }

    pub(crate) fn with_ellipsis<T>(
        &mut self,
        ty: Type,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.ellipsis.push(ty);
        let result = f(self);
        self.ellipsis.pop();
        result
    }

    pub(crate) fn type_env(&self) -> &TypeEnv {
        match self.type_envs.last() {
            Some(env) => env,
            None => sq_core::ice!("empty type environment stack"),
        }
    }

    fn enter_realization(&mut self, name: &str, span: Span) -> Result<()> {
        if self.depth >= MAX_REALIZATION_DEPTH {
            sq_core::structural!(
                span,
                "realization depth limit of {} exceeded while realizing `{}`",
                MAX_REALIZATION_DEPTH,
                name
            );
        }
        self.depth += 1;
        Ok(())
    }

    fn leave_realization(&mut self) {
        self.depth -= 1;
    }
}

/// True if the body yields, not counting nested definitions.
pub(crate) fn contains_yield(stmts: &[ast::Stmt]) -> bool {
    stmts.iter().any(stmt_yields)
}

fn stmt_yields(stmt: &ast::Stmt) -> bool {
    use ast::StmtKind;
    match &stmt.kind {
        StmtKind::Yield(_) => true,
        StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::FuncDef(_)
        | StmtKind::ClassDef(_) => false,
        StmtKind::Expr(expr) | StmtKind::Throw(expr) => expr_yields(expr),
        StmtKind::Assign { value, .. } | StmtKind::Update { value, .. } => expr_yields(value),
        StmtKind::AssignMember { base, value, .. } => expr_yields(base) || expr_yields(value),
        StmtKind::AssignIndex { base, index, value } => {
            expr_yields(base) || expr_yields(index) || expr_yields(value)
        }
        StmtKind::AssignDeref { target, value } => expr_yields(target) || expr_yields(value),
        StmtKind::Return(value) => value.as_ref().is_some_and(expr_yields),
        StmtKind::Block(body) => contains_yield(body),
        StmtKind::If { branches, otherwise } => {
            branches
                .iter()
                .any(|b| expr_yields(&b.cond) || contains_yield(&b.body))
                || otherwise.as_deref().is_some_and(contains_yield)
        }
        StmtKind::While { cond, body } => expr_yields(cond) || contains_yield(body),
        StmtKind::For { iter, body, .. } => expr_yields(iter) || contains_yield(body),
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            contains_yield(body)
                || catches.iter().any(|c| contains_yield(&c.body))
                || finally.as_deref().is_some_and(contains_yield)
        }
    }
}

fn expr_yields(expr: &ast::Expr) -> bool {
    use ast::ExprKind;
    match &expr.kind {
        ExprKind::Yield(_) => true,
        ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::Seq(_)
        | ExprKind::Ident(_)
        | ExprKind::Instantiate { .. }
        | ExprKind::Ptr(_)
        | ExprKind::Ellipsis => false,
        ExprKind::Call { callee, args } => expr_yields(callee) || args.iter().any(expr_yields),
        ExprKind::Dot { base, .. } => expr_yields(base),
        ExprKind::Index { base, index } => expr_yields(base) || expr_yields(index),
        ExprKind::Binary { lhs, rhs, .. } => expr_yields(lhs) || expr_yields(rhs),
        ExprKind::Unary { operand, .. } => expr_yields(operand),
        ExprKind::Cond {
            cond,
            then,
            otherwise,
        } => expr_yields(cond) || expr_yields(then) || expr_yields(otherwise),
        ExprKind::Array(items) | ExprKind::Record(items) | ExprKind::Pipe(items) => {
            items.iter().any(expr_yields)
        }
        ExprKind::StackAlloc { len, .. } => expr_yields(len),
        ExprKind::StmtExpr { stmts, value } => contains_yield(stmts) || expr_yields(value),
    }
}
