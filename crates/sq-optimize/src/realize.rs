//! Memoized realization of generic functions and classes.
//!
//! Realized entities live in an arena owned by [`RealizationCache`] and are
//! referred to by handle. A slot is allocated as soon as the signature of an
//! entity is known and before its body is transformed, so a body that refers
//! back to its own key (directly or through mutual recursion) finds the
//! in-progress entry instead of recursing forever.

use sq_core::ast;
use sq_core::hir;
use sq_core::id::{ClassHandle, FuncHandle, TemplateId, VarId};
use sq_core::symbols::Declarations;
use sq_core::types::Type;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityId {
    Function(TemplateId),
    /// A method template; bound arguments are those of its class.
    Method(TemplateId),
    Class(TemplateId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RealizationKey {
    pub entity: EntityId,
    pub args: Vec<Type>,
}

impl RealizationKey {
    pub fn new(entity: EntityId, args: Vec<Type>) -> Self {
        Self { entity, args }
    }
}

#[derive(Debug)]
pub struct FunctionTemplate {
    pub id: TemplateId,
    pub def: ast::FuncDef,
    /// Owning class template for methods.
    pub owner: Option<TemplateId>,
    pub generator: bool,
    /// Enclosing declarations the body resolves names through.
    pub scope: Declarations,
}

impl FunctionTemplate {
    pub fn generic_names(&self) -> Vec<String> {
        self.def.generics.iter().map(|g| g.name.clone()).collect()
    }
}

#[derive(Debug)]
pub struct ClassTemplate {
    pub id: TemplateId,
    pub def: ast::ClassDef,
    pub methods: HashMap<String, TemplateId>,
    pub scope: Declarations,
}

impl ClassTemplate {
    pub fn generic_names(&self) -> Vec<String> {
        self.def.generics.iter().map(|g| g.name.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub enum Template {
    Function(Rc<FunctionTemplate>),
    Class(Rc<ClassTemplate>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RealizedParam {
    pub var: VarId,
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RealizedFunction {
    pub handle: FuncHandle,
    pub key: RealizationKey,
    pub name: String,
    pub params: Vec<RealizedParam>,
    /// `None` until declared or inferred from the first return.
    pub ret: Option<Type>,
    /// `None` while the body is being transformed.
    pub body: Option<Vec<hir::Stmt>>,
    pub generator: bool,
}

impl RealizedFunction {
    pub fn func_type(&self) -> Option<Type> {
        let ret = self.ret.clone()?;
        Some(Type::func(
            self.params.iter().map(|p| p.ty.clone()).collect(),
            ret,
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RealizedClass {
    pub handle: ClassHandle,
    pub key: RealizationKey,
    pub name: String,
    pub ty: Type,
    pub fields: Vec<(String, Type)>,
}

impl RealizedClass {
    pub fn field(&self, name: &str) -> Option<(usize, &Type)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, (field, _))| field == name)
            .map(|(index, (_, ty))| (index, ty))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Realized {
    Function(FuncHandle),
    Class(ClassHandle),
}

#[derive(Debug, Default)]
pub struct RealizationCache {
    templates: Vec<Template>,
    functions: Vec<RealizedFunction>,
    classes: Vec<RealizedClass>,
    function_index: HashMap<RealizationKey, FuncHandle>,
    class_index: HashMap<RealizationKey, ClassHandle>,
    order: Vec<Realized>,
}

impl RealizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function_template(
        &mut self,
        def: ast::FuncDef,
        owner: Option<TemplateId>,
        generator: bool,
        scope: Declarations,
    ) -> TemplateId {
        let id = TemplateId(self.templates.len() as u32);
        self.templates.push(Template::Function(Rc::new(FunctionTemplate {
            id,
            def,
            owner,
            generator,
            scope,
        })));
        id
    }

    pub fn add_class_template(
        &mut self,
        def: ast::ClassDef,
        methods: HashMap<String, TemplateId>,
        scope: Declarations,
    ) -> TemplateId {
        let id = TemplateId(self.templates.len() as u32);
        self.templates.push(Template::Class(Rc::new(ClassTemplate {
            id,
            def,
            methods,
            scope,
        })));
        id
    }

    /// Reserves the id a template added next will receive.
    pub fn next_template_id(&self) -> TemplateId {
        TemplateId(self.templates.len() as u32)
    }

    pub fn function_template(&self, id: TemplateId) -> Rc<FunctionTemplate> {
        match self.templates.get(id.index()) {
            Some(Template::Function(template)) => template.clone(),
            _ => sq_core::ice!("{} is not a function template", id),
        }
    }

    pub fn class_template(&self, id: TemplateId) -> Rc<ClassTemplate> {
        match self.templates.get(id.index()) {
            Some(Template::Class(template)) => template.clone(),
            _ => sq_core::ice!("{} is not a class template", id),
        }
    }

    /// Number of bound arguments a key for `entity` must carry.
    pub fn arity(&self, entity: &EntityId) -> usize {
        match entity {
            EntityId::Function(id) => self.function_template(*id).def.generics.len(),
            EntityId::Method(id) => match self.function_template(*id).owner {
                Some(owner) => self.class_template(owner).def.generics.len(),
                None => sq_core::ice!("method template {} has no owner", id),
            },
            EntityId::Class(id) => self.class_template(*id).def.generics.len(),
        }
    }

    fn check_key(&self, key: &RealizationKey) {
        let expected = self.arity(&key.entity);
        if expected != key.args.len() {
            sq_core::ice!(
                "realization key for {:?} carries {} arguments, template declares {}",
                key.entity,
                key.args.len(),
                expected
            );
        }
    }

    pub fn lookup_function(&self, key: &RealizationKey) -> Option<FuncHandle> {
        self.check_key(key);
        self.function_index.get(key).copied()
    }

    pub fn lookup_class(&self, key: &RealizationKey) -> Option<ClassHandle> {
        self.check_key(key);
        self.class_index.get(key).copied()
    }

    /// Allocates the arena slot for a function whose body is not yet known.
    pub fn insert_function(
        &mut self,
        key: RealizationKey,
        name: String,
        params: Vec<RealizedParam>,
        ret: Option<Type>,
        generator: bool,
    ) -> FuncHandle {
        self.check_key(&key);
        if self.function_index.contains_key(&key) {
            sq_core::ice!("{} realized twice", name);
        }
        let handle = FuncHandle(self.functions.len() as u32);
        self.functions.push(RealizedFunction {
            handle,
            key: key.clone(),
            name,
            params,
            ret,
            body: None,
            generator,
        });
        self.function_index.insert(key, handle);
        self.order.push(Realized::Function(handle));
        handle
    }

    pub fn set_return_type(&mut self, handle: FuncHandle, ret: Type) {
        self.function_mut(handle).ret = Some(ret);
    }

    pub fn complete_function(&mut self, handle: FuncHandle, body: Vec<hir::Stmt>, ret: Type) {
        let function = self.function_mut(handle);
        function.body = Some(body);
        function.ret = Some(ret);
    }

    pub fn insert_class(&mut self, key: RealizationKey, name: String, ty: Type) -> ClassHandle {
        self.check_key(&key);
        if self.class_index.contains_key(&key) {
            sq_core::ice!("{} realized twice", name);
        }
        let handle = ClassHandle(self.classes.len() as u32);
        self.classes.push(RealizedClass {
            handle,
            key: key.clone(),
            name,
            ty,
            fields: Vec::new(),
        });
        self.class_index.insert(key, handle);
        self.order.push(Realized::Class(handle));
        handle
    }

    pub fn complete_class(&mut self, handle: ClassHandle, fields: Vec<(String, Type)>) {
        match self.classes.get_mut(handle.index()) {
            Some(class) => class.fields = fields,
            None => sq_core::ice!("unknown class handle {}", handle),
        }
    }

    pub fn function(&self, handle: FuncHandle) -> &RealizedFunction {
        match self.functions.get(handle.index()) {
            Some(function) => function,
            None => sq_core::ice!("unknown function handle {}", handle),
        }
    }

    fn function_mut(&mut self, handle: FuncHandle) -> &mut RealizedFunction {
        match self.functions.get_mut(handle.index()) {
            Some(function) => function,
            None => sq_core::ice!("unknown function handle {}", handle),
        }
    }

    pub fn class(&self, handle: ClassHandle) -> &RealizedClass {
        match self.classes.get(handle.index()) {
            Some(class) => class,
            None => sq_core::ice!("unknown class handle {}", handle),
        }
    }

    /// Every realized entity in realization order.
    pub fn realized(&self) -> &[Realized] {
        &self.order
    }

    pub fn functions(&self) -> impl Iterator<Item = &RealizedFunction> {
        self.functions.iter()
    }

    pub fn classes(&self) -> impl Iterator<Item = &RealizedClass> {
        self.classes.iter()
    }

    /// Realizations of a function template, including methods.
    pub fn realizations_of(&self, template: TemplateId) -> Vec<FuncHandle> {
        self.functions
            .iter()
            .filter(|f| {
                matches!(
                    f.key.entity,
                    EntityId::Function(id) | EntityId::Method(id) if id == template
                )
            })
            .map(|f| f.handle)
            .collect()
    }

    pub fn class_realizations_of(&self, template: TemplateId) -> Vec<ClassHandle> {
        self.classes
            .iter()
            .filter(|c| c.key.entity == EntityId::Class(template))
            .map(|c| c.handle)
            .collect()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sq_core::span::Span;

    fn identity_def() -> ast::FuncDef {
        ast::FuncDef {
            name: "id".into(),
            generics: vec![ast::GenericParam {
                name: "T".into(),
                bound: vec![],
            }],
            params: vec![ast::Param {
                name: "x".into(),
                ty: ast::TypeExpr::name("T"),
            }],
            ret: None,
            body: vec![],
            span: Span::null(),
        }
    }

    #[test]
    fn slot_is_visible_before_completion() {
        let mut cache = RealizationCache::new();
        let tmpl = cache.add_function_template(identity_def(), None, false, Declarations::new());
        let key = RealizationKey::new(EntityId::Function(tmpl), vec![Type::int()]);
        let handle = cache.insert_function(key.clone(), "id[int]".into(), vec![], None, false);
        assert_eq!(cache.lookup_function(&key), Some(handle));
        assert!(cache.function(handle).body.is_none());
        cache.complete_function(handle, vec![], Type::int());
        assert_eq!(cache.function(handle).ret, Some(Type::int()));
        assert_eq!(cache.realizations_of(tmpl), vec![handle]);
    }

    #[test]
    fn distinct_arguments_get_distinct_slots() {
        let mut cache = RealizationCache::new();
        let tmpl = cache.add_function_template(identity_def(), None, false, Declarations::new());
        let int_key = RealizationKey::new(EntityId::Function(tmpl), vec![Type::int()]);
        let bool_key = RealizationKey::new(EntityId::Function(tmpl), vec![Type::bool()]);
        let a = cache.insert_function(int_key, "id[int]".into(), vec![], None, false);
        let b = cache.insert_function(bool_key.clone(), "id[bool]".into(), vec![], None, false);
        assert_ne!(a, b);
        assert_eq!(cache.lookup_function(&bool_key), Some(b));
        assert_eq!(cache.realized().len(), 2);
    }

    #[test]
    #[should_panic(expected = "internal compiler error")]
    fn mismatched_key_arity_is_an_internal_error() {
        let mut cache = RealizationCache::new();
        let tmpl = cache.add_function_template(identity_def(), None, false, Declarations::new());
        let key = RealizationKey::new(EntityId::Function(tmpl), vec![]);
        cache.lookup_function(&key);
    }
}
