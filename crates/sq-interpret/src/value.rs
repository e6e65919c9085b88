use itertools::Itertools;
use sq_core::id::{ClassHandle, FuncId, LocalId};
use sq_core::ir::{Constant, Module};
use sq_core::types::{AtomicKind, SeqKind, Type};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(String),
    /// Arrays are shared by reference, like class objects.
    Array(Rc<RefCell<Vec<Value>>>),
    Record(Vec<Value>),
    Object(Rc<RefCell<Object>>),
    Ptr(Pointer),
    Func(FuncId),
}

#[derive(Debug, Clone)]
pub struct Object {
    pub class: ClassHandle,
    pub fields: Vec<Value>,
}

/// Address of a local in a live frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pointer {
    pub frame: usize,
    pub local: LocalId,
}

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(class: ClassHandle, fields: Vec<Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(Object { class, fields })))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Seq(_) => "seq",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Object(_) => "object",
            Value::Ptr(_) => "ptr",
            Value::Func(_) => "function",
        }
    }

    /// Zero value of a slot of type `ty`.
    pub fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Atomic(AtomicKind::Int) | Type::Atomic(AtomicKind::Byte) => Value::Int(0),
            Type::Atomic(AtomicKind::Float) => Value::Float(0.0),
            Type::Atomic(AtomicKind::Bool) => Value::Bool(false),
            Type::Sequence(SeqKind::Str) => Value::Str(String::new()),
            Type::Sequence(SeqKind::Seq) => Value::Seq(String::new()),
            Type::Array(_) => Value::array(Vec::new()),
            Type::Record(items) => Value::Record(items.iter().map(Value::default_for).collect()),
            _ => Value::Unit,
        }
    }
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Unit => Value::Unit,
            Constant::Bool(value) => Value::Bool(*value),
            Constant::Int(value) => Value::Int(*value),
            Constant::Float(value) => Value::Float(*value),
            Constant::Str(value) => Value::Str(value.clone()),
            Constant::Seq(value) => Value::Seq(value.clone()),
        }
    }
}

pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Unit, Value::Unit) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Str(a), Value::Str(b)) | (Value::Seq(a), Value::Seq(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            Rc::ptr_eq(a, b) || {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
            }
        }
        (Value::Record(a), Value::Record(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        (Value::Ptr(a), Value::Ptr(b)) => a == b,
        (Value::Func(a), Value::Func(b)) => a == b,
        _ => false,
    }
}

/// Text written by `print` and produced by `str`.
pub fn render_value(value: &Value, module: &Module) -> String {
    match value {
        Value::Unit => "()".to_string(),
        Value::Bool(value) => value.to_string(),
        Value::Int(value) => value.to_string(),
        Value::Float(value) if value.is_finite() && value.fract() == 0.0 => format!("{:.1}", value),
        Value::Float(value) => value.to_string(),
        Value::Str(value) | Value::Seq(value) => value.clone(),
        Value::Array(items) => format!(
            "[{}]",
            items.borrow().iter().map(|item| render_value(item, module)).join(", ")
        ),
        Value::Record(items) => format!(
            "({})",
            items.iter().map(|item| render_value(item, module)).join(", ")
        ),
        Value::Object(object) => {
            let object = object.borrow();
            let name = module
                .class(object.class)
                .map(|class| class.name.clone())
                .unwrap_or_else(|| object.class.to_string());
            let fields = module.class(object.class).map(|class| &class.fields);
            let rendered = object
                .fields
                .iter()
                .enumerate()
                .map(|(index, value)| {
                    let field = fields
                        .and_then(|fields| fields.get(index))
                        .map(|(name, _)| name.as_str())
                        .unwrap_or("?");
                    format!("{}={}", field, render_value(value, module))
                })
                .join(", ");
            format!("{}({})", name, rendered)
        }
        Value::Ptr(pointer) => format!("<ptr {}@{}>", pointer.local, pointer.frame),
        Value::Func(id) => format!("<function {}>", id),
    }
}
