use crate::value::{values_equal, Value};
use crate::RuntimeError;
use sq_core::ast::{BinOp, UnOp};
use std::cmp::Ordering;

pub(crate) fn eval_binop(op: BinOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (op, left, right) {
        (BinOp::Add, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(b))),
        (BinOp::Sub, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(b))),
        (BinOp::Mul, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(b))),
        (BinOp::Div | BinOp::Rem, Value::Int(_), Value::Int(0)) => {
            Err(RuntimeError::runtime("integer division by zero"))
        }
        (BinOp::Div, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_div(b))),
        (BinOp::Rem, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_rem(b))),
        (BinOp::Add, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (BinOp::Sub, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
        (BinOp::Mul, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
        (BinOp::Div, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
        (BinOp::Rem, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a % b)),
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (BinOp::Add, Value::Seq(a), Value::Seq(b)) => Ok(Value::Seq(a + &b)),
        (BinOp::Eq, a, b) => Ok(Value::Bool(values_equal(&a, &b))),
        (BinOp::Ne, a, b) => Ok(Value::Bool(!values_equal(&a, &b))),
        (BinOp::And, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a && b)),
        (BinOp::Or, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a || b)),
        (op @ (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge), a, b) => {
            let ordering = compare(&a, &b).ok_or_else(|| {
                RuntimeError::unsupported(format!(
                    "cannot compare {} with {}",
                    a.kind(),
                    b.kind()
                ))
            })?;
            Ok(Value::Bool(match op {
                BinOp::Lt => ordering == Ordering::Less,
                BinOp::Le => ordering != Ordering::Greater,
                BinOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        (op, a, b) => Err(RuntimeError::unsupported(format!(
            "operator `{}` on {} and {}",
            op.symbol(),
            a.kind(),
            b.kind()
        ))),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) | (Value::Seq(a), Value::Seq(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

pub(crate) fn eval_unop(op: UnOp, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnOp::Not, Value::Bool(value)) => Ok(Value::Bool(!value)),
        (UnOp::Neg, Value::Int(value)) => Ok(Value::Int(value.wrapping_neg())),
        (UnOp::Neg, Value::Float(value)) => Ok(Value::Float(-value)),
        (op, value) => Err(RuntimeError::unsupported(format!(
            "unary {:?} on {}",
            op,
            value.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_by_zero_is_a_runtime_error() {
        let result = eval_binop(BinOp::Div, Value::Int(1), Value::Int(0));
        assert!(matches!(result, Err(RuntimeError::Runtime { .. })));
    }

    #[test]
    fn sequences_concatenate_and_compare() -> Result<(), RuntimeError> {
        let joined = eval_binop(BinOp::Add, Value::Seq("AC".into()), Value::Seq("GT".into()))?;
        assert!(matches!(joined, Value::Seq(ref s) if s == "ACGT"));
        let less = eval_binop(BinOp::Lt, Value::Str("a".into()), Value::Str("b".into()))?;
        assert!(matches!(less, Value::Bool(true)));
        Ok(())
    }
}
