//! Tree-walking evaluator.

use super::ast::{BinaryOp, Expr, Function, UnaryOp, ValueAccessor};
use super::EvalContext;
use crate::error::{CoreObjectsError, CoreResult};
use crate::property::Property;
use crate::value::Value;

/// Result of evaluating a node: a plain value or a property handle produced
/// by a `%Name` reference.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    Property(Property),
}

impl Operand {
    pub fn into_value(self) -> CoreResult<Value> {
        match self {
            Operand::Value(v) => Ok(v),
            Operand::Property(p) => Err(CoreObjectsError::ConversionFailed(format!(
                "property reference '%{}' used where a value is expected",
                p.name()
            ))),
        }
    }
}

pub fn evaluate(expr: &Expr, ctx: &dyn EvalContext) -> CoreResult<Operand> {
    match expr {
        Expr::Literal(v) => Ok(Operand::Value(v.clone())),
        Expr::List(items) => {
            let values = items
                .iter()
                .map(|item| evaluate(item, ctx)?.into_value())
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(Operand::Value(Value::List(values)))
        }
        Expr::ProposedValue => ctx.proposed_value().map(Operand::Value).ok_or_else(|| {
            CoreObjectsError::NotFound("'value' is only bound inside coercers and validators".into())
        }),
        Expr::PropertyValue { path, accessor } => {
            let value = match accessor {
                ValueAccessor::Value => ctx.property_value(path)?,
                ValueAccessor::SelectedValue => ctx.property_selection_value(path)?,
            };
            Ok(Operand::Value(value))
        }
        Expr::PropertyReference { name, as_value } => {
            if *as_value {
                Ok(Operand::Value(ctx.property_value(name)?))
            } else {
                Ok(Operand::Property(ctx.property(name)?))
            }
        }
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, ctx)?.into_value()?;
            unary(*op, &v).map(Operand::Value)
        }
        Expr::Binary { op, lhs, rhs } => match op {
            BinaryOp::And => {
                let l = evaluate(lhs, ctx)?.into_value()?;
                if !l.is_truthy() {
                    return Ok(Operand::Value(Value::Bool(false)));
                }
                let r = evaluate(rhs, ctx)?.into_value()?;
                Ok(Operand::Value(Value::Bool(r.is_truthy())))
            }
            BinaryOp::Or => {
                let l = evaluate(lhs, ctx)?.into_value()?;
                if l.is_truthy() {
                    return Ok(Operand::Value(Value::Bool(true)));
                }
                let r = evaluate(rhs, ctx)?.into_value()?;
                Ok(Operand::Value(Value::Bool(r.is_truthy())))
            }
            _ => {
                let l = evaluate(lhs, ctx)?.into_value()?;
                let r = evaluate(rhs, ctx)?.into_value()?;
                binary(*op, &l, &r).map(Operand::Value)
            }
        },
        Expr::Call { function, args } => call(*function, args, ctx),
    }
}

fn mismatch(op: &str, l: &Value, r: &Value) -> CoreObjectsError {
    CoreObjectsError::ConversionFailed(format!(
        "operator '{}' not defined for {} and {}",
        op,
        l.core_type(),
        r.core_type()
    ))
}

fn unary(op: UnaryOp, v: &Value) -> CoreResult<Value> {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Negate, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| CoreObjectsError::OutOfRange("integer negation overflow".into())),
        (UnaryOp::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Negate, other) => Err(CoreObjectsError::ConversionFailed(format!(
            "cannot negate {}",
            other.core_type()
        ))),
    }
}

/// Numeric operands as either both-int or both-float.
enum Numeric {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn numeric(l: &Value, r: &Value) -> Option<Numeric> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(Numeric::Ints(*a, *b)),
        (Value::Bool(_), _) | (_, Value::Bool(_)) => None,
        _ => Some(Numeric::Floats(l.as_float()?, r.as_float()?)),
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> CoreResult<Value> {
    let symbol = op.symbol();
    match op {
        BinaryOp::Add => {
            if let (Value::String(_), _) | (_, Value::String(_)) = (l, r) {
                return Ok(Value::String(format!("{}{}", l, r)));
            }
            match numeric(l, r).ok_or_else(|| mismatch(symbol, l, r))? {
                Numeric::Ints(a, b) => a
                    .checked_add(b)
                    .map(Value::Int)
                    .ok_or_else(|| CoreObjectsError::OutOfRange("integer overflow".into())),
                Numeric::Floats(a, b) => Ok(Value::Float(a + b)),
            }
        }
        BinaryOp::Subtract => match numeric(l, r).ok_or_else(|| mismatch(symbol, l, r))? {
            Numeric::Ints(a, b) => a
                .checked_sub(b)
                .map(Value::Int)
                .ok_or_else(|| CoreObjectsError::OutOfRange("integer overflow".into())),
            Numeric::Floats(a, b) => Ok(Value::Float(a - b)),
        },
        BinaryOp::Multiply => match numeric(l, r).ok_or_else(|| mismatch(symbol, l, r))? {
            Numeric::Ints(a, b) => a
                .checked_mul(b)
                .map(Value::Int)
                .ok_or_else(|| CoreObjectsError::OutOfRange("integer overflow".into())),
            Numeric::Floats(a, b) => Ok(Value::Float(a * b)),
        },
        BinaryOp::Divide => match numeric(l, r).ok_or_else(|| mismatch(symbol, l, r))? {
            Numeric::Ints(_, 0) => Err(CoreObjectsError::InvalidParameter(
                "integer division by zero".into(),
            )),
            Numeric::Ints(a, b) => match a.checked_rem(b) {
                Some(0) => a
                    .checked_div(b)
                    .map(Value::Int)
                    .ok_or_else(|| CoreObjectsError::OutOfRange("integer overflow".into())),
                Some(_) => Ok(Value::Float(a as f64 / b as f64)),
                None => Err(CoreObjectsError::OutOfRange("integer overflow".into())),
            },
            Numeric::Floats(a, b) => Ok(Value::Float(a / b)),
        },
        BinaryOp::Equal => Ok(Value::Bool(loosely_equal(l, r))),
        BinaryOp::NotEqual => Ok(Value::Bool(!loosely_equal(l, r))),
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            let ordering = match (l, r) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                _ => match numeric(l, r).ok_or_else(|| mismatch(symbol, l, r))? {
                    Numeric::Ints(a, b) => a.partial_cmp(&b),
                    Numeric::Floats(a, b) => a.partial_cmp(&b),
                },
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            let result = match op {
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEq => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(match op {
            BinaryOp::And => l.is_truthy() && r.is_truthy(),
            _ => l.is_truthy() || r.is_truthy(),
        })),
    }
}

/// Equality that treats Int and Float as comparable numbers.
pub fn loosely_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            l.as_float() == r.as_float()
        }
        (Value::Enumeration(e), Value::String(s)) | (Value::String(s), Value::Enumeration(e)) => {
            e.name() == s
        }
        _ => l == r,
    }
}

fn call(function: Function, args: &[Expr], ctx: &dyn EvalContext) -> CoreResult<Operand> {
    match function {
        Function::If => {
            let condition = evaluate(&args[0], ctx)?.into_value()?;
            if condition.is_truthy() {
                evaluate(&args[1], ctx)
            } else {
                evaluate(&args[2], ctx)
            }
        }
        Function::Switch => {
            let subject = evaluate(&args[0], ctx)?.into_value()?;
            for pair in args[1..].chunks(2) {
                match pair {
                    [key, result] => {
                        let key = evaluate(key, ctx)?.into_value()?;
                        if loosely_equal(&subject, &key) {
                            return evaluate(result, ctx);
                        }
                    }
                    [default] => return evaluate(default, ctx),
                    _ => {}
                }
            }
            Err(CoreObjectsError::NotFound(format!(
                "switch has no case for {}",
                subject
            )))
        }
        Function::Min | Function::Max => {
            let a = evaluate(&args[0], ctx)?.into_value()?;
            let b = evaluate(&args[1], ctx)?.into_value()?;
            let a_less = binary(BinaryOp::Less, &a, &b)?.is_truthy();
            let pick_a = if function == Function::Min { a_less } else { !a_less };
            Ok(Operand::Value(if pick_a { a } else { b }))
        }
        Function::Abs => match evaluate(&args[0], ctx)?.into_value()? {
            Value::Int(i) => Ok(Operand::Value(Value::Int(i.saturating_abs()))),
            Value::Float(f) => Ok(Operand::Value(Value::Float(f.abs()))),
            other => Err(CoreObjectsError::ConversionFailed(format!(
                "abs() not defined for {}",
                other.core_type()
            ))),
        },
        Function::Round => match evaluate(&args[0], ctx)?.into_value()? {
            Value::Int(i) => Ok(Operand::Value(Value::Int(i))),
            Value::Float(f) if f.is_finite() => Ok(Operand::Value(Value::Int(f.round() as i64))),
            other => Err(CoreObjectsError::ConversionFailed(format!(
                "round() not defined for {}",
                other.core_type()
            ))),
        },
    }
}
