//! Formula evaluation against parcel attributes

use super::ast::{BinOp, EvalError, Expr, UnaryOp, Value};

/// Anything that can resolve attribute names to values
pub trait AttributeSource {
    fn attribute(&self, name: &str) -> Option<Value>;
}

impl AttributeSource for ahash::AHashMap<String, Value> {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Expr {
    /// Evaluate the expression against an attribute source
    pub fn eval(&self, ctx: &dyn AttributeSource) -> Result<Value, EvalError> {
        match self {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Text(s) => Ok(Value::Text(s.clone())),
            Expr::Attr(name) => ctx
                .attribute(name)
                .ok_or_else(|| EvalError::UnknownAttribute(name.clone())),
            Expr::UnaryOp { op, operand } => {
                let v = operand.eval(ctx)?;
                match op {
                    UnaryOp::Neg => Ok(Value::Number(-as_number(&v, "-")?)),
                    UnaryOp::Not => Ok(Value::from_bool(!truthy(&v, "!")?)),
                }
            }
            Expr::BinOp { op, left, right } => eval_binary(*op, left, right, ctx),
            Expr::Function { name, args } => eval_function(name, args, ctx),
        }
    }

    /// Evaluate as a boolean predicate (non-zero numbers are true)
    pub fn eval_bool(&self, ctx: &dyn AttributeSource) -> Result<bool, EvalError> {
        let v = self.eval(ctx)?;
        truthy(&v, "predicate")
    }

    /// Evaluate as a number
    pub fn eval_number(&self, ctx: &dyn AttributeSource) -> Result<f64, EvalError> {
        let v = self.eval(ctx)?;
        as_number(&v, "numeric formula")
    }
}

fn as_number(v: &Value, op: &str) -> Result<f64, EvalError> {
    match v {
        Value::Number(n) => Ok(*n),
        other => Err(EvalError::TypeMismatch {
            op: op.to_string(),
            found: other.type_name(),
        }),
    }
}

fn truthy(v: &Value, op: &str) -> Result<bool, EvalError> {
    as_number(v, op).map(|n| n != 0.0 && !n.is_nan())
}

fn eval_binary(
    op: BinOp,
    left: &Expr,
    right: &Expr,
    ctx: &dyn AttributeSource,
) -> Result<Value, EvalError> {
    // Short-circuit so guarded lookups like `has_x && x > 0` work
    match op {
        BinOp::And => {
            if !truthy(&left.eval(ctx)?, op.symbol())? {
                return Ok(Value::from_bool(false));
            }
            return Ok(Value::from_bool(truthy(&right.eval(ctx)?, op.symbol())?));
        }
        BinOp::Or => {
            if truthy(&left.eval(ctx)?, op.symbol())? {
                return Ok(Value::from_bool(true));
            }
            return Ok(Value::from_bool(truthy(&right.eval(ctx)?, op.symbol())?));
        }
        _ => {}
    }

    let l = left.eval(ctx)?;
    let r = right.eval(ctx)?;

    match op {
        BinOp::Eq => Ok(Value::from_bool(values_equal(&l, &r, op)?)),
        BinOp::Neq => Ok(Value::from_bool(!values_equal(&l, &r, op)?)),
        _ => {
            let a = as_number(&l, op.symbol())?;
            let b = as_number(&r, op.symbol())?;
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => {
                    if b == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    a / b
                }
                BinOp::Gt => return Ok(Value::from_bool(a > b)),
                BinOp::Lt => return Ok(Value::from_bool(a < b)),
                BinOp::Gte => return Ok(Value::from_bool(a >= b)),
                BinOp::Lte => return Ok(Value::from_bool(a <= b)),
                BinOp::Eq | BinOp::Neq | BinOp::And | BinOp::Or => unreachable!(),
            };
            Ok(Value::Number(result))
        }
    }
}

fn values_equal(l: &Value, r: &Value, op: BinOp) -> Result<bool, EvalError> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => Ok(a == b),
        (Value::Text(a), Value::Text(b)) => Ok(a == b),
        (_, other) => Err(EvalError::TypeMismatch {
            op: op.symbol().to_string(),
            found: other.type_name(),
        }),
    }
}

fn expect_args(name: &str, args: &[Expr], expected: usize) -> Result<(), EvalError> {
    if args.len() != expected {
        return Err(EvalError::InvalidArgCount {
            func: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn eval_function(name: &str, args: &[Expr], ctx: &dyn AttributeSource) -> Result<Value, EvalError> {
    match name {
        "min" | "max" => {
            expect_args(name, args, 2)?;
            let a = args[0].eval_number(ctx)?;
            let b = args[1].eval_number(ctx)?;
            Ok(Value::Number(if name == "min" { a.min(b) } else { a.max(b) }))
        }
        "abs" => {
            expect_args(name, args, 1)?;
            Ok(Value::Number(args[0].eval_number(ctx)?.abs()))
        }
        "floor" => {
            expect_args(name, args, 1)?;
            Ok(Value::Number(args[0].eval_number(ctx)?.floor()))
        }
        // in(x, a, b, ...) is true when x equals any listed value
        "in" => {
            if args.len() < 2 {
                return Err(EvalError::InvalidArgCount {
                    func: name.to_string(),
                    expected: 2,
                    got: args.len(),
                });
            }
            let needle = args[0].eval(ctx)?;
            for candidate in &args[1..] {
                if values_equal(&needle, &candidate.eval(ctx)?, BinOp::Eq)? {
                    return Ok(Value::from_bool(true));
                }
            }
            Ok(Value::from_bool(false))
        }
        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}
