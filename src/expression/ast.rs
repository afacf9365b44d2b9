//! Expression types and AST for parcel-level policy formulas.
//!
//! Eligibility rules, subaccount assignment and tiered profitability
//! adjustments are configured as formula strings. They are parsed once at
//! startup into this AST and evaluated directly against parcel attributes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Binary operators supported in formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Gt => ">",
            BinOp::Lt => "<",
            BinOp::Gte => ">=",
            BinOp::Lte => "<=",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// A value produced by evaluating a formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
        }
    }

    pub fn from_bool(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal (e.g., 0.15)
    Number(f64),
    /// A quoted text literal (e.g., 'Oakland')
    Text(String),
    /// A parcel attribute reference (e.g., jurisdiction)
    Attr(String),
    /// A binary operation (e.g., left + right)
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// A unary operation (e.g., -x, !flag)
    UnaryOp { op: UnaryOp, operand: Box<Expr> },
    /// A function call (e.g., in(county, 'Marin', 'Napa'))
    Function { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Attribute names referenced anywhere in the expression
    pub fn attributes(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_attributes(&mut names);
        names
    }

    fn collect_attributes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Attr(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::BinOp { left, right, .. } => {
                left.collect_attributes(out);
                right.collect_attributes(out);
            }
            Expr::UnaryOp { operand, .. } => operand.collect_attributes(out),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_attributes(out);
                }
            }
            Expr::Number(_) | Expr::Text(_) => {}
        }
    }
}

/// Failure while evaluating a formula against one parcel
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("parcel has no attribute '{0}'")]
    UnknownAttribute(String),
    #[error("no formula function named '{0}'")]
    UnknownFunction(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("{func}() takes {expected} argument(s), {got} given")]
    InvalidArgCount {
        func: String,
        expected: usize,
        got: usize,
    },
    #[error("'{op}' is not defined for {found} values")]
    TypeMismatch { op: String, found: &'static str },
}

/// Formula text that could not be parsed
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}
