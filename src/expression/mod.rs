//! Parcel formula language
//!
//! Policy configuration expresses eligibility, subaccount assignment and
//! tier classification as small formulas over parcel attributes. They are
//! parsed into a typed AST at startup and evaluated directly; nothing is
//! executed dynamically.

pub mod ast;
pub mod eval;
mod parser;

pub use ast::{BinOp, EvalError, Expr, ParseError, UnaryOp, Value};
pub use eval::AttributeSource;

/// A formula together with the configuration name it was loaded under
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub name: String,
    pub source: String,
    pub expr: Expr,
}

impl Formula {
    /// Parse a named formula, reporting failures as configuration errors
    pub fn compile(name: &str, source: &str) -> crate::core::Result<Self> {
        let expr = Expr::parse(source).map_err(|e| crate::core::DevsimError::FormulaParse {
            name: name.to_string(),
            source: e,
        })?;
        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            expr,
        })
    }

    pub fn matches(&self, ctx: &dyn AttributeSource) -> crate::core::Result<bool> {
        self.expr
            .eval_bool(ctx)
            .map_err(|e| self.eval_error(e))
    }

    pub fn evaluate(&self, ctx: &dyn AttributeSource) -> crate::core::Result<Value> {
        self.expr.eval(ctx).map_err(|e| self.eval_error(e))
    }

    fn eval_error(&self, source: EvalError) -> crate::core::DevsimError {
        crate::core::DevsimError::FormulaEval {
            name: self.name.clone(),
            source,
        }
    }
}
