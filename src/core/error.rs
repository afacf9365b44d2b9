use thiserror::Error;

use crate::allocation::placement::PlacementError;
use crate::expression::{EvalError, ParseError};

#[derive(Error, Debug)]
pub enum DevsimError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Formula '{name}' failed to parse: {source}")]
    FormulaParse {
        name: String,
        #[source]
        source: ParseError,
    },

    #[error("Formula '{name}' failed to evaluate: {source}")]
    FormulaEval {
        name: String,
        #[source]
        source: EvalError,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Placement failed: {0}")]
    Placement(#[from] PlacementError),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, DevsimError>;
