use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};
use thiserror::Error;

/// Hard failures: malformed input data, configuration or I/O. These abort a
/// call, unlike per-construct quoting failures which end up in the error map
/// of a batch result.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Invalid assembly method '{0}' (expected gibson, golden_gate or any_method)")]
    InvalidMethod(String),

    #[error("Construct '{construct}' references part '{part}' which is not in the parts catalog")]
    MissingPart { construct: String, part: String },

    #[error("Invalid nucleotide '{letter}' at position {position}")]
    InvalidSequence { position: usize, letter: char },

    #[error("Unknown Golden Gate enzyme '{0}'")]
    UnknownEnzyme(String),

    #[error("Invalid design: {0}")]
    InvalidDesign(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Unsupported,
    Internal,
}

/// A fault raised by a quoting engine while pricing one sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteError {
    pub code: ErrorCode,
    pub message: String,
}

impl QuoteError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for QuoteError {}
