use std::path::PathBuf;

use thiserror::Error;

use crate::analytics::AnalysisKind;
use crate::graph::Scope;

/// A source row that could not be turned into a `TaxRecord`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InputError {
    #[error("line {line}: missing value in column '{column}'")]
    MissingField { line: u64, column: String },

    #[error("line {line}: cannot parse year '{value}'")]
    InvalidYear { line: u64, value: String },

    #[error("line {line}: malformed row: {reason}")]
    Malformed { line: u64, reason: String },
}

/// Invariant violations raised while building a graph.
#[derive(Debug, Error)]
pub enum GraphConstructionError {
    #[error("{scope}: edge {left} -- {right} joins two nodes of the same class (record {record})")]
    SameClassEdge {
        scope: Scope,
        left: String,
        right: String,
        record: String,
    },

    #[error("{scope}: non-finite weight {weight} for record {record}")]
    NonFiniteWeight {
        scope: Scope,
        weight: f64,
        record: String,
    },
}

/// An analysis that cannot run on a particular graph. Not fatal.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind} skipped: {reason}")]
pub struct AnalysisSkipped {
    pub kind: AnalysisKind,
    pub reason: String,
}

impl AnalysisSkipped {
    pub fn new(kind: AnalysisKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
