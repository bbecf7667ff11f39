// Engine Errors
// Build-time failures abort resolution; pipeline failures are recorded per pipeline

use crate::address::AddressError;
use crate::config::ParseError;
use crate::filter::FilterError;

use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Structural errors raised before any pipeline runs
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    ConfigParse(#[from] ParseError),

    #[error("{0}")]
    InvalidAddress(#[from] AddressError),

    #[error("{0}")]
    InvalidFilter(#[from] FilterError),

    #[error("unknown component '{path}'")]
    UnknownComponent { path: String },

    #[error("component '{path}' is already registered with a different definition")]
    DuplicateRegistration { path: String },

    #[error("identifier '{identifier}' of '{path}' is already used by '{existing}'")]
    DuplicateIdentifier {
        identifier: String,
        path: String,
        existing: String,
    },

    #[error("invalid registration for '{path}': {reason}")]
    InvalidRegistration { path: String, reason: String },

    #[error("statistic scheme '{address}' is declared more than once")]
    DuplicateStatisticName { address: String },

    #[error("reducer scheme '{address}' is declared more than once")]
    DuplicateReducerScheme { address: String },

    #[error("component '{path}' is a {found}, expected a {expected}")]
    ComponentKindMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("invalid parameters for '{address}': {reason}")]
    InvalidParameters { address: String, reason: String },

    #[error("reducer scheme '{reducer}' admits no statistic scheme")]
    EmptyFilterResult { reducer: String },

    #[error("configuration needs at least one statistic and one reducer, or a reduced statistic")]
    EmptyConfiguration,

    #[error("no component carries all of the labels: {}", .keywords.join(", "))]
    NoLabelMatch { keywords: Vec<String> },

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runtime failure of a single pipeline
///
/// Cloneable because a failed statistic is cached and reported by every
/// pipeline that depends on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("shape mismatch in '{component}': {reason}")]
    ShapeMismatch { component: String, reason: String },

    #[error("'{component}' failed: {message}")]
    Compute { component: String, message: String },

    #[error("pipeline timed out after {0:?}")]
    Timeout(Duration),

    #[error("'{component}' panicked")]
    Panicked { component: String },
}

impl PipelineError {
    pub fn shape_mismatch(component: impl ToString, reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            component: component.to_string(),
            reason: reason.into(),
        }
    }

    pub fn compute(component: impl ToString, message: impl ToString) -> Self {
        Self::Compute {
            component: component.to_string(),
            message: message.to_string(),
        }
    }
}
