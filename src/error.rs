//! Error taxonomy for dispatch, execution and gradient generation.
//!
//! Every fallible operation in the crate returns [`Result`], which carries an
//! [`Error`] describing what went wrong with enough context (operator type,
//! engine, arity numbers, blob name) to diagnose without re-running.
//!
//! Engine construction refusals are not part of [`Error`];
//! they are expressed through [`ConstructError::Unsupported`] and are consumed
//! entirely inside [`crate::ops::dispatch`].

use crate::device::DeviceType;

/// All errors that can surface from the runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Declared input or output count falls outside the schema bounds.
    #[error("operator {op_type}: {what} count {got} is outside the allowed range [{min}, {max}]")]
    Arity {
        op_type: String,
        what: &'static str,
        got: usize,
        min: usize,
        max: usize,
    },

    /// An output aliases an input in a way the schema does not allow.
    #[error("operator {op_type}: input {input} and output {output} ({blob}) {reason}")]
    InPlace {
        op_type: String,
        input: usize,
        output: usize,
        blob: String,
        reason: &'static str,
    },

    /// No engine produced an instance and no default implementation exists.
    #[error("no registered implementation for operator {op_type} on {device:?} (engines tried: [{engines}])")]
    NotRegistered {
        op_type: String,
        device: DeviceType,
        engines: String,
    },

    /// An argument exists but holds a different kind than requested.
    #[error("argument {name} does not have the right field: expected {expected}, found {found}")]
    ArgumentKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A blob was read before anything created it.
    #[error("blob {0} has not been created in the workspace")]
    BlobNotFound(String),

    /// A blob exists but its payload is absent or of another type.
    #[error("blob {name} does not hold a value of type {expected}")]
    BlobType { name: String, expected: &'static str },

    /// An engine or default implementation failed to build for a reason other
    /// than declining the configuration.
    #[error("failed to construct operator {op_type} (engine {engine:?}): {source}")]
    Construction {
        op_type: String,
        engine: String,
        #[source]
        source: Box<Error>,
    },

    /// An operator failed while running.
    #[error("operator {op_type} ({name}) failed: {message}")]
    Execution {
        op_type: String,
        name: String,
        message: String,
    },

    /// A gradient was requested for a type with no registered generator.
    #[error("no gradient generator registered for operator {0}")]
    NoGradient(String),

    /// The gradient generator received inconsistent input.
    #[error("gradient for operator {op_type}: {message}")]
    GradientMismatch { op_type: String, message: String },

    /// The net definition names a scheduling model that does not exist.
    #[error("unknown net type {0:?}")]
    UnknownNetType(String),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of an operator factory.
///
/// [`ConstructError::Unsupported`] means "this engine declines to handle the
/// configuration" and makes dispatch try the next candidate. Anything wrapped
/// in [`ConstructError::Failed`] aborts dispatch.
#[derive(Debug, thiserror::Error)]
pub enum ConstructError {
    /// The implementation does not support this operator configuration.
    #[error("unsupported operator feature: {0}")]
    Unsupported(String),

    /// A genuine construction failure.
    #[error(transparent)]
    Failed(#[from] Error),
}

impl ConstructError {
    /// Shorthand for [`ConstructError::Unsupported`].
    pub fn unsupported(reason: impl Into<String>) -> Self {
        ConstructError::Unsupported(reason.into())
    }
}
