//! Error types
//!
//! Every fallible stack API operation returns [`Result`]. Failures raised by
//! script code are carried as [`ScriptError`] and never abort the process;
//! the remaining variants describe misuse of the API by host code.

use std::fmt;

use thiserror::Error;

use crate::registry::Handle;

/// Built-in error classes an engine error object can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
}

impl ErrorKind {
    /// All error classes, in the order their constructors are installed
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
    ];

    /// The constructor name, which is also the `name` property of instances
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
        }
    }

    /// Look up an error class by constructor name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An exception thrown by script code, or a syntax error in it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct ScriptError {
    /// Error class name (`TypeError`, `SyntaxError`, ...)
    pub name: String,
    /// Engine-provided message
    pub message: String,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ScriptError {
            name: kind.name().to_string(),
            message: message.into(),
        }
    }

    /// The built-in class of this error, if its name is one
    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_name(&self.name)
    }
}

/// Errors returned by the stack API
#[derive(Debug, Error)]
pub enum Error {
    /// Script failed to compile or threw during evaluation
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// A typed getter or a host object downcast hit a different type
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Registry lookup on a handle that was never issued or already released
    #[error("host object {0} not found")]
    NotFound(Handle),

    /// Failure signalled by a host function
    #[error("host function failed: {0}")]
    HostFunction(String),

    /// Stack index outside the current frame
    #[error("invalid stack index {0}")]
    InvalidIndex(i32),

    /// Not enough values in the current frame for the operation
    #[error("stack underflow: need {needed} values, frame has {available}")]
    StackUnderflow { needed: usize, available: usize },

    /// Property operation on a value that is not an object
    #[error("value at index {0} is not an object")]
    NotObject(i32),
}

impl Error {
    /// Error for a host function to return when it wants to fail
    pub fn host(message: impl Into<String>) -> Self {
        Error::HostFunction(message.into())
    }

    pub(crate) fn type_mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// The script error this becomes when it crosses back into script code
    pub fn to_script_error(&self) -> ScriptError {
        match self {
            Error::Script(err) => err.clone(),
            Error::TypeMismatch { .. } | Error::NotObject(_) => {
                ScriptError::new(ErrorKind::TypeError, self.to_string())
            }
            Error::InvalidIndex(_) | Error::StackUnderflow { .. } => {
                ScriptError::new(ErrorKind::RangeError, self.to_string())
            }
            Error::NotFound(_) => ScriptError::new(ErrorKind::ReferenceError, self.to_string()),
            Error::HostFunction(message) => ScriptError::new(ErrorKind::Error, message.clone()),
        }
    }

    /// Borrow the script error, if this is one
    pub fn as_script(&self) -> Option<&ScriptError> {
        match self {
            Error::Script(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for stack API operations
pub type Result<T> = std::result::Result<T, Error>;
