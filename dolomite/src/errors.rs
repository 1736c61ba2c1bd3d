use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

/// Wire-level error codes reported back to clients in command results.
///
/// The values mirror the codes a conventional document database server
/// reports for the same failures, so an unmodified client can interpret them.
pub mod codes {
    /// Generic malformed-argument failure (`BadValue`).
    pub const BAD_VALUE: i32 = 2;
    /// A multi-document update was issued without any update operators.
    pub const MULTI_UPDATE_WITHOUT_OPERATORS: i32 = 9;
    /// Duplicate `_id` on insert.
    pub const DUPLICATE_KEY: i32 = 11000;
    /// Malformed `$mod` operand (wrong arity or non-numeric members).
    pub const MALFORMED_MOD: i32 = 16810;
}

/// Error kinds for dolomite operations.
///
/// Each kind names a category of failure so callers can react precisely:
/// per-document write errors, cursor bookkeeping errors and engine-internal
/// failures all travel through the same [DolomiteError] type.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Malformed operator arguments in a filter, update or command document.
    Client,
    /// Duplicate identifier on insert.
    Conflict,
    /// A structural constraint was violated (multi update without operators,
    /// upsert synthesis requiring dot-notation keys).
    Constraint,
    /// An operator or option that this engine does not implement was invoked.
    Unsupported,
    /// A `$where` body was rejected by the identifier deny-list.
    ScriptRejected,
    /// The requested cursor id is not registered.
    CursorNotFound,
    /// Document serialization or deserialization failed.
    Encoding,
    /// The backing key-value store reported a failure.
    Store,
    /// Internal error (usually indicates a bug).
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Client => write!(f, "Client error"),
            ErrorKind::Conflict => write!(f, "Conflict error"),
            ErrorKind::Constraint => write!(f, "Constraint error"),
            ErrorKind::Unsupported => write!(f, "Unsupported operation"),
            ErrorKind::ScriptRejected => write!(f, "Script rejected"),
            ErrorKind::CursorNotFound => write!(f, "Cursor not found"),
            ErrorKind::Encoding => write!(f, "Encoding error"),
            ErrorKind::Store => write!(f, "Store error"),
            ErrorKind::Internal => write!(f, "Internal error"),
        }
    }
}

/// Custom dolomite error type.
///
/// `DolomiteError` carries the error message, kind, an optional numeric wire
/// code (surfaced in `writeErrors` entries) and an optional cause chain with
/// a captured backtrace for debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use dolomite::errors::{DolomiteError, ErrorKind, codes};
///
/// let err = DolomiteError::with_code(
///     "malformed mod, not enough elements",
///     ErrorKind::Client,
///     codes::MALFORMED_MOD,
/// );
/// ```
#[derive(Clone)]
pub struct DolomiteError {
    message: String,
    error_kind: ErrorKind,
    code: Option<i32>,
    cause: Option<Box<DolomiteError>>,
    backtrace: Backtrace,
}

impl DolomiteError {
    /// Creates a new `DolomiteError` with the specified message and kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DolomiteError {
            message: message.to_string(),
            error_kind,
            code: None,
            cause: None,
            backtrace: Backtrace::new(),
        }
    }

    /// Creates a new `DolomiteError` carrying a numeric wire code.
    pub fn with_code(message: &str, error_kind: ErrorKind, code: i32) -> Self {
        DolomiteError {
            message: message.to_string(),
            error_kind,
            code: Some(code),
            cause: None,
            backtrace: Backtrace::new(),
        }
    }

    /// Creates a new `DolomiteError` with a cause error attached.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DolomiteError) -> Self {
        DolomiteError {
            message: message.to_string(),
            error_kind,
            code: cause.code,
            cause: Some(Box::new(cause)),
            backtrace: Backtrace::new(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    /// The numeric wire code for this error, if one applies.
    ///
    /// Kinds with a fixed code fall back to that code when none was set
    /// explicitly.
    pub fn code(&self) -> i32 {
        if let Some(code) = self.code {
            return code;
        }
        match self.error_kind {
            ErrorKind::Conflict => codes::DUPLICATE_KEY,
            ErrorKind::Constraint => codes::MULTI_UPDATE_WITHOUT_OPERATORS,
            _ => codes::BAD_VALUE,
        }
    }

    pub fn cause(&self) -> Option<&DolomiteError> {
        self.cause.as_deref()
    }
}

impl Display for DolomiteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DolomiteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for DolomiteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for dolomite operations.
///
/// `DolomiteResult<T>` is shorthand for `Result<T, DolomiteError>`.
pub type DolomiteResult<T> = Result<T, DolomiteError>;

// From trait implementations for automatic error conversion
impl From<std::io::Error> for DolomiteError {
    fn from(err: std::io::Error) -> Self {
        DolomiteError::new(&format!("IO error: {}", err), ErrorKind::Store)
    }
}

impl From<std::string::FromUtf8Error> for DolomiteError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DolomiteError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::Encoding,
        )
    }
}

impl From<std::num::ParseIntError> for DolomiteError {
    fn from(err: std::num::ParseIntError) -> Self {
        DolomiteError::new(&format!("Integer parsing error: {}", err), ErrorKind::Client)
    }
}

impl From<regex::Error> for DolomiteError {
    fn from(err: regex::Error) -> Self {
        DolomiteError::new(&format!("Invalid regular expression: {}", err), ErrorKind::Client)
    }
}

impl From<String> for DolomiteError {
    fn from(msg: String) -> Self {
        DolomiteError::new(&msg, ErrorKind::Internal)
    }
}

impl From<&str> for DolomiteError {
    fn from(msg: &str) -> Self {
        DolomiteError::new(msg, ErrorKind::Internal)
    }
}
