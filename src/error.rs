//! Error types for the Ferret library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`FerretError`] enum. Decoding errors raised while walking the index file
//! are never masked: they propagate to the query/result layer, which decides
//! whether to report them (command line) or reset the connection (daemon).
//!
//! # Examples
//!
//! ```
//! use ferret::error::{FerretError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(FerretError::malformed_query("unbalanced parentheses"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// Exit code for a successful run.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for a command-line usage error.
pub const EXIT_USAGE: i32 = 1;
/// Exit code for a query that failed to parse.
pub const EXIT_MALFORMED_QUERY: i32 = 2;
/// Exit code for an index file that could not be read.
pub const EXIT_NO_READ_INDEX: i32 = 3;
/// Exit code for any other failure.
pub const EXIT_OTHER: i32 = 4;

/// The main error type for Ferret operations.
#[derive(Error, Debug)]
pub enum FerretError {
    /// I/O errors (file operations, sockets, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The index file is truncated or one of its tables is malformed.
    #[error("corrupt index: {0}")]
    IndexCorrupt(String),

    /// The query string was rejected by the parser.
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// A daemon client did not send a complete request in time.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A daemon client sent something that is not a request.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A request exceeded a configured bound.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Bad command-line options.
    #[error("usage: {0}")]
    Usage(String),

    /// An option value that could not be used.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for operations that may fail with FerretError.
pub type Result<T> = std::result::Result<T, FerretError>;

impl FerretError {
    /// Create a new corrupt-index error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        FerretError::IndexCorrupt(msg.into())
    }

    /// Create a new malformed-query error.
    pub fn malformed_query<S: Into<String>>(msg: S) -> Self {
        FerretError::MalformedQuery(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        FerretError::Timeout(msg.into())
    }

    /// Create a new protocol-violation error.
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        FerretError::ProtocolViolation(msg.into())
    }

    /// Create a new resource-exhausted error.
    pub fn exhausted<S: Into<String>>(msg: S) -> Self {
        FerretError::ResourceExhausted(msg.into())
    }

    /// Create a new usage error.
    pub fn usage<S: Into<String>>(msg: S) -> Self {
        FerretError::Usage(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        FerretError::InvalidArgument(msg.into())
    }

    /// Process exit code for this error when it ends the command-line tool.
    pub fn exit_code(&self) -> i32 {
        match self {
            FerretError::Usage(_) | FerretError::InvalidArgument(_) => EXIT_USAGE,
            FerretError::MalformedQuery(_) => EXIT_MALFORMED_QUERY,
            FerretError::IndexCorrupt(_) => EXIT_NO_READ_INDEX,
            _ => EXIT_OTHER,
        }
    }

    /// Whether a daemon should answer this error rather than reset the connection.
    pub fn is_reportable(&self) -> bool {
        matches!(self, FerretError::MalformedQuery(_))
    }
}
