//! The three error dispositions of spec §7: `Fatal` (log and exit
//! non-zero), `Recoverable` (warn and continue), and `Invariant`
//! (programming-error abort). Represented as one enum, rather than bare
//! strings, so call sites match on disposition instead of grepping
//! message text -- the reference crate's `diag::DiagnosticClass` plays
//! the analogous role for its own error taxonomy.

use std::fmt;

#[derive(Debug)]
pub enum CgError {
    /// Missing compilation database, allocation failure, or a config-file
    /// syntax error that survived best-effort recovery.
    Fatal { message: String },
    /// An unparseable translation unit, unknown option, malformed option
    /// value, or missing config file -- each of these is logged and the
    /// pipeline continues.
    Recoverable { message: String },
    /// A structural invariant was violated: nested function, a merge that
    /// found two distinct files on a DEFINED, non-DUPLICATED function, or
    /// a buffer-adjust failure. These are bugs, not user errors; the
    /// process aborts.
    Invariant { message: String },
}

impl CgError {
    pub fn recoverable_parse_failure(filename: &str) -> Self {
        CgError::Recoverable {
            message: format!("cannot parse file '{filename}'"),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        CgError::Fatal {
            message: message.into(),
        }
    }

    pub fn recoverable(message: impl Into<String>) -> Self {
        CgError::Recoverable {
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CgError::Fatal { .. })
    }
}

impl fmt::Display for CgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CgError::Fatal { message } => write!(f, "fatal: {message}"),
            CgError::Recoverable { message } => write!(f, "{message}"),
            CgError::Invariant { message } => write!(f, "invariant violation: {message}"),
        }
    }
}

impl std::error::Error for CgError {}
