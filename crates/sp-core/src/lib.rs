//! Shared primitives used across Splice crates.

use core::fmt;

/// Result alias used across the workspace.
pub type SpliceResult<T> = Result<T, SpliceError>;

/// Coded error shared by every Splice crate.
///
/// `code` is a dotted, stable identifier (`net.url.invalid`, `nav.config.invalid_delay`)
/// that callers match on; `message` is free-form detail for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceError {
    pub code: &'static str,
    pub message: String,
}

impl SpliceError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns true when the error code sits under `prefix` (`"net"`, `"net.http"`).
    pub fn is_in(&self, prefix: &str) -> bool {
        self.code == prefix
            || (self.code.starts_with(prefix)
                && self.code.as_bytes().get(prefix.len()) == Some(&b'.'))
    }
}

impl fmt::Display for SpliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for SpliceError {}
