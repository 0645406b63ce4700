//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for webpcache.
///
/// - 0: Success (every reference or asset was handled)
/// - 1: General error (configuration, I/O or a failing reference)
/// - 3: Partial success (`warm` or `rewrite --keep-going` with some failures)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: everything was handled.
    Success = 0,
    /// General error: an unexpected error occurred.
    GeneralError = 1,
    /// Partial success: the run finished but some items failed.
    PartialSuccess = 3,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "WC000",
            Self::GeneralError => "WC001",
            Self::PartialSuccess => "WC003",
        }
    }

    /// `PartialSuccess` when `failed > 0`, otherwise `Success`.
    #[must_use]
    pub fn from_failures(failed: usize) -> Self {
        if failed > 0 {
            Self::PartialSuccess
        } else {
            Self::Success
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "WC001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
        }
    }
}
