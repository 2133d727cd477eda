//! Error types for the agentready-rs library.
//!
//! Analyzers are fault boundaries: most failures degrade a category to
//! `available = false` instead of surfacing here. The variants below cover
//! the remaining, genuinely propagated conditions.

use std::io;

use thiserror::Error;

/// Main result type for agentready operations.
pub type Result<T> = std::result::Result<T, ReadinessError>;

/// Error taxonomy for the analysis-to-score pipeline.
#[derive(Error, Debug)]
pub enum ReadinessError {
    /// I/O related errors (file operations, subprocess plumbing)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Invalid input to an analyzer (no targets, unreadable root)
    #[error("Input error: {message}")]
    Input {
        /// Error description
        message: String,
    },

    /// An expected external tool is absent (git, agent CLI)
    #[error("Environment missing: {tool}")]
    EnvironmentMissing {
        /// The missing tool
        tool: String,
        /// Why it was needed
        reason: Option<String>,
    },

    /// A bounded subprocess deadline elapsed
    #[error("Subprocess timed out after {elapsed_secs:.1}s: {command}")]
    SubprocessTimeout {
        /// The command that timed out
        command: String,
        /// Seconds elapsed before the deadline fired
        elapsed_secs: f64,
    },

    /// A subprocess exited nonzero with no usable output
    #[error("Subprocess failed with status {status:?}: {command}")]
    SubprocessFailure {
        /// The command that failed
        command: String,
        /// Exit status code, if any
        status: Option<i32>,
        /// Trailing stderr for diagnosis
        stderr: String,
    },

    /// Parsing and language processing errors
    #[error("Parse error in {context}: {message}")]
    Parse {
        /// What was being parsed (language, artifact kind)
        context: String,
        /// Error description
        message: String,
        /// File path where the error occurred
        file_path: Option<String>,
    },

    /// Configuration errors (weight sums, breakpoint ordering)
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Judge (LLM adjudicator) errors
    #[error("Judge error: {message}")]
    Judge {
        /// Error description
        message: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
    },
}

impl ReadinessError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new input error
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Create a new environment-missing error
    pub fn environment_missing(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvironmentMissing {
            tool: tool.into(),
            reason: Some(reason.into()),
        }
    }

    /// Create a new subprocess timeout error
    pub fn subprocess_timeout(command: impl Into<String>, elapsed_secs: f64) -> Self {
        Self::SubprocessTimeout {
            command: command.into(),
            elapsed_secs,
        }
    }

    /// Create a new subprocess failure error
    pub fn subprocess_failure(
        command: impl Into<String>,
        status: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::SubprocessFailure {
            command: command.into(),
            status,
            stderr: stderr.into(),
        }
    }

    /// Create a new parse error
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
            file_path: None,
        }
    }

    /// Create a new parse error with file context
    pub fn parse_in_file(
        context: impl Into<String>,
        message: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
            file_path: Some(file_path.into()),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new judge error
    pub fn judge(message: impl Into<String>) -> Self {
        Self::Judge {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error should degrade a category instead of failing a run.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::EnvironmentMissing { .. }
                | Self::SubprocessTimeout { .. }
                | Self::SubprocessFailure { .. }
                | Self::Parse { .. }
                | Self::Judge { .. }
        )
    }
}

impl From<io::Error> for ReadinessError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for ReadinessError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse("json", err.to_string())
    }
}

impl From<serde_yaml::Error> for ReadinessError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::parse("yaml", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ReadinessError::config("weights do not sum to 1.0");
        assert!(matches!(err, ReadinessError::Config { .. }));

        let err = ReadinessError::parse("lcov", "missing DA: records");
        assert!(matches!(err, ReadinessError::Parse { .. }));
    }

    #[test]
    fn test_degradable_classification() {
        assert!(ReadinessError::environment_missing("git", "no repository").is_degradable());
        assert!(ReadinessError::subprocess_timeout("git log", 25.0).is_degradable());
        assert!(!ReadinessError::input("no analysis targets").is_degradable());
        assert!(!ReadinessError::config("bad weights").is_degradable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = ReadinessError::subprocess_failure("claude -p ...", Some(127), "not found");
        let text = err.to_string();
        assert!(text.contains("127"));
        assert!(text.contains("claude"));
    }
}
