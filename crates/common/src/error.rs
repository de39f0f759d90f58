//! Error types for loginbdd

use thiserror::Error;

/// Result type alias using loginbdd Error
pub type Result<T> = std::result::Result<T, Error>;

/// loginbdd error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Navigation to {url} did not become ready within {timeout_ms} ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Action '{action}' on {selector} timed out after {timeout_ms} ms")]
    ActionTimeout {
        action: String,
        selector: String,
        timeout_ms: u64,
    },

    #[error("No step matches: {0}")]
    NoMatchingStep(String),

    #[error("Step '{sentence}' is ambiguous, matched by: {}", patterns.join(" | "))]
    AmbiguousStep {
        sentence: String,
        patterns: Vec<String>,
    },

    #[error("Step pattern '{pattern}' is ambiguous with registered pattern '{existing}'")]
    DuplicatePattern { pattern: String, existing: String },

    #[error("Invalid step pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid argument for {name}: {reason}")]
    InvalidStepArgument { name: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Policy not configured: {0}")]
    PolicyUndefined(String),

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Browser session already closed")]
    SessionClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scenario spec error: {0}")]
    SpecParse(String),

    #[error("Application server failed: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Build an assertion failure from anything displayable
    pub fn assertion(msg: impl Into<String>) -> Self {
        Error::AssertionFailed(msg.into())
    }

    /// Whether this error marks a pending step rather than a failure
    pub fn is_pending(&self) -> bool {
        matches!(self, Error::PolicyUndefined(_))
    }

    /// Errors that must abort the suite before any scenario runs
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Error::NoMatchingStep(_)
                | Error::AmbiguousStep { .. }
                | Error::DuplicatePattern { .. }
                | Error::InvalidPattern { .. }
        )
    }
}

/// Fail with [`Error::AssertionFailed`] unless `cond` holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::Error::AssertionFailed(format!($($arg)+)));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_and_build_classification() {
        assert!(Error::PolicyUndefined("trimming".into()).is_pending());
        assert!(!Error::assertion("nope").is_pending());
        assert!(Error::NoMatchingStep("I dance".into()).is_build_error());
        assert!(!Error::SessionClosed.is_build_error());
    }

    #[test]
    fn test_ambiguous_step_message_lists_patterns() {
        let e = Error::AmbiguousStep {
            sentence: "I enter x".into(),
            patterns: vec!["I enter {a}".into(), "I enter {b:list}".into()],
        };
        assert_eq!(
            e.to_string(),
            "Step 'I enter x' is ambiguous, matched by: I enter {a} | I enter {b:list}"
        );
    }
}
