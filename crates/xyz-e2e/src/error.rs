// Error types for xyz-e2e

use thiserror::Error;

/// Result type alias for suite operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a scenario
#[derive(Debug, Error)]
pub enum Error {
    /// Target could not be resolved within its timeout
    ///
    /// Includes the selector that was used to locate the element.
    #[error("Element not found: selector '{0}'")]
    ElementNotFound(String),

    /// Navigation did not settle within its timeout
    #[error("Navigation timeout after {duration_ms}ms navigating to '{url}'")]
    NavigationTimeout { url: String, duration_ms: u64 },

    /// No anchor or no response candidates were found on the page
    #[error("Extraction found no response content")]
    ExtractionEmpty,

    /// One or more verification checks failed
    #[error("Verification failed: {}", .0.join("; "))]
    VerificationFailed(Vec<String>),

    /// The response poll loop hit its ceiling without a readiness signal
    #[error("Timed out after {elapsed_secs}s waiting for a response")]
    TimedOut { elapsed_secs: u64 },

    /// A scenario-level expectation did not hold
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// Error raised by the Playwright driver
    #[error("Browser driver error: {0}")]
    Driver(#[from] playwright_rs::Error),

    /// Transport-level error (stdio communication with the MCP server)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol-level error (JSON-RPC)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An MCP tool reported failure
    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    /// Channel closed before a response arrived
    #[error("Channel closed unexpectedly")]
    ChannelClosed,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error with additional context
    #[error("{0}: {1}")]
    Context(String, #[source] Box<Error>),
}

impl Error {
    /// Adds context to the error
    pub fn context(self, msg: impl Into<String>) -> Self {
        Error::Context(msg.into(), Box::new(self))
    }

    /// Returns true for the two failures the facade raises for unresolved targets.
    pub fn is_unresolved_target(&self) -> bool {
        match self {
            Error::ElementNotFound(_) | Error::NavigationTimeout { .. } => true,
            Error::Context(_, inner) => inner.is_unresolved_target(),
            _ => false,
        }
    }
}
