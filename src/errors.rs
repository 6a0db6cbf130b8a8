//! Common error types for the voxel agent.
//!
//! Runtime stalls and unreachable targets are expressed through task state
//! (`is_failed`), never through these errors; this module covers the cases
//! that are rejected up front or that bubble out of configuration loading.

use std::fmt;

/// Core error type for the agent controller.
#[derive(Debug, Clone)]
pub enum AgentError {
    /// A task was constructed with arguments it can never satisfy
    /// (e.g. asking the nether-portal engine for the End).
    Misconfiguration(String),

    /// A recipe or item table lookup failed.
    Recipe(String),

    /// Settings file loading or parsing errors.
    Config(String),

    /// Facade-level inconsistency (e.g. a window snapshot of the wrong kind).
    Facade(String),

    /// Generic error with custom message.
    Generic(String),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::Misconfiguration(msg) => write!(f, "Misconfiguration: {}", msg),
            AgentError::Recipe(msg) => write!(f, "Recipe Error: {}", msg),
            AgentError::Config(msg) => write!(f, "Configuration Error: {}", msg),
            AgentError::Facade(msg) => write!(f, "Facade Error: {}", msg),
            AgentError::Generic(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for AgentError {}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Create a misconfiguration error.
    pub fn misconfiguration<S: Into<String>>(msg: S) -> Self {
        Self::Misconfiguration(msg.into())
    }

    /// Create a recipe error.
    pub fn recipe<S: Into<String>>(msg: S) -> Self {
        Self::Recipe(msg.into())
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a facade error.
    pub fn facade<S: Into<String>>(msg: S) -> Self {
        Self::Facade(msg.into())
    }

    /// Create a generic error.
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Self::Generic(msg.into())
    }
}

impl From<std::io::Error> for AgentError {
    fn from(e: std::io::Error) -> Self {
        AgentError::config(format!("IO error: {}", e))
    }
}

impl From<ron::error::SpannedError> for AgentError {
    fn from(e: ron::error::SpannedError) -> Self {
        AgentError::config(format!("RON parse error: {}", e))
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::config(format!("JSON error: {}", e))
    }
}
