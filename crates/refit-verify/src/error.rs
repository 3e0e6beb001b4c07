use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Required build tool unavailable: {tool}")]
    ToolNotFound { tool: String },

    #[error("Could not start '{tool}': {source}")]
    ToolExecution {
        tool: String,
        source: std::io::Error,
    },

    /// Unusable command line or tool output.
    #[error("Bad input for '{tool}': {message}")]
    ParseError { tool: String, message: String },

    #[error("'{tool}' timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },
}
