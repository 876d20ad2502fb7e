//! Failures reported by the gateway and the parser
//!
//! These are returned uninterpreted. Deciding what a failure means
//! (kind, retryability, suggestion) is the classifier's job.

use thiserror::Error;

/// A failed list or set call against the external CLI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The tool could not be resolved on PATH; nothing was spawned.
    #[error("{tool} CLI not found in PATH")]
    ToolNotFound { tool: String },

    /// The tool ran but did not succeed.
    #[error("{tool} CLI command failed ({status}): {stderr}")]
    ExecutionFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// Output could not be decoded as a subscription list.
    #[error("malformed subscription data: {0}")]
    MalformedData(String),
}

impl GatewayError {
    /// Name of the tool involved, when the failure came from running it
    pub fn tool(&self) -> Option<&str> {
        match self {
            GatewayError::ToolNotFound { tool } => Some(tool),
            GatewayError::ExecutionFailed { tool, .. } => Some(tool),
            GatewayError::MalformedData(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_stderr() {
        let err = GatewayError::ExecutionFailed {
            tool: "az".into(),
            status: "exit status: 1".into(),
            stderr: "ERROR: network timeout".into(),
        };
        assert_eq!(
            err.to_string(),
            "az CLI command failed (exit status: 1): ERROR: network timeout"
        );
        assert_eq!(err.tool(), Some("az"));
    }

    #[test]
    fn test_tool_not_found_names_tool() {
        let err = GatewayError::ToolNotFound { tool: "az".into() };
        assert!(err.to_string().contains("az CLI not found"));
        assert_eq!(GatewayError::MalformedData("x".into()).tool(), None);
    }
}
