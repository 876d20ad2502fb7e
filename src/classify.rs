//! Failure classification
//!
//! Best-effort reading of unstructured CLI error text. Everything that
//! decides kind, retryability or remediation lives behind [`classify`] so
//! the heuristic can be replaced without touching callers.
//!
//! Rules are checked in order, first match wins:
//! 1. network / connection / timeout -> Network (retryable)
//! 2. authentication / login         -> Auth
//! 3. permission / unauthorized      -> Permission
//! 4. not found / the tool's name    -> Config
//! 5. anything else                  -> Unknown (retryable)
//!
//! A non-zero exit names the tool in its message, so a CLI failure that
//! matches none of the earlier rules lands in Config and is not retried.

use crate::error::GatewayError;

/// Failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Auth,
    Permission,
    Config,
    Unknown,
}

impl ErrorKind {
    pub fn retryable(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Unknown)
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Check your network connection and try again.",
            ErrorKind::Auth => "Please run 'az login' to authenticate with Azure.",
            ErrorKind::Permission => "Check that your account has the required permissions.",
            ErrorKind::Config => "Ensure Azure CLI is installed and in your PATH.",
            ErrorKind::Unknown => "An unexpected error occurred. Please try again.",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Auth => "auth",
            ErrorKind::Permission => "permission",
            ErrorKind::Config => "config",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// A failure together with what it means for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub retryable: bool,
    pub suggestion: &'static str,
    pub cause: GatewayError,
}

/// Classify a failure by its message text
pub fn classify(error: &GatewayError) -> ClassifiedError {
    let kind = kind_of(&error.to_string(), error.tool());
    ClassifiedError {
        kind,
        retryable: kind.retryable(),
        suggestion: kind.suggestion(),
        cause: error.clone(),
    }
}

fn kind_of(message: &str, tool: Option<&str>) -> ErrorKind {
    let text = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if has(&["network", "connection", "timeout"]) {
        ErrorKind::Network
    } else if has(&["authentication", "login"]) {
        ErrorKind::Auth
    } else if has(&["permission", "unauthorized"]) {
        ErrorKind::Permission
    } else if has(&["not found"]) || tool.is_some_and(|t| mentions_tool(message, t)) {
        ErrorKind::Config
    } else {
        ErrorKind::Unknown
    }
}

/// Whole-word, case-insensitive match so "az" does not hit "azure"
fn mentions_tool(message: &str, tool: &str) -> bool {
    if tool.is_empty() {
        return false;
    }
    regex::RegexBuilder::new(&format!(r"\b{}\b", regex::escape(tool)))
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(message))
        .unwrap_or(false)
}
