//! External CLI gateway
//!
//! Two calls against the subscription tool:
//! - `<tool> account list`                  -> raw JSON bytes
//! - `<tool> account set --subscription <id>` -> success or failure
//!
//! The tool is resolved on PATH before anything is spawned, so a missing
//! install surfaces as [`GatewayError::ToolNotFound`] instead of a spawn error.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::error::GatewayError;
use crate::subscription::{self, Subscription};

/// Bundled `account list` payload for offline use
pub const SAMPLE_DATA: &[u8] = include_bytes!("../fixtures/sample_subscriptions.json");

/// Default tool name
pub const DEFAULT_TOOL: &str = "az";

/// Source of subscriptions and the place to activate one
#[async_trait]
pub trait SubscriptionGateway: Send + Sync {
    async fn list_subscriptions(&self) -> Result<Vec<u8>, GatewayError>;
    async fn set_active_subscription(&self, id: &str) -> Result<(), GatewayError>;
}

/// List then decode
pub async fn fetch_subscriptions(
    gateway: &dyn SubscriptionGateway,
) -> Result<Vec<Subscription>, GatewayError> {
    let data = gateway.list_subscriptions().await?;
    subscription::parse(&data)
}

/// Gateway backed by the real CLI
#[derive(Debug, Clone)]
pub struct AzCli {
    tool: String,
    sample_data: bool,
}

impl AzCli {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            sample_data: false,
        }
    }

    /// Serve the bundled fixture and skip the CLI entirely
    pub fn with_sample_data(mut self, enabled: bool) -> Self {
        self.sample_data = enabled;
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Resolve the tool, failing fast when it is missing
    pub fn locate(&self) -> Result<PathBuf, GatewayError> {
        find_in_path(&self.tool).ok_or_else(|| GatewayError::ToolNotFound {
            tool: self.tool.clone(),
        })
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, GatewayError> {
        let program = self.locate()?;
        tracing::info!(tool = %self.tool, ?args, "invoking");

        let output = Command::new(&program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| GatewayError::ExecutionFailed {
                tool: self.tool.clone(),
                status: "spawn failed".into(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(tool = %self.tool, status = %output.status, %stderr, "command failed");
            return Err(GatewayError::ExecutionFailed {
                tool: self.tool.clone(),
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(output.stdout)
    }
}

impl Default for AzCli {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL)
    }
}

#[async_trait]
impl SubscriptionGateway for AzCli {
    async fn list_subscriptions(&self) -> Result<Vec<u8>, GatewayError> {
        if self.sample_data {
            tracing::debug!("serving bundled sample data");
            return Ok(SAMPLE_DATA.to_vec());
        }
        self.run(&["account", "list"]).await
    }

    async fn set_active_subscription(&self, id: &str) -> Result<(), GatewayError> {
        if self.sample_data {
            tracing::debug!(id, "sample mode, not invoking account set");
            return Ok(());
        }
        self.run(&["account", "set", "--subscription", id]).await?;
        Ok(())
    }
}

/// PATH lookup: first executable regular file named `tool`
pub fn find_in_path(tool: &str) -> Option<PathBuf> {
    if tool.is_empty() {
        return None;
    }

    if tool.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(tool);
        return is_executable(&path).then_some(path);
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_data_parses() {
        let subs = subscription::parse(SAMPLE_DATA).unwrap();
        assert_eq!(subs.len(), 3);
        assert_eq!(subs.iter().filter(|s| s.is_default).count(), 1);
    }

    #[test]
    fn test_missing_tool_is_not_found() {
        assert!(find_in_path("definitely-not-a-real-tool-4c1e").is_none());
        assert!(find_in_path("").is_none());
        let cli = AzCli::new("definitely-not-a-real-tool-4c1e");
        assert_eq!(
            cli.locate(),
            Err(GatewayError::ToolNotFound { tool: "definitely-not-a-real-tool-4c1e".into() })
        );
    }

    #[tokio::test]
    async fn test_list_fails_fast_without_tool() {
        let cli = AzCli::new("definitely-not-a-real-tool-4c1e");
        let err = cli.list_subscriptions().await.unwrap_err();
        assert!(matches!(err, GatewayError::ToolNotFound { .. }));
        let err = cli.set_active_subscription("x").await.unwrap_err();
        assert!(matches!(err, GatewayError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_sample_mode_skips_tool() {
        let cli = AzCli::new("definitely-not-a-real-tool-4c1e").with_sample_data(true);
        let subs = fetch_subscriptions(&cli).await.unwrap();
        assert_eq!(subs.len(), 3);
        assert!(cli.set_active_subscription(&subs[0].id).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_execution_failed() {
        // `false` ignores its arguments and exits 1
        let cli = AzCli::new("false");
        match cli.list_subscriptions().await {
            Err(GatewayError::ExecutionFailed { tool, status, .. }) => {
                assert_eq!(tool, "false");
                assert!(status.contains('1'), "{}", status);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_returns_stdout() {
        // `echo account list` prints its arguments
        let cli = AzCli::new("echo");
        let out = cli.list_subscriptions().await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out).trim(), "account list");
        assert!(matches!(
            fetch_subscriptions(&cli).await,
            Err(GatewayError::MalformedData(_))
        ));
    }
}
