//! Optional debug log
//!
//! Installed only when `DEBUG` is set. Appends to a file and never touches
//! the terminal, which belongs to the TUI.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `AZSWITCH_LOG=azswitch=trace`
pub const ENV_FILTER: &str = "AZSWITCH_LOG";

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub fn init_debug_log(path: &Path) -> Result<()> {
    if TRACING_INIT.get().is_some() {
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let filter = EnvFilter::try_from_env(ENV_FILTER).unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Another tracing subscriber is already installed")?;
    let _ = TRACING_INIT.set(());

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "debug log started");
    Ok(())
}
