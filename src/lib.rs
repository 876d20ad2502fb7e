//! azswitch - pick the active Azure CLI subscription from a terminal list
//!
//! Pieces, leaves first:
//! - [`gateway`]: runs `az account list` / `az account set`
//! - [`subscription`]: decodes the list output
//! - [`classify`]: turns failure text into a kind + suggestion
//! - [`retry`]: attempt counting and backoff
//! - [`app`]: the state machine tying them together
//! - [`ui`]: terminal rendering and the effect runner

pub mod app;
pub mod classify;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod retry;
pub mod subscription;
pub mod ui;
