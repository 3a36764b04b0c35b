//! Pricebook Common Library
//!
//! Shared error handling and logging bootstrap for the pricebook workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the [`PricebookError`] type and [`Result`] alias
//!   shared by the engine and the CLI
//! - **Logging**: centralized `tracing` subscriber initialization

pub mod error;
pub mod logging;

pub use error::{PricebookError, Result};
