//! Coedit - edit session tracking from the command line
//!
//! Thin CLI over `coedit-core`: opens edit scopes, lists sessions, runs
//! one-shot conflict checks and gated saves against a SQLite database.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod db;
pub mod device;
pub mod error;

pub use error::{CliError, Result};
