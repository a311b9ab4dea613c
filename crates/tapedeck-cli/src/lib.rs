//! Tapedeck CLI library: configuration, logging and the inspection commands.
//!
//! Separated from main.rs so the commands can be driven from tests.

pub mod commands;
pub mod config;
pub mod logging;
