//! Smooth Sailing CLI library.
//!
//! Argument parsing and command handlers for the `sail` binary.

pub mod cli;
pub mod commands;
