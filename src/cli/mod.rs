//! CLI module for databricks-mcp - command-line interface and subcommands.
//!
//! With no subcommand the binary serves the tool protocol on stdio.

pub mod commands;

pub use commands::Cli;
