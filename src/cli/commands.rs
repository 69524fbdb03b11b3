//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - serve: run the tool server on stdio (default)
//! - tools: list the tools the server exposes
//! - check: verify workspace connectivity
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Databricks tool server for AI agents
#[derive(Parser, Debug)]
#[command(name = "databricks-mcp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to stderr instead of the log file
    #[arg(long, global = true)]
    pub log_stderr: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Subcommand to run, `serve` when none was given
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve { mock: false })
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Serve the tool protocol on stdin/stdout
    Serve {
        /// Answer from built-in sample data instead of a workspace
        #[arg(long)]
        mock: bool,
    },

    /// List the tools the server exposes
    Tools {
        /// Print full definitions (with input schemas) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check connectivity by listing catalogs
    Check,

    /// Print the effective configuration (token redacted)
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_no_args() {
        // No args serves on stdio
        let cli = Cli::try_parse_from(["databricks-mcp"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.command_or_default(), Commands::Serve { mock: false });
        assert!(!cli.verbose);
        assert!(!cli.log_stderr);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["databricks-mcp", "-v"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["databricks-mcp", "-c", "/path/to/databricks-mcp.yml"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/databricks-mcp.yml")));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["databricks-mcp", "check", "--log-stderr", "-c", "x.yml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Check));
        assert!(cli.log_stderr);
        assert_eq!(cli.config, Some(PathBuf::from("x.yml")));
    }

    #[test]
    fn test_serve_command() {
        let cli = Cli::try_parse_from(["databricks-mcp", "serve"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Serve { mock: false }));
    }

    #[test]
    fn test_serve_mock() {
        let cli = Cli::try_parse_from(["databricks-mcp", "serve", "--mock"]).unwrap();
        match cli.command_or_default() {
            Commands::Serve { mock } => assert!(mock),
            other => panic!("Expected serve command, got {:?}", other),
        }
    }

    #[test]
    fn test_tools_command() {
        let cli = Cli::try_parse_from(["databricks-mcp", "tools"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Tools { json: false }));

        let cli = Cli::try_parse_from(["databricks-mcp", "tools", "--json"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Tools { json: true }));
    }

    #[test]
    fn test_config_command() {
        let cli = Cli::try_parse_from(["databricks-mcp", "config"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Config));
    }

    #[test]
    fn test_unknown_subcommand() {
        assert!(Cli::try_parse_from(["databricks-mcp", "daemon"]).is_err());
    }

    #[test]
    fn test_help_works() {
        // Verify help doesn't panic
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["databricks-mcp", "--version"]);
        // Version flag causes early exit with error (expected)
        assert!(result.is_err());
    }
}
