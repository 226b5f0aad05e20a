//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - init: create the vault layout
//! - run: the scheduler loop
//! - watch: the inbox intake loop
//! - list / status: inspect tasks

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Steward - a file-backed task queue driven through bounded completion cycles
#[derive(Parser, Debug)]
#[command(name = "steward")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create the vault directories
    Init,

    /// Run the scheduler loop until interrupted
    Run,

    /// Triage new inbox files until interrupted
    Watch,

    /// List pending tasks in dispatch order
    List {
        /// Include escalation notes and non-dispatchable tasks
        #[arg(short, long)]
        all: bool,
    },

    /// Show metadata and transition history of one task
    Status {
        /// Task identifier (file name)
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["steward"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["steward", "-v", "run"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.command, Commands::Run);
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["steward", "watch", "-c", "/etc/steward.yml"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/etc/steward.yml")));
        assert_eq!(cli.command, Commands::Watch);
    }

    #[test]
    fn test_init_command() {
        let cli = Cli::try_parse_from(["steward", "init"]).unwrap();
        assert_eq!(cli.command, Commands::Init);
    }

    #[test]
    fn test_list_command() {
        let cli = Cli::try_parse_from(["steward", "list"]).unwrap();
        assert_eq!(cli.command, Commands::List { all: false });

        let cli = Cli::try_parse_from(["steward", "list", "--all"]).unwrap();
        assert_eq!(cli.command, Commands::List { all: true });
    }

    #[test]
    fn test_status_command() {
        let cli = Cli::try_parse_from(["steward", "status", "2026-03-01_report.md"]).unwrap();
        match cli.command {
            Commands::Status { id } => assert_eq!(id, "2026-03-01_report.md"),
            _ => panic!("Expected status command"),
        }
    }

    #[test]
    fn test_status_requires_id() {
        assert!(Cli::try_parse_from(["steward", "status"]).is_err());
    }

    #[test]
    fn test_help_works() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["steward", "--version"]);
        // Version flag causes early exit with error (expected)
        assert!(result.is_err());
    }
}
