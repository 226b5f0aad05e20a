//! CLI module for steward - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for vault setup, the
//! scheduler and intake loops, and task inspection.

pub mod commands;

pub use commands::Cli;
