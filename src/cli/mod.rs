//! CLI module - Command-line interface for aniguard
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// aniguard - authentication and automated security service
#[derive(Parser)]
#[command(name = "aniguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default)
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Grant admin rights to an account
    Promote {
        /// Account email
        email: String,
        /// Revoke instead of grant
        #[arg(long)]
        revoke: bool,
    },

    /// Clear the lockout of an account
    Unlock {
        /// Account email
        email: String,
    },

    /// Print the security status summary
    Status,
}

pub use commands::*;
