//! Command-line interface for strictly_quoridor.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strictly Quoridor - peer-to-peer Quoridor session relay
#[derive(Parser, Debug)]
#[command(name = "strictly_quoridor")]
#[command(about = "Negotiate a peer data channel and relay Quoridor messages", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an offer, print it, then read the peer's answer from stdin
    Serve {
        /// Path to session configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Read a peer's offer from stdin and print the answer
    Connect {
        /// Path to session configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Command {
    /// Config path given on the command line, if any.
    pub fn config(&self) -> Option<&PathBuf> {
        match self {
            Command::Serve { config } | Command::Connect { config } => config.as_ref(),
        }
    }
}
