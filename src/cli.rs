//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the AM2R connector.

use clap::{Parser, Subcommand};

/// AM2R Connector - keeps a running AM2R game in sync with a multiworld session
///
/// Talks to the game over a local socket, reconnecting whenever the game is
/// restarted, and optionally holds a session with a multiworld server.
#[derive(Parser, Debug)]
#[command(name = "am2r-connector")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the connector
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the connector until `exit` or Ctrl-C
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "AM2R_CONFIG")]
        config: Option<String>,

        /// Multiworld server URL (ws:// or wss://)
        #[arg(long)]
        connect: Option<String>,

        /// Slot name to connect as
        #[arg(long)]
        name: Option<String>,

        /// Room password
        #[arg(long)]
        password: Option<String>,

        /// Override the game port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
