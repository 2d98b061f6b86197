//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Feeds Auth - scoped, time-bounded feed tokens
#[derive(Parser, Debug)]
#[command(name = "feeds-auth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "FEEDS_AUTH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "FEEDS_AUTH_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "FEEDS_AUTH_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "FEEDS_AUTH_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "FEEDS_AUTH_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the token server (default)
    Serve,

    /// Issue a token
    #[command(subcommand)]
    Token(TokenCommand),

    /// Check a token's signature, tenant and expiry and print its claims
    Verify {
        /// The token to verify
        #[arg(required = true)]
        token: String,
    },

    /// Publish an item to a feed
    Publish {
        /// Feed id
        #[arg(short, long)]
        feed: String,

        /// Item as JSON
        #[arg(required = true)]
        item: String,
    },

    /// Delete all items of a feed
    Delete {
        /// Feed id
        #[arg(short, long)]
        feed: String,
    },

    /// List feeds
    List {
        /// Maximum number of feeds returned
        #[arg(short, long)]
        limit: Option<u32>,

        /// Only feeds whose id starts with this prefix
        #[arg(long)]
        prefix: Option<String>,
    },
}

/// Token subcommands
#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// The maximal-scope server token
    Server,

    /// A read token for one feed
    Client {
        /// Feed id
        #[arg(short, long)]
        feed: String,

        /// Subject (user id) embedded as `sub`
        #[arg(short, long)]
        subject: Option<String>,
    },
}
