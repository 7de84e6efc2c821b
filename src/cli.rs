//! Command-line interface definition for Kepler MCP GitLab
//!
//! Uses clap's derive API. `serve` starts the MCP server and `generate-key`
//! prints a fresh token store encryption key.

use clap::{Parser, Subcommand, ValueEnum};

/// Kepler MCP GitLab - MCP server for the GitLab REST API
#[derive(Parser, Debug, Clone)]
#[command(name = "kepler-mcp-gitlab")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the MCP server
    Serve(ServeArgs),

    /// Print a new encryption key for the encrypted token store
    GenerateKey,
}

/// Options for `serve`. Each one overrides the config file and environment.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "KEPLER_MCP_CONFIG")]
    pub config: Option<String>,

    /// Transport to serve MCP over
    #[arg(short, long, value_enum)]
    pub transport: Option<TransportArg>,

    /// Bind address for the HTTP transport
    #[arg(long)]
    pub host: Option<String>,

    /// Port for the HTTP transport
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Transport selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    /// Newline-delimited JSON-RPC over stdin/stdout
    Stdio,
    /// JSON-RPC over HTTP with OAuth endpoints
    Http,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
