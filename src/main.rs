//! Kepler MCP GitLab
//!
//! Main entry point for the `kepler-mcp-gitlab` binary.

use anyhow::Result;

use kepler_mcp_gitlab::cli::{Cli, Commands};
use kepler_mcp_gitlab::config::Config;
use kepler_mcp_gitlab::logging::init_logging;
use kepler_mcp_gitlab::oauth::token_store::generate_encryption_key;
use kepler_mcp_gitlab::server;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::GenerateKey => {
            println!("{}", generate_encryption_key());
            Ok(())
        }
        Commands::Serve(args) => {
            let config = Config::load(&args)?;
            init_logging(&config.logging)?;

            if let Err(e) = config.validate() {
                tracing::error!("Invalid configuration: {}", e);
                return Err(e.into());
            }

            tracing::info!(
                app = %config.server.app_name,
                environment = config.server.environment.as_str(),
                transport = config.server.transport.as_str(),
                gitlab = %config.gitlab.url,
                "Starting server"
            );

            if let Err(e) = server::run(config).await {
                tracing::error!("Server stopped with error: {}", e);
                return Err(e.into());
            }
            Ok(())
        }
    }
}
