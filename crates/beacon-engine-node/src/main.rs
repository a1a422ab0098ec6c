use std::path::PathBuf;

use anyhow::Result;
use beacon_engine_rpc::JWT_SECRET_LEN;
use clap::Parser;
use rand::RngCore;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;
mod config;
mod node;
mod reporter;
mod status;

use cli::{Cli, Commands};
use config::{generate_sample_config, NodeConfig};
use node::Node;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_node(config).await?;
        }
        Commands::Init { output } => {
            init_config(output)?;
        }
        Commands::JwtSecret { output } => {
            generate_jwt_secret(output)?;
        }
        Commands::Status { endpoint } => {
            show_status(&endpoint).await?;
        }
    }

    Ok(())
}

/// Run the beacon engine
async fn run_node(config_path: PathBuf) -> Result<()> {
    info!("Loading configuration from {:?}", config_path);

    let config = if config_path.exists() {
        NodeConfig::load(&config_path)?
    } else {
        error!(
            "Configuration file not found: {:?}. Run 'beacon-engine init' to create one.",
            config_path
        );
        return Err(anyhow::anyhow!("Configuration file not found"));
    };

    let node = Node::new(config)?;
    node.run().await?;

    Ok(())
}

/// Initialize a new configuration file
fn init_config(output: PathBuf) -> Result<()> {
    let config = generate_sample_config();
    config.save(&output)?;

    info!("Configuration saved to {:?}", output);

    println!("\nConfiguration file created: {}", output.display());
    println!("Point engine_url/rpc_url at your execution node and set jwt_secret_path.");
    println!("\nTo start the engine, run:");
    println!("  beacon-engine run --config {}", output.display());

    Ok(())
}

/// Generate a new Engine API secret
fn generate_jwt_secret(output: Option<PathBuf>) -> Result<()> {
    let mut bytes = [0u8; JWT_SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secret = hex::encode(bytes);

    match output {
        Some(path) => {
            std::fs::write(&path, &secret)?;
            info!("JWT secret saved to {:?}", path);
            println!("JWT secret written to {}", path.display());
            println!("Give the execution node the same file.");
        }
        None => println!("{}", secret),
    }

    Ok(())
}

/// Show engine stats
async fn show_status(endpoint: &str) -> Result<()> {
    let url = format!("{}/stats", endpoint.trim_end_matches('/'));

    let response = reqwest::get(&url).await?;

    if response.status().is_success() {
        let stats: serde_json::Value = response.json().await?;
        println!("Engine Stats:");
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        error!("Failed to get stats: {}", response.status());
    }

    Ok(())
}
