use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Beacon Engine - minimal consensus driver for an execution node
#[derive(Parser)]
#[command(name = "beacon-engine")]
#[command(about = "Slot-driven Engine API consensus shim and utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the beacon engine
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Write a sample configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Generate a random Engine API JWT secret
    JwtSecret {
        /// File to write the hex secret to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show stats of a running engine
    Status {
        /// Status endpoint
        #[arg(short, long, default_value = "http://127.0.0.1:9100")]
        endpoint: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["beacon-engine", "run", "--config", "node.json"]).unwrap();
        match cli.command {
            Commands::Run { config } => assert_eq!(config, PathBuf::from("node.json")),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_jwt_secret() {
        let cli = Cli::try_parse_from(["beacon-engine", "jwt-secret"]).unwrap();
        assert!(matches!(cli.command, Commands::JwtSecret { output: None }));

        let cli = Cli::try_parse_from(["beacon-engine", "jwt-secret", "-o", "jwt.hex"]).unwrap();
        assert!(matches!(cli.command, Commands::JwtSecret { output: Some(_) }));
    }

    #[test]
    fn test_status_default_endpoint() {
        let cli = Cli::try_parse_from(["beacon-engine", "status"]).unwrap();
        match cli.command {
            Commands::Status { endpoint } => assert_eq!(endpoint, "http://127.0.0.1:9100"),
            _ => panic!("expected status"),
        }
    }
}
