//! apptrack: operator CLI for the application artifact store.
//!
//! Reads storage settings from the environment (see `STORAGE_BACKEND`,
//! `STORAGE_BUCKET`). The client is built before any command runs.

use anyhow::Context;
use apptrack_cli::{init_tracing, read_payload, UrlOutput};
use apptrack_core::StorageConfig;
use apptrack_storage::create_gateway;
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "apptrack", about = "Job application artifact storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file and print a download URL for it
    Upload {
        /// Object key, e.g. resumes/alice.pdf
        key: String,
        /// Path to the file to upload
        file: std::path::PathBuf,
    },
    /// Print a fresh download URL (valid for 30 minutes)
    Url {
        /// Object key
        key: String,
    },
    /// Delete an object
    Delete {
        /// Object key
        key: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config = StorageConfig::from_env().context("Failed to load storage configuration")?;
    config.validate().context("Invalid storage configuration")?;
    let gateway = create_gateway(&config)
        .await
        .context("Failed to create storage client")?;

    tracing::debug!(backend = %gateway.backend_type(), "Storage client ready");

    match cli.command {
        Commands::Upload { key, file } => {
            let data = read_payload(&file).await?;
            let signed = gateway.upload(&key, &data).await?;
            print_json(&UrlOutput::new(&key, &signed))?;
        }
        Commands::Url { key } => {
            let signed = gateway.download_url(&key).await?;
            print_json(&UrlOutput::new(&key, &signed))?;
        }
        Commands::Delete { key } => {
            gateway.delete(&key).await?;
            print_json(&serde_json::json!({ "success": true, "key": key }))?;
        }
    }

    Ok(())
}
