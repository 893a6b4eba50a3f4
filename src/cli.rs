use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::deploy::deploy;
use crate::load_config::load_config;

/// CLI for site-deploy: push a static site to object storage and its CDN.
#[derive(Parser)]
#[clap(
    name = "site-deploy",
    version,
    about = "Deploy a local static site directory to an S3 bucket, optionally with website hosting, a CloudFront distribution and cache invalidation"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy the configured local directory to the target bucket
    Deploy {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,

        /// Override the configured bucket name
        #[clap(long)]
        bucket: Option<String>,

        /// Override the configured local directory
        #[clap(long)]
        local_dir: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Deploy {
            config,
            bucket,
            local_dir,
        } => {
            let mut config = load_config(config)?;
            if let Some(bucket) = bucket {
                config.s3.bucket = bucket;
            }
            if let Some(local_dir) = local_dir {
                config.local_dir = local_dir;
            }

            println!("Deploy starting...");
            match deploy(&config).await {
                Ok(report) => {
                    println!("Deploy complete.\nReport:");
                    println!("{report:#?}");
                    Ok(())
                }
                Err(e) => {
                    eprintln!("[ERROR] Deploy failed: {e}");
                    Err(e.into())
                }
            }
        }
    }
}
