//! Icebox client binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use icebox_cli::api_client::ApiClient;
use icebox_cli::sync::{self, SyncStatus};
use icebox_core::config::ClientConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Icebox - synchronize local files with an icebox server
#[derive(Parser, Debug)]
#[command(name = "icebox")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to client configuration file
    #[arg(long, env = "ICEBOX_CLIENT_CONFIG", default_value = "icebox-client.toml")]
    client_config: String,

    /// Server base URL (overrides configuration)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Username (overrides configuration)
    #[arg(short, long)]
    user: Option<String>,

    /// Password
    #[arg(short, long, env = "ICEBOX_PASSWORD", hide_env_values = true)]
    password: String,

    /// Disable per-chunk hash verification when whole-file hashes match
    #[arg(long)]
    no_extra_strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synchronize one file with the server
    Sync {
        /// The local file to sync
        filepath: PathBuf,
        /// Remote path; defaults to the local path
        target: Option<String>,
    },
    /// Synchronize a directory tree with the server
    SyncDir {
        /// The local directory to sync
        dirpath: PathBuf,
        /// Remote prefix; defaults to the local path
        target: Option<String>,
    },
    /// List all files registered on the server
    GetFiles,
    /// Remove a file from the server by its remote path
    RmFile {
        /// The remote path to remove
        filename: String,
    },
    /// Print quota, allocation, and revision counters
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let mut figment = Figment::new();
    if std::path::Path::new(&cli.client_config).exists() {
        figment = figment.merge(Toml::file(&cli.client_config));
    }
    let config: ClientConfig = figment
        .merge(Env::prefixed("ICEBOX_"))
        .extract()
        .context("failed to load client configuration")?;

    let host = cli
        .host
        .or(config.host)
        .context("no server host configured; pass --host or set ICEBOX_HOST")?;
    let user = cli
        .user
        .or(config.user)
        .context("no username configured; pass --user or set ICEBOX_USER")?;
    let extra_strict = !cli.no_extra_strict && config.extra_strict;

    let client = ApiClient::login(&host, &user, &cli.password)
        .await
        .with_context(|| format!("failed to authenticate to {host}"))?;

    match cli.command {
        Commands::Sync { filepath, target } => {
            let remote = target.unwrap_or_else(|| filepath.to_string_lossy().into_owned());
            let (status, count) = sync::sync_file(&client, &filepath, &remote, extra_strict)
                .await
                .with_context(|| format!("failed to synchronize {}", filepath.display()))?;
            println!("{remote}: {} ({count} chunks transferred)", status_label(status));
        }
        Commands::SyncDir { dirpath, target } => {
            let remote = target.unwrap_or_else(|| dirpath.to_string_lossy().into_owned());
            let summary = sync::sync_dir(&client, &dirpath, &remote, extra_strict)
                .await
                .with_context(|| format!("failed to synchronize {}", dirpath.display()))?;
            println!(
                "synced {} files, {} chunks transferred",
                summary.synced, summary.transferred_chunks
            );
            if !summary.failed.is_empty() {
                for (remote, err) in &summary.failed {
                    eprintln!("failed: {remote}: {err}");
                }
                anyhow::bail!("{} files failed to sync", summary.failed.len());
            }
        }
        Commands::GetFiles => {
            let files = client.list_files().await?;
            println!("{:<8} | {:<10} | {:<6} | file", "id", "last mod", "chunks");
            for fi in files {
                println!(
                    "{:<8} | {:<10} | {:<6} | {}",
                    fi.file_id, fi.last_mod, fi.chunk_count, fi.file_name
                );
            }
        }
        Commands::RmFile { filename } => {
            let info = client
                .get_file_by_name(&filename)
                .await?
                .with_context(|| format!("no remote file named {filename}"))?;
            client.delete_file(info.file_id).await?;
            println!("removed {filename}");
        }
        Commands::Stats => {
            let stats = client.user_stats().await?;
            println!("quota:     {}", stats.quota);
            println!("allocated: {}", stats.allocated);
            println!("revision:  {}", stats.revision);
        }
    }

    Ok(())
}

fn status_label(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Missing => "repaired missing chunks",
        SyncStatus::LocalNewer => "uploaded",
        SyncStatus::RemoteNewer => "downloaded",
        SyncStatus::Same => "unchanged",
    }
}
